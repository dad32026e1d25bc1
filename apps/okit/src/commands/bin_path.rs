//! Bin-path command for the okit CLI.
//!
//! Prints where a release lives (or would live) on disk. Nothing is checked
//! or created.
//!
//! ## Usage
//!
//! ```bash
//! okit bin-path v0.11.0
//! okit bin-path v0.11.0 --executable
//! ```

use anyhow::Result;
use clap::Args;
use ollama_kit::ReleaseTag;

use crate::settings::{GlobalArgs, PlatformArgs};

/// Arguments for the bin-path command.
#[derive(Args)]
pub struct BinPathArgs {
    /// Release tag (e.g., "v0.11.0").
    pub version: ReleaseTag,

    /// Print the executable path instead of the directory.
    #[clap(long)]
    pub executable: bool,

    #[command(flatten)]
    pub platform: PlatformArgs,
}

/// Executes the bin-path command.
///
/// # Errors
///
/// Returns an error if the configuration or platform cannot be resolved.
pub fn execute(global: &GlobalArgs, args: &BinPathArgs) -> Result<()> {
    let ollama = global.ollama()?;
    let platform = args.platform.resolve()?;

    let path = if args.executable {
        ollama.executable_path(&args.version, platform)
    } else {
        ollama.bin_path(&args.version, platform)
    };
    println!("{}", path.display());

    Ok(())
}
