//! List command for the okit CLI.
//!
//! ## Usage
//!
//! ```bash
//! okit list
//! okit list --os darwin --arch arm64
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Installed versions (linux-amd64):
//!   v0.10.0
//!   v0.11.0
//! ```

use anyhow::Result;
use clap::Args;

use crate::settings::{GlobalArgs, PlatformArgs};

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub platform: PlatformArgs,
}

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the versions directory cannot be read.
pub fn execute(global: &GlobalArgs, args: &ListArgs) -> Result<()> {
    let ollama = global.ollama()?;
    let platform = args.platform.resolve()?;
    let versions = ollama.downloaded_versions(platform)?;

    if versions.is_empty() {
        println!("No Ollama versions installed for {platform}.");
        println!();
        println!("Run 'okit download' to install the latest release.");
        return Ok(());
    }

    println!("Installed versions ({platform}):");
    for version in &versions {
        println!("  {version}");
    }

    Ok(())
}
