//! Download command for the okit CLI.
//!
//! Installs a release into the versioned layout under the base path.
//!
//! ## Usage
//!
//! ```bash
//! okit download            # Install the latest release
//! okit download v0.11.0    # Install a specific release
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ollama_kit::{ProgressCallback, ProgressEvent, Version};

use crate::settings::{GlobalArgs, PlatformArgs};

/// Arguments for the download command.
#[derive(Args)]
pub struct DownloadArgs {
    /// Version to install (e.g., "v0.11.0" or "latest").
    #[clap(default_value = "latest")]
    pub version: Version,

    #[command(flatten)]
    pub platform: PlatformArgs,
}

/// Executes the download command.
///
/// Progress lines are printed as `[<percent>%] <message>`.
///
/// # Errors
///
/// Returns an error if the lookup, download or extraction fails.
pub async fn execute(global: &GlobalArgs, args: &DownloadArgs) -> Result<()> {
    let ollama = global.ollama()?;
    let platform = args.platform.resolve()?;

    let progress: ProgressCallback = Arc::new(print_progress);
    let tag = ollama
        .download(&args.version, platform, Some(&progress))
        .await
        .with_context(|| format!("Failed to install Ollama {}", args.version))?;

    println!();
    println!("Ollama {tag} installed successfully!");
    println!("  Location: {}", ollama.bin_path(&tag, platform).display());

    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
pub(crate) fn print_progress(event: ProgressEvent) {
    println!("[{:>3}%] {}", event.percent, event.message);
}
