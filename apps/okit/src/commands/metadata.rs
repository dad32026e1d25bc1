//! Metadata command for the okit CLI.
//!
//! Looks up a release in the index without downloading anything.
//!
//! ## Usage
//!
//! ```bash
//! okit metadata                          # latest, this machine
//! okit metadata v0.11.0 --os windows --arch amd64
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Version:   v0.11.0
//! File:      ollama-darwin.tgz (22.6MB, application/gzip)
//! Digest:    sha256:88ac97...
//! Downloads: 115
//! URL:       https://github.com/ollama/ollama/releases/download/v0.11.0/ollama-darwin.tgz
//! Release:   https://github.com/ollama/ollama/releases/tag/v0.11.0
//! ```

use anyhow::Result;
use clap::Args;
use ollama_kit::Version;

use crate::settings::{GlobalArgs, PlatformArgs};

/// Arguments for the metadata command.
#[derive(Args)]
pub struct MetadataArgs {
    /// Version to look up (e.g., "v0.11.0" or "latest").
    #[clap(default_value = "latest")]
    pub version: Version,

    #[command(flatten)]
    pub platform: PlatformArgs,
}

/// Executes the metadata command.
///
/// # Errors
///
/// Returns an error if the index is unreachable or has no matching asset.
pub async fn execute(global: &GlobalArgs, args: &MetadataArgs) -> Result<()> {
    let ollama = global.ollama()?;
    let platform = args.platform.resolve()?;
    let metadata = ollama.metadata(&args.version, platform).await?;

    println!("Version:   {}", metadata.version);
    println!(
        "File:      {} ({}MB, {})",
        metadata.file_name,
        metadata.size_mb(),
        metadata.content_type
    );
    println!(
        "Digest:    {}",
        metadata.digest.as_deref().unwrap_or("(none published)")
    );
    println!("Downloads: {}", metadata.download_count);
    println!("URL:       {}", metadata.download_url);
    println!("Release:   {}", metadata.release_url);

    Ok(())
}
