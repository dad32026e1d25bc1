//! Platform command for the okit CLI.
//!
//! ## Usage
//!
//! ```bash
//! okit platform    # e.g. "linux-amd64"
//! ```

use anyhow::Result;
use ollama_kit::PlatformConfig;

/// Executes the platform command.
///
/// # Errors
///
/// Returns an error if this machine has no Ollama build.
pub fn execute() -> Result<()> {
    let platform = PlatformConfig::current()?;
    println!("{platform}");
    Ok(())
}
