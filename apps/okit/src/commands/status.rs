//! Status command for the okit CLI.
//!
//! ## Usage
//!
//! ```bash
//! okit status
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Ollama is running at http://localhost:11434 (version 0.11.0)
//! ```

use anyhow::Result;

use crate::settings::GlobalArgs;

/// Executes the status command.
///
/// # Errors
///
/// Returns an error only if the configuration cannot be resolved.
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let ollama = global.ollama()?;
    let url = &ollama.config().health_url;

    if !ollama.is_running().await {
        println!("Ollama is not running at {url}");
        return Ok(());
    }

    match ollama.live_version().await {
        Ok(version) => println!("Ollama is running at {url} (version {version})"),
        Err(e) => {
            tracing::debug!(error = %e, "version request failed");
            println!("Ollama is running at {url}");
        }
    }

    Ok(())
}
