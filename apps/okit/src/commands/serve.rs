//! Serve command for the okit CLI.
//!
//! Installs the release if it is missing, starts `ollama serve`, waits for
//! the health endpoint and keeps the server running until Ctrl-C.
//!
//! ## Usage
//!
//! ```bash
//! okit serve                   # latest release
//! okit serve v0.11.0
//! okit serve v0.11.0 --quiet    # do not echo server output
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ollama_kit::{
    LogStream, ProgressCallback, ServeOptions, ServerLog, ServerLogCallback, Version,
};

use crate::commands::download::print_progress;
use crate::settings::GlobalArgs;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Version to run (e.g., "v0.11.0" or "latest").
    #[clap(default_value = "latest")]
    pub version: Version,

    /// Do not echo server output.
    #[clap(long)]
    pub quiet: bool,
}

/// Executes the serve command.
///
/// If a server already answers at the health URL, nothing is started.
/// `latest` is resolved to a concrete tag through the release index first.
///
/// # Errors
///
/// Returns an error if `latest` cannot be resolved, installation fails, the
/// executable cannot be spawned, or the server does not become ready in time.
pub async fn execute(global: &GlobalArgs, args: &ServeArgs) -> Result<()> {
    let ollama = global.ollama()?;

    if ollama.is_running().await {
        println!(
            "An Ollama server is already running at {}.",
            ollama.config().health_url
        );
        return Ok(());
    }

    let tag = match &args.version {
        Version::Tag(tag) => tag.clone(),
        Version::Latest => {
            let platform = ollama.current_platform()?;
            ollama
                .metadata(&Version::Latest, platform)
                .await
                .context("Failed to resolve the latest release")?
                .version
        }
    };

    let progress: ProgressCallback = Arc::new(print_progress);
    let server_log: Option<ServerLogCallback> = if args.quiet {
        None
    } else {
        Some(Arc::new(print_server_line))
    };
    let options = ServeOptions {
        server_log,
        download_progress: Some(progress),
    };

    let server = match ollama.serve(&tag, options).await {
        Ok(server) => server,
        Err(e) => {
            if let Some(server) = ollama.server() {
                server.stop().await;
            }
            return Err(e).with_context(|| format!("Failed to serve Ollama {tag}"));
        }
    };

    match ollama.live_version().await {
        Ok(live) => println!("Ollama {live} is running (pid {:?}).", server.pid()),
        Err(e) => tracing::warn!(error = %e, "could not read server version"),
    }
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    println!("Stopping Ollama...");
    server.stop().await;

    Ok(())
}

#[allow(clippy::needless_pass_by_value)]
fn print_server_line(log: ServerLog) {
    match log.stream {
        LogStream::Stdout => println!("[ollama] {}", log.line),
        LogStream::Stderr => eprintln!("[ollama] {}", log.line),
    }
}
