#![warn(clippy::pedantic)]

//! # okit
//!
//! Command-line front end for `ollama-kit`: look up, install, list and run
//! pinned Ollama releases.
//!
//! ## Subcommands
//!
//! - `platform` - Print the detected platform
//! - `metadata` - Show release asset metadata
//! - `download` - Install a release
//! - `list` - List installed releases
//! - `bin-path` - Print the install directory of a release
//! - `serve` - Run a release until Ctrl-C
//! - `status` - Report whether a server is answering
//!
//! ## Examples
//!
//! ```bash
//! okit download v0.11.0
//! okit serve v0.11.0
//! OKIT_HOME=/tmp/okit okit list
//! ```

mod commands;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{bin_path, download, list, metadata, platform, serve, status};
use settings::{GlobalArgs, LogLevel};
use tracing_subscriber::EnvFilter;

/// Manage pinned Ollama releases.
#[derive(Parser)]
#[command(
    name = "okit",
    author,
    version,
    about = "Download, install and run pinned Ollama releases",
    after_help = "\
CONFIGURATION PRECEDENCE:
    1. Command-line flags
    2. Environment variables
    3. Config file (--config)
    4. Built-in defaults

ENVIRONMENT VARIABLES:
    OKIT_HOME               Base path for installed releases
    OKIT_API_BASE           Release index API root (default: https://api.github.com)
    RUST_LOG                Extra tracing filter directives"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the okit CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Print the platform of this machine as `<os>-<arch>`.
    Platform,

    /// Show metadata of the release asset for a version.
    Metadata(metadata::MetadataArgs),

    /// Download and extract a release.
    ///
    /// If no version is specified, installs the latest release.
    Download(download::DownloadArgs),

    /// List installed releases.
    List(list::ListArgs),

    /// Print the install directory of a release.
    BinPath(bin_path::BinPathArgs),

    /// Install a release if needed and run `ollama serve` until Ctrl-C.
    Serve(serve::ServeArgs),

    /// Report whether an Ollama server answers at the health URL.
    Status,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints the error chain and returns the exit code.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    1
}

/// Installs a stderr subscriber filtered by `--log-level` and `RUST_LOG`.
fn initialize_tracing(log_level: LogLevel) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());
    if let Ok(extra) = std::env::var("RUST_LOG") {
        for directive in extra.split(',').filter_map(|d| d.parse().ok()) {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(cli.global.log_level);

    match cli.command {
        Commands::Platform => platform::execute(),
        Commands::Metadata(args) => metadata::execute(&cli.global, &args).await,
        Commands::Download(args) => download::execute(&cli.global, &args).await,
        Commands::List(args) => list::execute(&cli.global, &args),
        Commands::BinPath(args) => bin_path::execute(&cli.global, &args),
        Commands::Serve(args) => serve::execute(&cli.global, &args).await,
        Commands::Status => status::execute(&cli.global).await,
    }
}
