#![warn(clippy::pedantic)]
//! Pinned Ollama binaries for desktop hosts.
//!
//! This crate resolves an Ollama release against the GitHub release index,
//! downloads and unpacks the archive for the current platform into a
//! versioned directory, and supervises one `ollama serve` child process until
//! it answers its health endpoint.
//!
//! ## Overview
//!
//! ```text
//! Version ──▶ ReleaseClient ──▶ AssetMetadata ──▶ Installer ──▶ ArtifactStore
//!                                                                   │
//!                        HealthProbe ◀── Ollama::serve ◀── OllamaServer
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ollama_kit::{Ollama, OllamaConfig, ServeOptions, Version};
//!
//! # async fn run() -> ollama_kit::Result<()> {
//! let ollama = Ollama::new(OllamaConfig::new("/home/me/.local/share/my-app"))?;
//! let platform = ollama.current_platform()?;
//!
//! let tag = ollama.download(&Version::Latest, platform, None).await?;
//! let server = ollama.serve(&tag, ServeOptions::default()).await?;
//! assert!(ollama.is_running().await);
//! server.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Milestones are emitted through [`tracing`]. The crate never installs a
//! subscriber; hosts choose one.

pub mod archive;
pub mod config;
pub mod download;
pub mod error;
pub mod health;
pub mod install;
pub mod ollama;
pub mod platform;
pub mod release;
pub mod server;
pub mod store;
pub mod version;

pub use config::OllamaConfig;
pub use download::{ProgressCallback, ProgressEvent};
pub use error::{Error, Result};
pub use health::{HealthProbe, HttpProbe};
pub use install::{ArchiveKind, Installer};
pub use ollama::{Ollama, ServeOptions};
pub use platform::{Arch, Os, PlatformConfig};
pub use release::{AssetMetadata, ReleaseClient};
pub use server::{LogStream, OllamaServer, ServerLog, ServerLogCallback, ServerState};
pub use store::ArtifactStore;
pub use version::{ReleaseTag, Version};
