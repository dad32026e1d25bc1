//! Command modules for the okit CLI.
//!
//! ## Release Commands
//!
//! - [`metadata`] - Show release asset metadata
//! - [`download`] - Install a release
//! - [`list`] - List installed releases
//! - [`bin_path`] - Print an install directory
//!
//! ## Server Commands
//!
//! - [`serve`] - Run a release until interrupted
//! - [`status`] - Probe the health endpoint
//!
//! ## Environment
//!
//! - [`platform`] - Print the detected platform

pub mod bin_path;
pub mod download;
pub mod list;
pub mod metadata;
pub mod platform;
pub mod serve;
pub mod status;
