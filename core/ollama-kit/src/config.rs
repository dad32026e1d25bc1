//! Configuration for an [`Ollama`](crate::Ollama) instance.
//!
//! One [`OllamaConfig`] value is built per facade and shared by every
//! component it owns. Only `base_path` has no default; hosts typically point
//! it at their per-user data directory.
//!
//! ## TOML Format
//!
//! ```toml
//! base_path = "/home/me/.local/share/my-app"
//! directory = "electron-ollama"
//! api_base = "https://api.github.com"
//! health_url = "http://localhost:11434"
//! poll_interval_ms = 100
//! startup_timeout_ms = 5000
//! keep_archive = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::platform::DEFAULT_ASSET_PREFIX;

/// Default subdirectory under `base_path` that holds every installed version.
pub const DEFAULT_DIRECTORY: &str = "electron-ollama";

/// Default release index API root.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default GitHub repository owner.
pub const DEFAULT_OWNER: &str = "ollama";

/// Default GitHub repository name.
pub const DEFAULT_REPO: &str = "ollama";

/// Default local health endpoint of `ollama serve`.
pub const DEFAULT_HEALTH_URL: &str = "http://localhost:11434";

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Settings shared by the release client, store, installer and supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Host-supplied storage root.
    pub base_path: PathBuf,
    /// Subdirectory of `base_path` holding versions (default `electron-ollama`).
    pub directory: String,
    /// Release index API root (default `https://api.github.com`).
    pub api_base: String,
    /// Repository owner on the release index.
    pub owner: String,
    /// Repository name on the release index.
    pub repo: String,
    /// Asset file name prefix (default `ollama`).
    pub asset_prefix: String,
    /// Health endpoint probed for readiness (default `http://localhost:11434`).
    pub health_url: String,
    /// Delay between readiness probes, in milliseconds.
    pub poll_interval_ms: u64,
    /// Readiness budget after spawning, in milliseconds.
    pub startup_timeout_ms: u64,
    /// How long `stop` waits for the child to exit, in milliseconds.
    pub stop_timeout_ms: u64,
    /// Timeout for release index requests, in milliseconds.
    pub request_timeout_ms: u64,
    /// Keep downloaded zip archives next to the extracted files.
    pub keep_archive: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::new(),
            directory: DEFAULT_DIRECTORY.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            owner: DEFAULT_OWNER.to_string(),
            repo: DEFAULT_REPO.to_string(),
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
            health_url: DEFAULT_HEALTH_URL.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            keep_archive: false,
        }
    }
}

impl OllamaConfig {
    /// Creates a configuration with defaults for everything but `base_path`.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Parses a configuration from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not valid TOML for this shape.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it cannot be parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
        Self::from_toml_str(&text)
    }

    /// Overrides the versions subdirectory.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    /// Overrides the release index API root.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Overrides the probed health endpoint.
    #[must_use]
    pub fn with_health_url(mut self, health_url: impl Into<String>) -> Self {
        self.health_url = health_url.into();
        self
    }

    /// Overrides the readiness poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Overrides the readiness budget.
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout_ms = duration_ms(timeout);
        self
    }

    /// Overrides how long `stop` waits for the child to exit.
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout_ms = duration_ms(timeout);
        self
    }

    /// Keeps or removes downloaded zip archives after extraction.
    #[must_use]
    pub fn with_keep_archive(mut self, keep: bool) -> Self {
        self.keep_archive = keep;
        self
    }

    /// Delay between readiness probes.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Readiness budget after spawning.
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// How long `stop` waits for the child to exit.
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Timeout for release index requests.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
