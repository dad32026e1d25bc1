//! Shared CLI flags and configuration resolution.
//!
//! Each setting is taken from the first source that provides it:
//! command-line flag, environment variable, `--config` file, built-in default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use ollama_kit::{Arch, Ollama, OllamaConfig, Os, PlatformConfig};

/// Directory under the user data directory used when no base path is given.
const DEFAULT_HOME_DIR: &str = "okit";

/// Log verbosity for the stderr subscriber.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Base directory for installed releases.
    #[clap(long, env = "OKIT_HOME", global = true)]
    pub base_path: Option<PathBuf>,

    /// Release index API root.
    #[clap(long, env = "OKIT_API_BASE", global = true, hide = true)]
    pub api_base: Option<String>,

    /// TOML configuration file.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level for diagnostics on stderr.
    #[clap(long, value_enum, default_value = "warn", global = true)]
    pub log_level: LogLevel,
}

impl GlobalArgs {
    /// Builds the library configuration from flags, environment and file.
    pub fn load_config(&self) -> Result<OllamaConfig> {
        let mut config = match &self.config {
            Some(path) => OllamaConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => OllamaConfig::default(),
        };

        if let Some(base_path) = &self.base_path {
            config.base_path.clone_from(base_path);
        } else if config.base_path.as_os_str().is_empty() {
            config.base_path = default_base_path()?;
        }

        if let Some(api_base) = &self.api_base {
            config.api_base.clone_from(api_base);
        }

        Ok(config)
    }

    /// Builds an [`Ollama`] manager from the resolved configuration.
    pub fn ollama(&self) -> Result<Ollama> {
        let config = self.load_config()?;
        tracing::debug!(base_path = %config.base_path.display(), "resolved configuration");
        Ollama::new(config).context("Failed to initialize")
    }
}

fn default_base_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(DEFAULT_HOME_DIR))
        .context("Cannot determine a data directory; pass --base-path or set OKIT_HOME")
}

/// Optional platform override shared by the release commands.
#[derive(Args, Debug)]
pub struct PlatformArgs {
    /// Target OS (windows, darwin, linux). Defaults to this machine.
    #[clap(long, requires = "arch")]
    pub os: Option<String>,

    /// Target architecture (arm64, amd64). Defaults to this machine.
    #[clap(long, requires = "os")]
    pub arch: Option<String>,
}

impl PlatformArgs {
    /// Returns the requested platform, or the detected one.
    pub fn resolve(&self) -> Result<PlatformConfig> {
        match (&self.os, &self.arch) {
            (Some(os), Some(arch)) => {
                let os: Os = os.parse()?;
                let arch: Arch = arch.parse()?;
                Ok(PlatformConfig::new(os, arch))
            }
            _ => Ok(PlatformConfig::current()?),
        }
    }
}
