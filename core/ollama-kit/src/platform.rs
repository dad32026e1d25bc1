//! Platform detection and release asset naming.
//!
//! This module maps the running machine onto one of the (os, arch) pairs
//! Ollama publishes binaries for, and derives the archive name and executable
//! location that go with each pair.
//!
//! ## Supported Platforms
//!
//! | os        | arch           | asset                         | executable   |
//! |-----------|----------------|-------------------------------|--------------|
//! | `windows` | `arm64`/`amd64`| `ollama-windows-<arch>.zip`   | `ollama.exe` |
//! | `darwin`  | universal      | `ollama-darwin.tgz`           | `ollama`     |
//! | `linux`   | `arm64`/`amd64`| `ollama-linux-<arch>.tgz`     | `bin/ollama` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default release asset prefix.
pub const DEFAULT_ASSET_PREFIX: &str = "ollama";

/// Operating systems with published Ollama builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Microsoft Windows
    Windows,
    /// macOS
    Darwin,
    /// Linux
    Linux,
}

impl Os {
    /// Returns the identifier used in asset names and storage paths.
    #[must_use = "returns the OS string without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Darwin => "darwin",
            Self::Linux => "linux",
        }
    }

    fn from_native(os: &str) -> Option<Self> {
        match os {
            "windows" | "win32" => Some(Self::Windows),
            "macos" | "darwin" => Some(Self::Darwin),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }
}

impl FromStr for Os {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_native(s).ok_or_else(|| Error::UnsupportedPlatform { os: s.to_string() })
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architectures with published Ollama builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit ARM (`aarch64`)
    Arm64,
    /// 64-bit x86 (`x86_64`)
    Amd64,
}

impl Arch {
    /// Returns the identifier used in asset names and storage paths.
    #[must_use = "returns the architecture string without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::Amd64 => "amd64",
        }
    }

    fn from_native(arch: &str) -> Option<Self> {
        match arch {
            "aarch64" | "arm64" => Some(Self::Arm64),
            "x86_64" | "x64" | "amd64" => Some(Self::Amd64),
            _ => None,
        }
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_native(s).ok_or_else(|| Error::UnsupportedArchitecture {
            arch: s.to_string(),
        })
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An (os, arch) pair selecting which release asset applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl PlatformConfig {
    /// Creates a platform from its parts.
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detects the platform this process is running on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] or [`Error::UnsupportedArchitecture`]
    /// if the current OS/architecture has no Ollama build.
    ///
    /// # Examples
    ///
    /// ```
    /// use ollama_kit::PlatformConfig;
    ///
    /// if let Ok(platform) = PlatformConfig::current() {
    ///     println!("Running on: {platform}");
    /// }
    /// ```
    pub fn current() -> Result<Self> {
        Self::from_native(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Maps native OS and architecture identifiers onto a supported platform.
    ///
    /// Accepts both Rust (`macos`, `x86_64`) and Node-style (`win32`, `x64`)
    /// spellings. The OS is checked before the architecture.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] for an unknown OS and
    /// [`Error::UnsupportedArchitecture`] for an unknown architecture.
    pub fn from_native(os: &str, arch: &str) -> Result<Self> {
        let os = Os::from_native(os).ok_or_else(|| Error::UnsupportedPlatform {
            os: os.to_string(),
        })?;
        let arch = Arch::from_native(arch).ok_or_else(|| Error::UnsupportedArchitecture {
            arch: arch.to_string(),
        })?;
        Ok(Self { os, arch })
    }

    /// Returns the release asset file name for this platform.
    ///
    /// macOS ships a single universal archive, so `arch` does not appear in
    /// its name.
    #[must_use = "returns the asset name without side effects"]
    pub fn asset_name(self, prefix: &str) -> String {
        match self.os {
            Os::Windows => format!("{prefix}-windows-{}.zip", self.arch),
            Os::Darwin => format!("{prefix}-darwin.tgz"),
            Os::Linux => format!("{prefix}-linux-{}.tgz", self.arch),
        }
    }

    /// Returns the executable's path relative to an install directory.
    #[must_use]
    pub fn executable_path(self) -> &'static str {
        match self.os {
            Os::Windows => "ollama.exe",
            Os::Darwin => "ollama",
            Os::Linux => "bin/ollama",
        }
    }
}

impl fmt::Display for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
