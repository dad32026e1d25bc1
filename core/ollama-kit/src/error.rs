//! Error types for the ollama-kit crate.
//!
//! Every fallible operation in this crate returns [`Result`], whose error is
//! the [`Error`] enum below. Variants map one-to-one onto the failure classes
//! a host has to tell apart: environment incompatibility, upstream faults,
//! compatibility gaps between a release and a platform, archive or disk
//! faults, and a server that never became ready.
//!
//! No variant is retried inside the crate. Hosts layer their own retry policy
//! on top of these single-attempt operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::platform::PlatformConfig;
use crate::version::ReleaseTag;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Consolidated error type for ollama-kit operations.
#[derive(Debug, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum Error {
    /// The host OS is outside `{windows, darwin, linux}`.
    #[error("Unsupported platform: {os}")]
    UnsupportedPlatform {
        /// The native OS identifier that was rejected.
        os: String,
    },

    /// The host CPU architecture is outside `{arm64, amd64}`.
    #[error("Unsupported architecture: {arch}")]
    UnsupportedArchitecture {
        /// The native architecture identifier that was rejected.
        arch: String,
    },

    /// A version string is neither `latest` nor a `v<semver>` tag.
    #[error("invalid version '{input}': expected 'latest' or a tag like v0.11.0")]
    InvalidVersion {
        /// The rejected input.
        input: String,
    },

    /// The release index request failed or returned a non-success status.
    #[error("GitHub request failed ({url}): {body}")]
    IndexUnavailable {
        /// The index URL that was requested.
        url: String,
        /// HTTP status, when a response was received at all.
        status: Option<u16>,
        /// Upstream error body, or the transport error description.
        body: String,
    },

    /// The release has no asset for the requested platform.
    #[error("{platform} is not supported by Ollama {version}")]
    AssetNotFound {
        /// Platform whose asset was missing.
        platform: PlatformConfig,
        /// Concrete tag the request resolved to.
        version: ReleaseTag,
    },

    /// The asset's declared content type is neither zip nor gzip/tar.
    #[error("The Ollama asset type {content_type} is not supported")]
    UnsupportedContentType {
        /// The declared content type.
        content_type: String,
    },

    /// The archive download failed.
    #[error("download error ({url}): {message}")]
    Download {
        /// Archive URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// An archive could not be decoded or an entry could not be written.
    #[error("extraction error ({}): {message}", path.display())]
    Extraction {
        /// Archive or entry path involved in the failure.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The server executable could not be spawned.
    #[error("failed to spawn {}: {source}", path.display())]
    Spawn {
        /// Executable path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A server handle was asked to do something its state does not allow.
    #[error("server is {state}, cannot {action}")]
    InvalidServerState {
        /// Current state name.
        state: &'static str,
        /// Attempted action.
        action: &'static str,
    },

    /// The server never answered the health probe within the budget.
    #[error("Ollama server failed to start in {}", humanize(*timeout))]
    StartupTimeout {
        /// The configured startup budget.
        timeout: Duration,
    },

    /// A request against the local server failed.
    #[error("health request failed ({url}): {message}")]
    Health {
        /// Requested URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// Configuration could not be parsed.
    #[error("config error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// Filesystem error outside of extraction.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Creates a new `IndexUnavailable` error.
    pub fn index_unavailable(
        url: impl Into<String>,
        status: Option<u16>,
        body: impl Into<String>,
    ) -> Self {
        Self::IndexUnavailable {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a new `Download` error.
    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Extraction` error.
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Health` error.
    pub fn health(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Health {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

fn humanize(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os};

    #[test]
    fn unsupported_platform_names_os() {
        let err = Error::UnsupportedPlatform {
            os: "freebsd".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported platform: freebsd");
    }

    #[test]
    fn asset_not_found_names_platform_and_tag() {
        let err = Error::AssetNotFound {
            platform: PlatformConfig::new(Os::Darwin, Arch::Arm64),
            version: "v0.11.0".parse().unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "darwin-arm64 is not supported by Ollama v0.11.0"
        );
    }

    #[test]
    fn startup_timeout_formats_whole_seconds() {
        let err = Error::StartupTimeout {
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "Ollama server failed to start in 5s");
    }

    #[test]
    fn startup_timeout_formats_millis() {
        let err = Error::StartupTimeout {
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Ollama server failed to start in 250ms");
    }

    #[test]
    fn index_unavailable_carries_upstream_body() {
        let err = Error::index_unavailable(
            "https://api.github.com/x",
            Some(404),
            r#"{"message":"Not Found"}"#,
        );
        assert!(err.to_string().contains("Not Found"));
        assert!(matches!(err, Error::IndexUnavailable { status: Some(404), .. }));
    }

    #[test]
    fn unsupported_content_type_names_type() {
        let err = Error::UnsupportedContentType {
            content_type: "application/x-rar-compressed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "The Ollama asset type application/x-rar-compressed is not supported"
        );
    }
}
