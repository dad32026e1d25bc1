//! Readiness checks against a local Ollama server.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Text the root endpoint of `ollama serve` answers with.
pub const RUNNING_MARKER: &str = "Ollama is running";

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Decides whether a server is answering.
///
/// Implementations must never fail: any error counts as "not running".
pub trait HealthProbe: Send + Sync {
    /// Performs one check.
    fn is_running(&self) -> impl Future<Output = bool> + Send;
}

/// Probes the Ollama HTTP root endpoint.
///
/// Any service on the same port that answers with [`RUNNING_MARKER`] is
/// taken for an Ollama server.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

impl HttpProbe {
    /// Creates a probe for the server at `url` (e.g. `http://localhost:11434`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be constructed.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Asks the running server for its version via `GET /api/version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Health`] if the request fails, the status is not a
    /// success, or the body has no `version` field.
    pub async fn version(&self) -> Result<String> {
        let url = format!("{}/api/version", self.url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::health(&url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::health(&url, format!("HTTP error {status}")));
        }

        let body: VersionResponse = response
            .json()
            .await
            .map_err(|e| Error::health(&url, format!("failed to parse version: {e}")))?;
        Ok(body.version)
    }

    async fn check(&self) -> Result<bool> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::health(&self.url, e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::health(&self.url, e.to_string()))?;
        Ok(body.contains(RUNNING_MARKER))
    }
}

impl HealthProbe for HttpProbe {
    async fn is_running(&self) -> bool {
        match self.check().await {
            Ok(running) => running,
            Err(e) => {
                tracing::debug!(error = %e, "health probe failed");
                false
            }
        }
    }
}
