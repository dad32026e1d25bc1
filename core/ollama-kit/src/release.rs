//! Release index lookup.
//!
//! Fetches one release record from the GitHub releases API and picks out the
//! asset matching a platform.
//!
//! ## Response Format
//!
//! Only the fields below are read; everything else in the release object is
//! ignored.
//!
//! ```json
//! {
//!   "tag_name": "v0.11.0",
//!   "html_url": "https://github.com/ollama/ollama/releases/tag/v0.11.0",
//!   "body": "Welcome OpenAI's gpt-oss models ...",
//!   "assets": [
//!     {
//!       "name": "ollama-darwin.tgz",
//!       "content_type": "application/gzip",
//!       "size": 23699596,
//!       "digest": "sha256:88ac97...",
//!       "download_count": 115,
//!       "browser_download_url": "https://github.com/.../ollama-darwin.tgz"
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::config::OllamaConfig;
use crate::error::{Error, Result};
use crate::platform::PlatformConfig;
use crate::version::{ReleaseTag, Version};

/// `Accept` header value required by the GitHub REST API.
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Pinned GitHub REST API version.
const GITHUB_API_VERSION: &str = "2022-11-28";

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("ollama-kit/", env!("CARGO_PKG_VERSION"));

/// A release as returned by the index.
#[derive(Debug, Clone, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    html_url: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, Deserialize)]
struct GitHubAsset {
    name: String,
    content_type: String,
    size: u64,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    download_count: u64,
    browser_download_url: String,
}

/// Everything known about the asset selected for one version and platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Upstream digest (e.g. `sha256:...`). Older releases publish none.
    pub digest: Option<String>,
    /// Archive size in bytes.
    pub size: u64,
    /// Asset file name (e.g. `ollama-darwin.tgz`).
    pub file_name: String,
    /// Declared MIME type of the archive.
    pub content_type: String,
    /// Concrete tag the request resolved to.
    pub version: ReleaseTag,
    /// Upstream download counter.
    pub download_count: u64,
    /// Direct archive URL.
    pub download_url: String,
    /// Human-facing release page.
    pub release_url: String,
    /// Release notes (markdown).
    pub release_notes: String,
}

impl AssetMetadata {
    /// Formats the archive size in MiB with one decimal, e.g. `"22.6"`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> String {
        format!("{:.1}", self.size as f64 / (1024.0 * 1024.0))
    }
}

/// Client for the release index.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    asset_prefix: String,
}

impl ReleaseClient {
    /// Builds a client from the index settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be constructed.
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            asset_prefix: config.asset_prefix.clone(),
        })
    }

    /// Returns the index URL for a version request.
    #[must_use]
    pub fn release_url(&self, version: &Version) -> String {
        let path = match version {
            Version::Latest => "latest".to_string(),
            Version::Tag(tag) => format!("tags/{tag}"),
        };
        format!(
            "{}/repos/{}/{}/releases/{path}",
            self.api_base, self.owner, self.repo
        )
    }

    /// Returns the expected asset name for a platform.
    #[must_use]
    pub fn asset_name(&self, platform: PlatformConfig) -> String {
        platform.asset_name(&self.asset_prefix)
    }

    /// Resolves `version` against the index and selects the asset for `platform`.
    ///
    /// Issues exactly one GET; a failure is reported immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::IndexUnavailable`] if the request fails, returns a non-success
    ///   status, or the body is not a release record
    /// - [`Error::AssetNotFound`] if the release has no asset for `platform`
    pub async fn fetch_release(
        &self,
        version: &Version,
        platform: PlatformConfig,
    ) -> Result<AssetMetadata> {
        let url = self.release_url(version);
        tracing::debug!(%url, %platform, "fetching release metadata");

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await
            .map_err(|e| Error::index_unavailable(&url, None, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::index_unavailable(&url, Some(status.as_u16()), e.to_string()))?;

        if !status.is_success() {
            return Err(Error::index_unavailable(&url, Some(status.as_u16()), text));
        }

        let release: GitHubRelease = serde_json::from_str(&text).map_err(|e| {
            Error::index_unavailable(
                &url,
                Some(status.as_u16()),
                format!("failed to parse release: {e}"),
            )
        })?;

        select_asset(release, &self.asset_name(platform), platform, &url)
    }
}

/// Picks the asset named `asset_name` out of a release record.
fn select_asset(
    release: GitHubRelease,
    asset_name: &str,
    platform: PlatformConfig,
    url: &str,
) -> Result<AssetMetadata> {
    let version: ReleaseTag = release.tag_name.parse().map_err(|_| {
        Error::index_unavailable(
            url,
            None,
            format!("release has malformed tag '{}'", release.tag_name),
        )
    })?;

    let Some(asset) = release.assets.into_iter().find(|a| a.name == asset_name) else {
        return Err(Error::AssetNotFound { platform, version });
    };

    Ok(AssetMetadata {
        digest: asset.digest,
        size: asset.size,
        file_name: asset.name,
        content_type: asset.content_type,
        version,
        download_count: asset.download_count,
        download_url: asset.browser_download_url,
        release_url: release.html_url,
        release_notes: release.body.unwrap_or_default(),
    })
}
