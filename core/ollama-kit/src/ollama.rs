//! The host-facing entry point.
//!
//! [`Ollama`] wires the release client, artifact store, installer and health
//! probe together from one [`OllamaConfig`] and tracks the server it most
//! recently started.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tokio::time::Instant;

use crate::config::OllamaConfig;
use crate::download::ProgressCallback;
use crate::error::{Error, Result};
use crate::health::{HealthProbe, HttpProbe};
use crate::install::Installer;
use crate::platform::PlatformConfig;
use crate::release::{AssetMetadata, ReleaseClient};
use crate::server::{OllamaServer, ServerLogCallback};
use crate::store::ArtifactStore;
use crate::version::{ReleaseTag, Version};

/// Optional callbacks for [`Ollama::serve`].
#[derive(Clone, Default)]
pub struct ServeOptions {
    /// Receives server output lines.
    pub server_log: Option<ServerLogCallback>,
    /// Receives install progress if the version has to be downloaded first.
    pub download_progress: Option<ProgressCallback>,
}

/// Manages Ollama releases under one base path.
///
/// # Examples
///
/// ```no_run
/// use ollama_kit::{Ollama, OllamaConfig, ServeOptions};
///
/// # async fn run() -> ollama_kit::Result<()> {
/// let ollama = Ollama::new(OllamaConfig::new("/var/lib/my-app"))?;
/// let server = ollama.serve(&"v0.11.0".parse()?, ServeOptions::default()).await?;
/// println!("running from {}", server.bin_path().display());
/// server.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Ollama<P: HealthProbe = HttpProbe> {
    config: OllamaConfig,
    installer: Installer,
    probe: P,
    http_probe: HttpProbe,
    server: Mutex<Option<OllamaServer>>,
}

impl Ollama {
    /// Creates a manager probing `config.health_url` over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an HTTP client cannot be constructed.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let probe = HttpProbe::new(&config.health_url)?;
        Self::with_probe(config, probe)
    }
}

impl<P: HealthProbe> Ollama<P> {
    /// Creates a manager that uses `probe` for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an HTTP client cannot be constructed.
    pub fn with_probe(config: OllamaConfig, probe: P) -> Result<Self> {
        let releases = ReleaseClient::new(&config)?;
        let store = ArtifactStore::new(&config.base_path, &config.directory);
        let installer = Installer::new(releases, store, &config)?;
        let http_probe = HttpProbe::new(&config.health_url)?;

        Ok(Self {
            config,
            installer,
            probe,
            http_probe,
            server: Mutex::new(None),
        })
    }

    /// Returns the configuration this manager was built from.
    #[must_use]
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Detects the platform this process runs on.
    ///
    /// # Errors
    ///
    /// See [`PlatformConfig::current`].
    #[allow(clippy::unused_self)]
    pub fn current_platform(&self) -> Result<PlatformConfig> {
        PlatformConfig::current()
    }

    /// Returns the release asset name for `platform`.
    #[must_use]
    pub fn asset_name(&self, platform: PlatformConfig) -> String {
        self.installer.releases().asset_name(platform)
    }

    /// Looks up the asset for `version` and `platform` in the release index.
    ///
    /// # Errors
    ///
    /// See [`ReleaseClient::fetch_release`].
    pub async fn metadata(
        &self,
        version: &Version,
        platform: PlatformConfig,
    ) -> Result<AssetMetadata> {
        self.installer.releases().fetch_release(version, platform).await
    }

    /// Downloads and extracts `version` for `platform`, returning the concrete tag.
    ///
    /// # Errors
    ///
    /// See [`Installer::install`].
    pub async fn download(
        &self,
        version: &Version,
        platform: PlatformConfig,
        progress: Option<&ProgressCallback>,
    ) -> Result<ReleaseTag> {
        self.installer.install(version, platform, progress).await
    }

    /// Checks whether `version` is installed for `platform`.
    #[must_use]
    pub fn is_downloaded(&self, version: &ReleaseTag, platform: PlatformConfig) -> bool {
        self.store().is_installed(version, platform)
    }

    /// Lists installed versions for `platform`, oldest first.
    ///
    /// # Errors
    ///
    /// See [`ArtifactStore::installed_versions`].
    pub fn downloaded_versions(&self, platform: PlatformConfig) -> Result<Vec<ReleaseTag>> {
        self.store().installed_versions(platform)
    }

    /// Returns the install directory for `version` and `platform`.
    #[must_use]
    pub fn bin_path(&self, version: &ReleaseTag, platform: PlatformConfig) -> PathBuf {
        self.store().bin_directory(version, platform)
    }

    /// Returns the executable path for `version` and `platform`.
    #[must_use]
    pub fn executable_path(&self, version: &ReleaseTag, platform: PlatformConfig) -> PathBuf {
        self.store().executable_path(version, platform)
    }

    /// Installs `version` if needed, starts it and waits until it is ready.
    ///
    /// A new handle replaces the previously tracked one without stopping it.
    ///
    /// # Errors
    ///
    /// - any installer error if `version` was missing
    /// - [`Error::Spawn`] if the executable cannot be launched
    /// - [`Error::StartupTimeout`] if no probe succeeded within the startup
    ///   budget; the process is left running and stays reachable through
    ///   [`Ollama::server`]
    pub async fn serve(
        &self,
        version: &ReleaseTag,
        options: ServeOptions,
    ) -> Result<OllamaServer> {
        let platform = self.current_platform()?;

        if !self.is_downloaded(version, platform) {
            tracing::info!(%version, "version not installed, downloading");
            self.download(
                &Version::Tag(version.clone()),
                platform,
                options.download_progress.as_ref(),
            )
            .await?;
        }

        let server = OllamaServer::with_stop_timeout(
            self.bin_path(version, platform),
            options.server_log,
            self.config.stop_timeout(),
        );
        server.start(platform.executable_path())?;
        self.set_server(server.clone());

        let timeout = self.config.startup_timeout();
        let interval = self.config.poll_interval();
        let deadline = Instant::now() + timeout;

        loop {
            tokio::time::sleep(interval).await;
            let ready = tokio::time::timeout_at(deadline, self.probe.is_running())
                .await
                .unwrap_or(false);
            if ready {
                server.mark_running();
                tracing::info!(%version, pid = ?server.pid(), "Ollama server is ready");
                return Ok(server);
            }
            tracing::debug!(%version, "Ollama server not ready yet");
            if Instant::now() >= deadline {
                tracing::warn!(%version, ?timeout, "Ollama server did not become ready");
                return Err(Error::StartupTimeout { timeout });
            }
        }
    }

    /// Returns the most recently started server, if any.
    #[must_use]
    pub fn server(&self) -> Option<OllamaServer> {
        self.server
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs one health probe. Errors count as "not running".
    pub async fn is_running(&self) -> bool {
        self.probe.is_running().await
    }

    /// Asks the server at the health URL for its version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Health`] if the server does not answer.
    pub async fn live_version(&self) -> Result<String> {
        self.http_probe.version().await
    }

    fn store(&self) -> &ArtifactStore {
        self.installer.store()
    }

    fn set_server(&self, server: OllamaServer) {
        *self.server.lock().unwrap_or_else(PoisonError::into_inner) = Some(server);
    }
}
