//! Release installation: metadata lookup, download and extraction.
//!
//! ## Progress Sequence
//!
//! | percent  | message                                   |
//! |----------|-------------------------------------------|
//! | 0        | `Fetching release metadata`               |
//! | 5        | `Creating directory`                      |
//! | 10       | `Downloading <file> (<size>MB)`           |
//! | 10..=90  | throttled byte progress                   |
//! | 90       | `Extracting archive <file> in <dir>`      |
//! | 100      | `Extracted archive <file>`                |
//!
//! Tarballs are decoded while bytes are still arriving; their "Extracting"
//! step is announced once the last byte has been handed to the decoder.

use std::path::{Path, PathBuf};

use crate::archive::{self, ChannelReader};
use crate::config::OllamaConfig;
use crate::download::{
    self, ByteProgress, DOWNLOAD_END_PERCENT, DOWNLOAD_START_PERCENT, ProgressCallback, Reporter,
};
use crate::error::{Error, Result};
use crate::platform::PlatformConfig;
use crate::release::{AssetMetadata, ReleaseClient};
use crate::store::ArtifactStore;
use crate::version::{ReleaseTag, Version};

/// How a release asset must be unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// A ZIP archive (Windows builds).
    Zip,
    /// A gzipped tarball (macOS and Linux builds).
    TarGz,
}

impl ArchiveKind {
    /// Classifies an asset by its declared MIME type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedContentType`] for anything outside the zip
    /// and gzip/tar families.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        match content_type {
            "application/zip" | "application/x-zip-compressed" => Ok(Self::Zip),
            "application/x-gtar"
            | "application/x-tar"
            | "application/x-gzip"
            | "application/tar"
            | "application/gzip"
            | "application/x-tgz" => Ok(Self::TarGz),
            other => Err(Error::UnsupportedContentType {
                content_type: other.to_string(),
            }),
        }
    }
}

/// Downloads and unpacks releases into an [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct Installer {
    releases: ReleaseClient,
    store: ArtifactStore,
    http: reqwest::Client,
    keep_archive: bool,
}

impl Installer {
    /// Creates an installer that resolves through `releases` and writes into `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the download client cannot be constructed.
    pub fn new(
        releases: ReleaseClient,
        store: ArtifactStore,
        config: &OllamaConfig,
    ) -> Result<Self> {
        // No overall timeout: archives run to more than a gigabyte.
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            releases,
            store,
            http,
            keep_archive: config.keep_archive,
        })
    }

    /// Returns the store releases are installed into.
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Returns the release client used for metadata lookups.
    #[must_use]
    pub fn releases(&self) -> &ReleaseClient {
        &self.releases
    }

    /// Installs `version` for `platform` and returns the concrete tag.
    ///
    /// Re-installing an existing version overwrites its files in place.
    ///
    /// # Errors
    ///
    /// - [`Error::IndexUnavailable`] / [`Error::AssetNotFound`] from the lookup
    /// - [`Error::UnsupportedContentType`] before any byte is downloaded
    /// - [`Error::Download`] if the archive request fails
    /// - [`Error::Extraction`] / [`Error::Io`] if unpacking fails
    pub async fn install(
        &self,
        version: &Version,
        platform: PlatformConfig,
        progress: Option<&ProgressCallback>,
    ) -> Result<ReleaseTag> {
        let reporter = Reporter::new(progress);

        reporter.report(0, "Fetching release metadata");
        let metadata = self.releases.fetch_release(version, platform).await?;
        let kind = ArchiveKind::from_content_type(&metadata.content_type)?;
        let bin_dir = self.store.bin_directory(&metadata.version, platform);

        reporter.report(5, "Creating directory");
        tokio::fs::create_dir_all(&bin_dir)
            .await
            .map_err(|e| Error::io(format!("failed to create {}", bin_dir.display()), e))?;

        tracing::info!(
            version = %metadata.version,
            %platform,
            file = %metadata.file_name,
            dest = %bin_dir.display(),
            "installing Ollama"
        );

        reporter.report(
            DOWNLOAD_START_PERCENT,
            format!("Downloading {} ({}MB)", metadata.file_name, metadata.size_mb()),
        );
        let response = download::open(&self.http, &metadata.download_url).await?;
        let total = if metadata.size > 0 {
            metadata.size
        } else {
            response.content_length().unwrap_or(0)
        };
        let mut bytes = ByteProgress::new(reporter, &metadata.file_name, total);

        match kind {
            ArchiveKind::Zip => {
                let archive_path = bin_dir.join(&metadata.file_name);
                download::to_file(response, &archive_path, &mut bytes).await?;
                report_extracting(reporter, &metadata, &bin_dir);
                self.unzip(archive_path, bin_dir.clone()).await?;
            }
            ArchiveKind::TarGz => {
                let (tx, reader) = ChannelReader::channel();
                let dest = bin_dir.clone();
                let extract =
                    tokio::task::spawn_blocking(move || archive::extract_tar_gz(reader, &dest));

                let pumped = download::to_channel(response, tx, &mut bytes).await;
                if pumped.is_ok() {
                    report_extracting(reporter, &metadata, &bin_dir);
                }
                let extracted = join_blocking(extract, &bin_dir).await;
                pumped?;
                extracted?;
            }
        }

        reporter.report(100, format!("Extracted archive {}", metadata.file_name));
        tracing::info!(
            version = %metadata.version,
            dest = %bin_dir.display(),
            "installed Ollama"
        );

        Ok(metadata.version)
    }

    async fn unzip(&self, archive_path: PathBuf, dest: PathBuf) -> Result<()> {
        let remove = !self.keep_archive;
        let dir = dest.clone();
        let task =
            tokio::task::spawn_blocking(move || archive::extract_zip(&archive_path, &dest, remove));
        join_blocking(task, &dir).await
    }
}

fn report_extracting(reporter: Reporter<'_>, metadata: &AssetMetadata, bin_dir: &Path) {
    reporter.report(
        DOWNLOAD_END_PERCENT,
        format!(
            "Extracting archive {} in {}",
            metadata.file_name,
            bin_dir.display()
        ),
    );
}

async fn join_blocking(task: tokio::task::JoinHandle<Result<()>>, dest: &Path) -> Result<()> {
    task.await
        .map_err(|e| Error::extraction(dest, format!("extraction task failed: {e}")))?
}
