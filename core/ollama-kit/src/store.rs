//! On-disk layout of installed versions.
//!
//! ## Directory Structure
//!
//! ```text
//! <base_path>/
//!   electron-ollama/          # versions root (configurable)
//!     v0.11.0/
//!       darwin/arm64/
//!         ollama              # executable
//!       linux/amd64/
//!         bin/ollama          # executable
//!         lib/ollama/...
//!     v0.11.4/
//!       windows/amd64/
//!         ollama.exe
//! ```
//!
//! Entries are created by the installer and never deleted by this crate.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::platform::PlatformConfig;
use crate::version::ReleaseTag;

/// Path construction and presence checks for installed versions.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `<base_path>/<directory>`.
    #[must_use = "returns new store without side effects"]
    pub fn new(base_path: impl AsRef<Path>, directory: &str) -> Self {
        Self {
            root: base_path.as_ref().join(directory),
        }
    }

    /// Returns the directory holding one subdirectory per installed tag.
    #[must_use = "returns the path without side effects"]
    pub fn versions_root(&self) -> &Path {
        &self.root
    }

    /// Returns the install directory for a tag and platform.
    #[must_use = "returns the path without side effects"]
    pub fn bin_directory(&self, version: &ReleaseTag, platform: PlatformConfig) -> PathBuf {
        self.root
            .join(version.as_str())
            .join(platform.os.as_str())
            .join(platform.arch.as_str())
    }

    /// Returns the path of the executable inside the install directory.
    #[must_use = "returns the path without side effects"]
    pub fn executable_path(&self, version: &ReleaseTag, platform: PlatformConfig) -> PathBuf {
        self.bin_directory(version, platform)
            .join(platform.executable_path())
    }

    /// Checks whether the executable for a tag and platform is present.
    #[must_use = "returns installation status without side effects"]
    pub fn is_installed(&self, version: &ReleaseTag, platform: PlatformConfig) -> bool {
        self.executable_path(version, platform).is_file()
    }

    /// Lists tags installed for `platform`, oldest first.
    ///
    /// Directory names that are not release tags are skipped. Returns an empty
    /// list when the versions root does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the versions root exists but cannot be read.
    pub fn installed_versions(&self, platform: PlatformConfig) -> Result<Vec<ReleaseTag>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::io(
                    format!("failed to read versions directory {}", self.root.display()),
                    e,
                ));
            }
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("failed to read directory entry", e))?;
            if let Some(name) = entry.file_name().to_str()
                && let Ok(tag) = name.parse::<ReleaseTag>()
                && self.is_installed(&tag, platform)
            {
                versions.push(tag);
            }
        }

        versions.sort();
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os};
    use assert_fs::TempDir;
    use std::collections::HashSet;

    const LINUX: PlatformConfig = PlatformConfig::new(Os::Linux, Arch::Amd64);
    const DARWIN: PlatformConfig = PlatformConfig::new(Os::Darwin, Arch::Arm64);

    fn tag(s: &str) -> ReleaseTag {
        s.parse().unwrap()
    }

    fn install_fake(store: &ArtifactStore, version: &str, platform: PlatformConfig) {
        let exe = store.executable_path(&tag(version), platform);
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();
    }

    #[test]
    fn bin_directory_joins_layout_parts() {
        let store = ArtifactStore::new("/tmp", "electron-ollama");
        assert_eq!(
            store.bin_directory(&tag("v0.11.0"), DARWIN),
            PathBuf::from("/tmp/electron-ollama/v0.11.0/darwin/arm64")
        );
    }

    #[test]
    fn executable_path_is_os_specific() {
        let store = ArtifactStore::new("/tmp", "electron-ollama");
        assert_eq!(
            store.executable_path(&tag("v0.11.0"), LINUX),
            PathBuf::from("/tmp/electron-ollama/v0.11.0/linux/amd64/bin/ollama")
        );
    }

    #[test]
    fn bin_directory_never_collides() {
        let store = ArtifactStore::new("/base", "electron-ollama");
        let platforms = [
            PlatformConfig::new(Os::Windows, Arch::Arm64),
            PlatformConfig::new(Os::Windows, Arch::Amd64),
            PlatformConfig::new(Os::Darwin, Arch::Arm64),
            PlatformConfig::new(Os::Darwin, Arch::Amd64),
            PlatformConfig::new(Os::Linux, Arch::Arm64),
            PlatformConfig::new(Os::Linux, Arch::Amd64),
        ];
        let versions = ["v0.10.0", "v0.11.0", "v0.11.4"];

        let mut seen = HashSet::new();
        for version in versions {
            for platform in platforms {
                let dir = store.bin_directory(&tag(version), platform);
                assert_eq!(dir, store.bin_directory(&tag(version), platform));
                assert!(seen.insert(dir), "collision for {version} {platform}");
            }
        }
    }

    #[test]
    fn missing_root_lists_nothing() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path().join("does-not-exist"), "electron-ollama");
        assert!(store.installed_versions(LINUX).unwrap().is_empty());
    }

    #[test]
    fn installed_then_deleted() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path(), "electron-ollama");
        let v = tag("v0.11.0");

        assert!(!store.is_installed(&v, LINUX));
        install_fake(&store, "v0.11.0", LINUX);
        assert!(store.is_installed(&v, LINUX));

        std::fs::remove_dir_all(store.bin_directory(&v, LINUX)).unwrap();
        assert!(!store.is_installed(&v, LINUX));
    }

    #[test]
    fn empty_install_dir_is_not_installed() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path(), "electron-ollama");
        let v = tag("v0.11.0");
        std::fs::create_dir_all(store.bin_directory(&v, LINUX)).unwrap();
        assert!(!store.is_installed(&v, LINUX));
    }

    #[test]
    fn installed_versions_filters_by_platform_and_sorts() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(temp.path(), "electron-ollama");
        install_fake(&store, "v0.11.0", LINUX);
        install_fake(&store, "v0.9.0", LINUX);
        install_fake(&store, "v0.10.0", LINUX);
        install_fake(&store, "v0.11.4", DARWIN);
        std::fs::create_dir_all(store.versions_root().join("not-a-tag")).unwrap();

        let linux: Vec<String> = store
            .installed_versions(LINUX)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(linux, ["v0.9.0", "v0.10.0", "v0.11.0"]);

        let darwin = store.installed_versions(DARWIN).unwrap();
        assert_eq!(darwin, [tag("v0.11.4")]);
    }
}
