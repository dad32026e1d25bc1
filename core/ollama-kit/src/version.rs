//! Release versions.
//!
//! A request names either the floating `latest` release or a concrete tag. Only
//! concrete tags ever reach the on-disk layout; `latest` is resolved against the
//! release index first.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A requested release: `latest` or a concrete tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Version {
    /// The newest published release, resolved by the index.
    #[default]
    Latest,
    /// A specific immutable release.
    Tag(ReleaseTag),
}

impl Version {
    /// Returns the concrete tag, if this is not `latest`.
    #[must_use]
    pub fn as_tag(&self) -> Option<&ReleaseTag> {
        match self {
            Self::Latest => None,
            Self::Tag(tag) => Some(tag),
        }
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "latest" {
            Ok(Self::Latest)
        } else {
            s.parse().map(Self::Tag)
        }
    }
}

impl From<ReleaseTag> for Version {
    fn from(tag: ReleaseTag) -> Self {
        Self::Tag(tag)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Tag(tag) => tag.fmt(f),
        }
    }
}

/// A concrete release tag of the form `v<major>.<minor>.<patch>[-pre]`.
///
/// Tags compare by semantic version, so `v0.9.0 < v0.10.0`.
#[derive(Debug, Clone)]
pub struct ReleaseTag {
    raw: String,
    semver: semver::Version,
}

impl ReleaseTag {
    /// Returns the tag exactly as published (e.g. `"v0.11.0"`).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed semantic version (without the `v` prefix).
    #[must_use]
    pub fn semver(&self) -> &semver::Version {
        &self.semver
    }
}

impl FromStr for ReleaseTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion {
            input: s.to_string(),
        };
        let digits = s.strip_prefix('v').ok_or_else(invalid)?;
        let semver = semver::Version::parse(digits).map_err(|_| invalid())?;
        Ok(Self {
            raw: s.to_string(),
            semver,
        })
    }
}

impl PartialEq for ReleaseTag {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for ReleaseTag {}

impl std::hash::Hash for ReleaseTag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for ReleaseTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semver
            .cmp(&other.semver)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for ReleaseTag {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl Serialize for ReleaseTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ReleaseTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_parses_to_sentinel() {
        assert_eq!("latest".parse::<Version>().unwrap(), Version::Latest);
    }

    #[test]
    fn tag_parses_with_v_prefix() {
        let version: Version = "v0.11.0".parse().unwrap();
        let tag = version.as_tag().expect("concrete tag");
        assert_eq!(tag.as_str(), "v0.11.0");
        assert_eq!(tag.semver(), &semver::Version::new(0, 11, 0));
    }

    #[test]
    fn prerelease_tag_is_accepted() {
        let tag: ReleaseTag = "v0.12.0-rc1".parse().unwrap();
        assert!(!tag.semver().pre.is_empty());
    }

    #[test]
    fn tag_without_prefix_is_rejected() {
        let err = "0.11.0".parse::<ReleaseTag>().unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { input } if input == "0.11.0"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!("vfoo".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn tags_order_semantically_not_lexically() {
        let mut tags: Vec<ReleaseTag> = ["v0.10.0", "v0.9.0", "v0.11.0"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        tags.sort();
        let names: Vec<&str> = tags.iter().map(ReleaseTag::as_str).collect();
        assert_eq!(names, ["v0.9.0", "v0.10.0", "v0.11.0"]);
    }

    #[test]
    fn display_round_trips_raw_text() {
        assert_eq!(Version::Latest.to_string(), "latest");
        let version: Version = "v0.11.4".parse().unwrap();
        assert_eq!(version.to_string(), "v0.11.4");
    }
}
