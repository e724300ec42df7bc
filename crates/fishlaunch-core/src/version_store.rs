use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fs_atomic::{ParentDir, write_json_atomic};

pub const VERSION_FILE: &str = "version.json";
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Version metadata for an installed payload or a published release.
///
/// Versions are opaque strings: two manifests describe the same release only
/// when their `version` fields are byte-for-byte equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_date: Option<String>,
}

impl Default for VersionManifest {
    fn default() -> Self {
        Self::new(DEFAULT_VERSION)
    }
}

impl VersionManifest {
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            file: None,
            release_date: None,
            release_notes: None,
            update_date: None,
        }
    }

    /// Parse a manifest document, rejecting ones without a usable version.
    pub(crate) fn parse(content: &str) -> Option<Self> {
        let manifest: Self = serde_json::from_str(content).ok()?;
        if manifest.version.trim().is_empty() {
            return None;
        }
        Some(manifest)
    }
}

#[derive(Debug, Error)]
pub enum VersionStoreError {
    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[must_use]
pub fn version_file(install_dir: &Path) -> PathBuf {
    install_dir.join(VERSION_FILE)
}

/// Read the manifest of an install directory.
///
/// A missing, unreadable, or malformed `version.json` means nothing is
/// installed, so this falls back to version `0.0.0` instead of failing.
#[must_use]
pub fn read_local_version(install_dir: &Path) -> VersionManifest {
    let path = version_file(install_dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!("No version manifest at {}", path.display());
            return VersionManifest::default();
        }
        Err(error) => {
            warn!("Failed to read version manifest {}: {error}", path.display());
            return VersionManifest::default();
        }
    };

    VersionManifest::parse(&content).unwrap_or_else(|| {
        warn!(
            "Ignoring malformed version manifest at {}",
            path.display()
        );
        VersionManifest::default()
    })
}

/// Atomically replace the manifest of an install directory.
///
/// The install directory itself is never created here.
///
/// # Errors
/// Returns an error if the manifest cannot be written.
pub fn write_version(
    install_dir: &Path,
    manifest: &VersionManifest,
) -> Result<(), VersionStoreError> {
    let path = version_file(install_dir);
    write_json_atomic(&path, manifest, ParentDir::MustExist).map_err(|source| VersionStoreError::Io {
        context: "failed to write version manifest",
        path: path.clone(),
        source,
    })?;
    debug!(
        "Wrote version manifest {} ({})",
        path.display(),
        manifest.version
    );
    Ok(())
}

/// Whether `dir` looks like an existing game install (it carries a manifest).
#[must_use]
pub fn is_valid_install_directory(dir: &Path) -> bool {
    dir.is_dir() && version_file(dir).is_file()
}
