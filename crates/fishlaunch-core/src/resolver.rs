use std::path::Path;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::ErrorKind;
use crate::install::clear_stale_workspace;
use crate::version_store::{DEFAULT_VERSION, VersionManifest, read_local_version};

pub const MISSING_FILE_ERROR: &str = "Remote manifest does not name an update file";

/// A published release selected for installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDescriptor {
    pub version: String,
    /// Archive name relative to the server, or an absolute URL.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
}

impl UpdateDescriptor {
    #[must_use]
    pub fn new(version: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            file: file.into(),
            release_date: None,
            release_notes: None,
        }
    }

    /// Descriptor for a published manifest; `None` when it names no archive.
    #[must_use]
    pub fn from_manifest(manifest: &VersionManifest) -> Option<Self> {
        let file = manifest
            .file
            .as_deref()
            .map(str::trim)
            .filter(|file| !file.is_empty())?;
        Some(Self {
            version: manifest.version.clone(),
            file: file.to_string(),
            release_date: manifest.release_date.clone(),
            release_notes: manifest.release_notes.clone(),
        })
    }
}

/// Outcome of comparing the installed version with the published one.
///
/// Always a usable answer: failures are reported through `error` with
/// `needs_update` left false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheck {
    pub needs_update: bool,
    pub current_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_info: Option<UpdateDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl UpdateCheck {
    fn up_to_date(current_version: String) -> Self {
        Self {
            needs_update: false,
            current_version,
            update_info: None,
            error: None,
            error_kind: None,
        }
    }

    fn available(current_version: String, descriptor: UpdateDescriptor) -> Self {
        Self {
            needs_update: true,
            current_version,
            update_info: Some(descriptor),
            error: None,
            error_kind: None,
        }
    }

    fn failed(current_version: String, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            needs_update: false,
            current_version,
            update_info: None,
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }
}

/// Decide whether `install_dir` needs the catalog's published release.
///
/// Versions are compared as plain strings, so any difference (including a
/// "downgrade") counts as an update. No network request is made when the
/// directory is unset or missing.
pub async fn resolve(install_dir: Option<&Path>, catalog: &dyn Catalog) -> UpdateCheck {
    let Some(install_dir) = install_dir.filter(|dir| !dir.as_os_str().is_empty()) else {
        return UpdateCheck::failed(
            DEFAULT_VERSION.to_string(),
            ErrorKind::Configuration,
            "Game directory not set",
        );
    };
    if !install_dir.is_dir() {
        warn!("Game directory {} does not exist", install_dir.display());
        return UpdateCheck::failed(
            DEFAULT_VERSION.to_string(),
            ErrorKind::Configuration,
            "Game directory not found",
        );
    }

    clear_stale_workspace(install_dir);
    let local = read_local_version(install_dir);

    let remote = match catalog.fetch_remote_version().await {
        Ok(remote) => remote,
        Err(catalog_error) => {
            warn!("Update check failed: {catalog_error}");
            return UpdateCheck::failed(local.version, ErrorKind::Network, catalog_error.to_string());
        }
    };

    if local.version == remote.version {
        debug!("Installed version {} is current", local.version);
        return UpdateCheck::up_to_date(local.version);
    }

    match UpdateDescriptor::from_manifest(&remote) {
        Some(descriptor) => {
            info!(
                "Update available: {} -> {}",
                local.version, descriptor.version
            );
            UpdateCheck::available(local.version, descriptor)
        }
        None => {
            warn!(
                "Remote version {} differs from {} but names no archive",
                remote.version, local.version
            );
            UpdateCheck::failed(local.version, ErrorKind::Network, MISSING_FILE_ERROR)
        }
    }
}
