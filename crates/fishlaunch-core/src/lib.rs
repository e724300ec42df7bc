//! Update engine for fishlaunch.
//!
//! This crate owns everything between the user interface and the game files:
//! - Reading and atomically writing the installed `version.json`.
//! - Fetching the published version and news from the update server, with
//!   local and cached fallbacks.
//! - Deciding whether an install is out of date.
//! - Downloading and extracting an update under an exclusive lease on the
//!   install directory.
//! - Locating and starting the game executable.

pub mod catalog;
mod download;
mod error;
mod fs_atomic;
pub mod http;
mod install;
mod lease;
mod launch;
pub mod news;
mod resolver;
#[cfg(test)]
mod test_support;
pub mod version_store;

/// Version and news source abstraction with its HTTP implementation.
pub use catalog::{Catalog, CatalogError, HttpCatalog};
/// Streaming archive download with progress and cancellation.
pub use download::{DownloadError, download, percent};
/// Failure classes shared by every operation.
pub use error::ErrorKind;
/// HTTP client construction and update-server URL handling.
pub use http::{HttpOptions, build_client};
/// Update installation, its phase machine, and temp workspace handling.
pub use install::{
    InstallPhase, TEMP_DIR_NAME, UpdateError, UpdateProgress, apply_update,
    clear_stale_workspace, temp_workspace_path,
};
/// Cross-process exclusive claim on an install directory.
pub use lease::{InstallLease, LeaseError};
/// Game executable discovery and detached launch.
pub use launch::{LaunchError, find_executable, launch, launch_on};
/// News items and their disk cache.
pub use news::{NewsCache, NewsId, NewsItem};
/// Update decision between installed and published versions.
pub use resolver::{MISSING_FILE_ERROR, UpdateCheck, UpdateDescriptor, resolve};
/// Installed version manifest access.
pub use version_store::{
    DEFAULT_VERSION, VersionManifest, VersionStoreError, is_valid_install_directory,
    read_local_version, write_version,
};
