use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::download::{DownloadError, download};
use crate::error::ErrorKind;
use crate::http::{archive_file_name, resolve_download_url};
use crate::lease::{InstallLease, LeaseError};
use crate::resolver::UpdateDescriptor;
use crate::version_store::{VERSION_FILE, VersionManifest, VersionStoreError, write_version};

/// Scratch directory inside the install directory holding the downloaded archive.
pub const TEMP_DIR_NAME: &str = "temp";

/// Where a payload's own `version.json` waits in the workspace until finalizing.
const STAGED_MANIFEST_NAME: &str = "payload-version.json";

/// Where an update cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallPhase {
    Idle,
    Downloading,
    Extracting,
    Finalizing,
    Done,
    Failed,
}

impl InstallPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Forward edges of the update cycle. `Failed` is reachable from every
    /// in-flight phase but not from `Idle`.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Downloading)
                | (Self::Downloading, Self::Extracting)
                | (Self::Extracting, Self::Finalizing)
                | (Self::Finalizing, Self::Done)
                | (
                    Self::Downloading | Self::Extracting | Self::Finalizing,
                    Self::Failed
                )
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UpdateProgress {
    Phase { phase: InstallPhase },
    Downloading { percent: u8 },
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Game directory not set")]
    DirectoryNotSet,
    #[error("Game directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("an update is already in progress for {}", .0.display())]
    Busy(PathBuf),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("{context}: {source}")]
    Archive {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("{context} ({}): {source}", .path.display())]
    Filesystem {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Version(#[from] VersionStoreError),
    #[error("extraction task failed: {0}")]
    Extraction(String),
}

impl UpdateError {
    fn archive(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Archive { context, source }
    }

    fn filesystem(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Filesystem {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DirectoryNotSet | Self::DirectoryNotFound(_) => ErrorKind::Configuration,
            Self::Busy(_) => ErrorKind::Busy,
            Self::Download(DownloadError::Cancelled) => ErrorKind::Cancelled,
            Self::Download(error) if error.is_network() => ErrorKind::Network,
            Self::Archive { .. } => ErrorKind::Archive,
            Self::Download(_) | Self::Filesystem { .. } | Self::Version(_) | Self::Extraction(_) => {
                ErrorKind::Filesystem
            }
        }
    }
}

impl From<LeaseError> for UpdateError {
    fn from(error: LeaseError) -> Self {
        match error {
            LeaseError::Busy(dir) => Self::Busy(dir),
            LeaseError::Io { context, source } => Self::Filesystem {
                context,
                path: PathBuf::new(),
                source,
            },
        }
    }
}

/// Location of the scratch workspace for `install_dir`.
#[must_use]
pub fn temp_workspace_path(install_dir: &Path) -> PathBuf {
    install_dir.join(TEMP_DIR_NAME)
}

/// Download `descriptor`'s archive and install it into `install_dir`.
///
/// The install directory is leased for the whole cycle. `version.json` is
/// only rewritten once the archive has been fully extracted (a manifest
/// shipped in the payload is held in the workspace until then), and the temp
/// workspace is removed whether or not the cycle succeeds. Extraction
/// overwrites files in place, so a crash part-way through can leave a mixed
/// install behind; the old manifest then still names the previous version
/// and the next check offers the update again.
///
/// # Errors
/// Fails with a configuration error for a missing directory, `Busy` when
/// another update owns the directory, and otherwise with the download,
/// archive, or filesystem error that stopped the cycle.
pub async fn apply_update(
    client: &reqwest::Client,
    descriptor: &UpdateDescriptor,
    install_dir: &Path,
    server_url: &str,
    progress: mpsc::Sender<UpdateProgress>,
    cancel: CancellationToken,
) -> Result<VersionManifest, UpdateError> {
    check_install_dir(install_dir)?;
    let _lease = InstallLease::acquire(install_dir)?;
    info!(
        "Updating {} to version {}",
        install_dir.display(),
        descriptor.version
    );

    let mut tracker = PhaseTracker::new(&progress);
    tracker.advance(InstallPhase::Downloading).await;

    let result = run_cycle(
        client,
        descriptor,
        install_dir,
        server_url,
        &mut tracker,
        &cancel,
    )
    .await;

    match &result {
        Ok(manifest) => {
            tracker.advance(InstallPhase::Done).await;
            info!("Installed version {}", manifest.version);
        }
        Err(update_error) => {
            tracker.advance(InstallPhase::Failed).await;
            error!(
                "Update of {} to {} failed: {update_error}",
                install_dir.display(),
                descriptor.version
            );
        }
    }
    result
}

async fn run_cycle(
    client: &reqwest::Client,
    descriptor: &UpdateDescriptor,
    install_dir: &Path,
    server_url: &str,
    tracker: &mut PhaseTracker<'_>,
    cancel: &CancellationToken,
) -> Result<VersionManifest, UpdateError> {
    let workspace = TempWorkspace::create(install_dir)?;

    let outcome: Result<VersionManifest, UpdateError> = async {
        let url = resolve_download_url(&descriptor.file, server_url);
        let archive_path = workspace.path().join(archive_file_name(&url));
        download(client, &url, &archive_path, tracker.progress, cancel).await?;

        tracker.advance(InstallPhase::Extracting).await;
        let dest = install_dir.to_path_buf();
        let staging = workspace.path().to_path_buf();
        let summary = tokio::task::spawn_blocking(move || {
            extract_archive(&archive_path, &dest, &staging)
        })
        .await
        .map_err(|join_error| UpdateError::Extraction(join_error.to_string()))??;

        tracker.advance(InstallPhase::Finalizing).await;
        let manifest = final_manifest(
            summary.staged_manifest.as_deref(),
            descriptor,
            Utc::now(),
        );
        write_version(install_dir, &manifest)?;
        Ok(manifest)
    }
    .await;

    workspace.remove();
    outcome
}

fn check_install_dir(install_dir: &Path) -> Result<(), UpdateError> {
    if install_dir.as_os_str().is_empty() {
        return Err(UpdateError::DirectoryNotSet);
    }
    if !install_dir.is_dir() {
        return Err(UpdateError::DirectoryNotFound(install_dir.to_path_buf()));
    }
    Ok(())
}

struct PhaseTracker<'a> {
    phase: InstallPhase,
    progress: &'a mpsc::Sender<UpdateProgress>,
}

impl<'a> PhaseTracker<'a> {
    fn new(progress: &'a mpsc::Sender<UpdateProgress>) -> Self {
        Self {
            phase: InstallPhase::Idle,
            progress,
        }
    }

    async fn advance(&mut self, next: InstallPhase) {
        if !self.phase.can_advance_to(next) {
            warn!("Ignoring update phase change {:?} -> {next:?}", self.phase);
            return;
        }
        debug!("Update phase {:?} -> {next:?}", self.phase);
        self.phase = next;
        let _ = self.progress.send(UpdateProgress::Phase { phase: next }).await;
    }
}

struct TempWorkspace {
    path: PathBuf,
}

impl TempWorkspace {
    /// Start from an empty workspace; leftovers are from an interrupted cycle.
    fn create(install_dir: &Path) -> Result<Self, UpdateError> {
        let path = temp_workspace_path(install_dir);
        if path.exists() {
            debug!("Clearing leftover workspace {}", path.display());
            std::fs::remove_dir_all(&path).map_err(|error| {
                UpdateError::filesystem("failed to clear stale temp workspace", &path, error)
            })?;
        }
        std::fs::create_dir_all(&path).map_err(|error| {
            UpdateError::filesystem("failed to create temp workspace", &path, error)
        })?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn remove(self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed temp workspace {}", self.path.display()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(
                "Failed to remove temp workspace {}: {error}",
                self.path.display()
            ),
        }
    }
}

/// Delete a workspace left behind by a crashed update.
///
/// Only done when no update currently holds the install directory; returns
/// whether anything was removed.
pub fn clear_stale_workspace(install_dir: &Path) -> bool {
    let path = temp_workspace_path(install_dir);
    if !path.exists() {
        return false;
    }

    let _lease = match InstallLease::acquire(install_dir) {
        Ok(lease) => lease,
        Err(LeaseError::Busy(_)) => {
            debug!("Update in progress, keeping {}", path.display());
            return false;
        }
        Err(lease_error) => {
            warn!("Cannot check for stale temp workspace: {lease_error}");
            return false;
        }
    };

    match std::fs::remove_dir_all(&path) {
        Ok(()) => {
            info!("Removed stale temp workspace {}", path.display());
            true
        }
        Err(error) => {
            warn!(
                "Failed to remove stale temp workspace {}: {error}",
                path.display()
            );
            false
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ExtractSummary {
    files: usize,
    skipped: usize,
    staged_manifest: Option<PathBuf>,
}

/// Unpack `zip_path` over `dest`. A root `version.json` entry goes to
/// `staging` instead so the installed manifest keeps naming the old version
/// until the whole payload is in place.
fn extract_archive(
    zip_path: &Path,
    dest: &Path,
    staging: &Path,
) -> Result<ExtractSummary, UpdateError> {
    let file = std::fs::File::open(zip_path)
        .map_err(|error| UpdateError::filesystem("failed to open update archive", zip_path, error))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| UpdateError::archive("failed to read update archive", error))?;

    let mut summary = ExtractSummary::default();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| UpdateError::archive("failed to read archive entry", error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping archive entry with unsafe path: {}", entry.name());
            summary.skipped += 1;
            continue;
        };
        if name.components().next() == Some(Component::Normal(OsStr::new(TEMP_DIR_NAME))) {
            warn!("Skipping archive entry inside the temp workspace: {}", name.display());
            summary.skipped += 1;
            continue;
        }
        let is_manifest = name == Path::new(VERSION_FILE);
        let out_path = if is_manifest {
            staging.join(STAGED_MANIFEST_NAME)
        } else {
            dest.join(&name)
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|error| {
                UpdateError::filesystem("failed to create extraction directory", &out_path, error)
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                UpdateError::filesystem("failed to create extraction parent directory", parent, error)
            })?;
        }
        let mut outfile = std::fs::File::create(&out_path).map_err(|error| {
            UpdateError::filesystem("failed to create extracted file", &out_path, error)
        })?;
        std::io::copy(&mut entry, &mut outfile).map_err(|error| {
            if error.kind() == std::io::ErrorKind::InvalidData {
                UpdateError::archive("corrupt archive entry", zip::result::ZipError::Io(error))
            } else {
                UpdateError::filesystem("failed to extract archive entry", &out_path, error)
            }
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
            }
        }

        summary.files += 1;
        if is_manifest {
            summary.staged_manifest = Some(out_path);
        }
    }

    debug!(
        "Extracted {} files to {} ({} skipped)",
        summary.files,
        dest.display(),
        summary.skipped
    );
    Ok(summary)
}

/// The manifest recorded for a finished install: the payload's own
/// `version.json` when it shipped one, else the descriptor's version, with
/// release metadata filled in from the descriptor where the payload is silent.
fn final_manifest(
    staged: Option<&Path>,
    descriptor: &UpdateDescriptor,
    now: DateTime<Utc>,
) -> VersionManifest {
    let shipped = staged
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| VersionManifest::parse(&content));
    if staged.is_some() && shipped.is_none() {
        warn!("Update payload carries an unusable {VERSION_FILE}");
    }

    let mut manifest = shipped.unwrap_or_else(|| VersionManifest::new(descriptor.version.clone()));
    manifest.file = None;
    if manifest.release_date.is_none() {
        manifest.release_date.clone_from(&descriptor.release_date);
    }
    if manifest.release_notes.is_none() {
        manifest.release_notes.clone_from(&descriptor.release_notes);
    }
    manifest.update_date = Some(now.to_rfc3339_opts(SecondsFormat::Millis, true));
    manifest
}
