//! The operations a launcher front end calls.
//!
//! [`LauncherService`] owns the effective settings, the HTTP client, and the
//! catalog, and turns core results into plain serialisable values. Reads never
//! fail outright; writes report `{success: false, error}`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fishlaunch_core::{
    Catalog, DEFAULT_VERSION, ErrorKind, HttpCatalog, NewsItem, UpdateCheck, UpdateDescriptor,
    UpdateProgress, apply_update, build_client, launch, read_local_version, resolve,
};
use fishlaunch_platform::AppPaths;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::picker::{DirectoryPicker, DirectorySelection};
use crate::settings::{AppSettings, SettingsStore};

/// Version recorded for an archive installed by file name alone when neither
/// the payload nor a prior update check says which version it is.
pub const UNVERSIONED_PAYLOAD_VERSION: &str = "1.0.0";

const PICKER_TITLE: &str = "Select game directory";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Version now installed, after a successful update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Executable that was started, after a successful launch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
}

impl OperationResult {
    fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
            error_kind: None,
            version: None,
            executable: None,
        }
    }

    #[must_use]
    pub fn failed(error: &AppError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            ..Self::succeeded()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub app_name: String,
    pub app_version: String,
    pub server_url: String,
    pub enable_auto_updates: bool,
}

/// What to install: a bare archive name/URL, or a descriptor from a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    File(String),
    Descriptor(UpdateDescriptor),
}

impl From<&str> for UpdateTarget {
    fn from(file: &str) -> Self {
        Self::File(file.to_string())
    }
}

impl From<String> for UpdateTarget {
    fn from(file: String) -> Self {
        Self::File(file)
    }
}

impl From<UpdateDescriptor> for UpdateTarget {
    fn from(descriptor: UpdateDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

pub struct LauncherService {
    store: Arc<dyn SettingsStore>,
    settings: RwLock<AppSettings>,
    client: reqwest::Client,
    catalog: Arc<dyn Catalog>,
    active_update: Mutex<Option<UpdateDescriptor>>,
}

impl LauncherService {
    /// Wire the service against the real update server.
    ///
    /// Settings are loaded once from `store` with environment overrides
    /// applied on top; the overrides are never written back.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(store: Arc<dyn SettingsStore>, paths: &AppPaths) -> Result<Self, AppError> {
        let mut settings = store.load();
        settings.apply_env_overrides();

        let client = build_client(&settings.http_options()).map_err(|error| {
            AppError::operation_failed("HTTP client setup", ErrorKind::Network, error)
        })?;
        let mut catalog = HttpCatalog::new(client.clone(), &settings.server_url)
            .with_news_cache(paths.news_cache_file());
        if let Some(dir) = &settings.dev_fallback_dir {
            catalog = catalog.with_fallback_dir(dir.clone());
        }

        Ok(Self::with_parts(store, settings, client, Arc::new(catalog)))
    }

    /// Assemble a service from explicit parts.
    pub fn with_parts(
        store: Arc<dyn SettingsStore>,
        settings: AppSettings,
        client: reqwest::Client,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            store,
            settings: RwLock::new(settings),
            client,
            catalog,
            active_update: Mutex::new(None),
        }
    }

    fn read_settings(&self) -> RwLockReadGuard<'_, AppSettings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_settings(&self) -> RwLockWriteGuard<'_, AppSettings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Effective settings, overrides included.
    pub fn settings(&self) -> AppSettings {
        self.read_settings().clone()
    }

    pub fn get_game_directory(&self) -> Option<PathBuf> {
        self.read_settings().game_directory().map(Path::to_path_buf)
    }

    /// Remember `path` as the game directory. Only existing directories are
    /// accepted.
    pub fn set_game_directory(&self, path: &Path) -> bool {
        match self.save_game_directory(path) {
            Ok(()) => true,
            Err(app_error) => {
                error!(
                    "Failed to set game directory ({:?}): {app_error}",
                    app_error.kind()
                );
                false
            }
        }
    }

    /// [`Self::set_game_directory`] with the reason for a refusal. The
    /// in-memory setting only changes once the store has accepted it.
    ///
    /// # Errors
    /// Returns a configuration error for a path that is not an existing
    /// directory or that cannot be saved.
    pub fn save_game_directory(&self, path: &Path) -> Result<(), AppError> {
        if path.as_os_str().is_empty() || !path.is_dir() {
            warn!("Refusing game directory {}: not a directory", path.display());
            return Err(AppError::message(
                ErrorKind::Configuration,
                format!("{} is not a directory", path.display()),
            ));
        }

        let mut stored = self.store.load();
        stored.game_directory = Some(path.to_path_buf());
        self.store.save(&stored)?;

        self.write_settings().game_directory = Some(path.to_path_buf());
        info!("Game directory set to {}", path.display());
        Ok(())
    }

    pub fn get_game_version(&self, install_dir: &Path) -> String {
        if install_dir.as_os_str().is_empty() {
            return DEFAULT_VERSION.to_string();
        }
        read_local_version(install_dir).version
    }

    /// Compare the configured install with the published release and
    /// remember the offered update for a later [`Self::download_update`].
    pub async fn check_for_updates(&self) -> UpdateCheck {
        let install_dir = self.get_game_directory();
        let check = resolve(install_dir.as_deref(), self.catalog.as_ref()).await;

        *self
            .active_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = check.update_info.clone();
        check
    }

    fn descriptor_for(&self, target: UpdateTarget) -> UpdateDescriptor {
        match target {
            UpdateTarget::Descriptor(descriptor) => descriptor,
            UpdateTarget::File(file) => self
                .active_update
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .filter(|active| active.file == file)
                .cloned()
                .unwrap_or_else(|| {
                    debug!("No checked release for {file}, installing it unversioned");
                    UpdateDescriptor::new(UNVERSIONED_PAYLOAD_VERSION, file)
                }),
        }
    }

    /// Download and install an update into `install_dir`.
    ///
    /// A bare file name picks up the version and release notes from the last
    /// update check when it offered that same file.
    pub async fn download_update(
        &self,
        target: impl Into<UpdateTarget>,
        install_dir: &Path,
        progress: mpsc::Sender<UpdateProgress>,
        cancel: CancellationToken,
    ) -> OperationResult {
        let descriptor = self.descriptor_for(target.into());

        match apply_update(
            &self.client,
            &descriptor,
            install_dir,
            self.catalog.server_url(),
            progress,
            cancel,
        )
        .await
        {
            Ok(manifest) => {
                let mut active = self
                    .active_update
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if active.as_ref() == Some(&descriptor) {
                    *active = None;
                }
                drop(active);
                OperationResult {
                    version: Some(manifest.version),
                    ..OperationResult::succeeded()
                }
            }
            Err(update_error) => {
                let app_error = AppError::from(update_error);
                warn!("Update not applied: {app_error}");
                OperationResult::failed(&app_error)
            }
        }
    }

    pub fn launch_game(&self, install_dir: &Path) -> OperationResult {
        match launch(install_dir) {
            Ok(executable) => OperationResult {
                executable: Some(executable),
                ..OperationResult::succeeded()
            },
            Err(launch_error) => {
                let app_error = AppError::from(launch_error);
                warn!("Game not launched: {app_error}");
                OperationResult::failed(&app_error)
            }
        }
    }

    /// News from the server or a fallback; empty when every source failed.
    pub async fn get_news_items(&self) -> Vec<NewsItem> {
        self.catalog.fetch_news().await.unwrap_or_else(|news_error| {
            warn!("No news available: {news_error}");
            Vec::new()
        })
    }

    pub fn get_app_settings(&self) -> AppInfo {
        let settings = self.read_settings();
        AppInfo {
            app_name: settings.app_name.clone(),
            app_version: settings.app_version.clone(),
            server_url: self.catalog.server_url().to_string(),
            enable_auto_updates: settings.enable_auto_updates,
        }
    }

    /// Ask `picker` for a directory. Nothing is persisted here.
    pub fn select_directory(&self, picker: &mut dyn DirectoryPicker) -> DirectorySelection {
        match picker.pick_directory(PICKER_TITLE) {
            Ok(Some(path)) => DirectorySelection::Selected(path),
            Ok(None) => DirectorySelection::Canceled,
            Err(picker_error) => {
                warn!("Directory picker failed: {picker_error}");
                DirectorySelection::Canceled
            }
        }
    }
}
