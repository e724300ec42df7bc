use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use fishlaunch_core::HttpOptions;
use fishlaunch_platform::AppPaths;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";
pub const DEFAULT_APP_NAME: &str = "Fish Launcher";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub game_directory: Option<PathBuf>,

    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_app_version")]
    pub app_version: String,

    #[serde(default = "default_true")]
    pub enable_auto_updates: bool,

    /// Directory searched for `version.json`/`news.json` when the server is
    /// unreachable. Unset means the working directory.
    #[serde(default)]
    pub dev_fallback_dir: Option<PathBuf>,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            game_directory: None,
            server_url: default_server_url(),
            app_name: default_app_name(),
            app_version: default_app_version(),
            enable_auto_updates: true,
            dev_fallback_dir: None,
            http_timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppSettings {
    /// The configured game directory, ignoring an empty value.
    pub fn game_directory(&self) -> Option<&Path> {
        self.game_directory
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            request_timeout: Duration::from_secs(self.http_timeout_secs.max(1)),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
            user_agent: format!("fishlaunch/{}", self.app_version),
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Layer deployment overrides on top of the stored values. Empty values
    /// are ignored; `DEFAULT_GAME_DIRECTORY` only fills an unset directory.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if self.game_directory().is_none()
            && let Some(dir) = get("DEFAULT_GAME_DIRECTORY")
        {
            self.game_directory = Some(PathBuf::from(dir));
        }
        if let Some(url) = get("SERVER_URL") {
            self.server_url = url;
        }
        if let Some(name) = get("APP_NAME") {
            self.app_name = name;
        }
        if let Some(version) = get("APP_VERSION") {
            self.app_version = version;
        }
        if let Some(flag) = get("ENABLE_AUTO_UPDATES") {
            self.enable_auto_updates = flag.trim().eq_ignore_ascii_case("true");
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where [`AppSettings`] are persisted.
pub trait SettingsStore: Send + Sync {
    /// Stored settings, or defaults when nothing usable is stored.
    fn load(&self) -> AppSettings;

    /// # Errors
    /// Returns an error if the settings cannot be written.
    fn save(&self, settings: &AppSettings) -> Result<(), SettingsError>;
}

/// Settings kept as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_paths(paths: &AppPaths) -> Self {
        Self::new(paths.settings_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> AppSettings {
        if !self.path.exists() {
            return AppSettings::default();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                warn!(
                    "Ignoring unreadable settings file {}: {error}",
                    self.path.display()
                );
                AppSettings::default()
            }),
            Err(error) => {
                warn!(
                    "Failed to read settings file {}: {error}",
                    self.path.display()
                );
                AppSettings::default()
            }
        }
    }

    fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                context: "failed to create settings directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, content).map_err(|source| SettingsError::Io {
            context: "failed to write settings",
            path: self.path.clone(),
            source,
        })
    }
}

/// Non-persistent store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<AppSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> AppSettings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Ok(())
    }
}
