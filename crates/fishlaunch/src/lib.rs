//! Fish Launcher application layer.
//!
//! Settings, logging, and the [`service::LauncherService`] boundary that a
//! front end (the bundled CLI, or a GUI) drives.

pub mod error;
pub mod logging;
pub mod picker;
pub mod service;
pub mod settings;

pub use error::AppError;
pub use picker::{DirectoryPicker, DirectorySelection, PromptPicker};
pub use service::{AppInfo, LauncherService, OperationResult, UpdateTarget};
pub use settings::{AppSettings, FileSettingsStore, MemorySettingsStore, SettingsError, SettingsStore};
