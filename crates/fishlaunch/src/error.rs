use fishlaunch_core::{ErrorKind, LaunchError, UpdateError};
use thiserror::Error;

use crate::settings::SettingsError;

/// Failure surfaced at the launcher boundary; its display text is what the
/// user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("{message}")]
    Message { kind: ErrorKind, message: String },
    #[error("{operation} failed: {details}")]
    OperationFailed {
        operation: &'static str,
        kind: ErrorKind,
        details: String,
    },
    #[error("{operation} cancelled")]
    OperationCancelled { operation: &'static str },
    #[error("Settings {action} failed: {details}")]
    SettingsFailed {
        action: &'static str,
        details: String,
    },
}

impl AppError {
    pub fn message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Message {
            kind,
            message: message.into(),
        }
    }

    pub fn operation_failed(
        operation: &'static str,
        kind: ErrorKind,
        details: impl ToString,
    ) -> Self {
        Self::OperationFailed {
            operation,
            kind,
            details: details.to_string(),
        }
    }

    pub fn operation_cancelled(operation: &'static str) -> Self {
        Self::OperationCancelled { operation }
    }

    pub fn settings_failed(action: &'static str, details: impl ToString) -> Self {
        Self::SettingsFailed {
            action,
            details: details.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Message { kind, .. } | Self::OperationFailed { kind, .. } => *kind,
            Self::OperationCancelled { .. } => ErrorKind::Cancelled,
            Self::SettingsFailed { .. } => ErrorKind::Configuration,
        }
    }
}

impl From<UpdateError> for AppError {
    fn from(error: UpdateError) -> Self {
        match error.kind() {
            ErrorKind::Cancelled => Self::operation_cancelled("Update"),
            ErrorKind::Configuration | ErrorKind::Busy => {
                Self::message(error.kind(), error.to_string())
            }
            kind => Self::operation_failed("Update", kind, error),
        }
    }
}

impl From<LaunchError> for AppError {
    fn from(error: LaunchError) -> Self {
        match error {
            LaunchError::NotFound(_) | LaunchError::DirectoryNotSet => {
                Self::message(error.kind(), error.to_string())
            }
            error => Self::operation_failed("Launch", error.kind(), error),
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(error: SettingsError) -> Self {
        Self::settings_failed("save", error)
    }
}
