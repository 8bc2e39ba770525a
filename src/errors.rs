// src/errors.rs

use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures reported by a setting accessor (registry, service manager, power API).
#[derive(Error, Debug)]
pub enum SettingError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Invalid setting path: {0}")]
    InvalidPath(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),

    #[error("OS error {code}: {message}")]
    Os { code: i32, message: String },
}

impl SettingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SettingError::NotFound(_))
    }

    /// Classifies an `io::Error` coming out of `winreg` or `std::fs`.
    pub fn from_io(context: impl Into<String>, err: io::Error) -> Self {
        let context = context.into();
        match err.kind() {
            io::ErrorKind::NotFound => SettingError::NotFound(context),
            io::ErrorKind::PermissionDenied => SettingError::AccessDenied(context),
            _ => SettingError::Os {
                code: err.raw_os_error().unwrap_or(-1),
                message: format!("{}: {}", context, err),
            },
        }
    }

    /// Classifies a raw Win32 error code.
    pub fn from_win32(context: impl Into<String>, code: u32) -> Self {
        let context = context.into();
        match code {
            ERROR_FILE_NOT_FOUND | ERROR_PATH_NOT_FOUND | ERROR_SERVICE_DOES_NOT_EXIST => {
                SettingError::NotFound(context)
            }
            ERROR_ACCESS_DENIED => SettingError::AccessDenied(context),
            _ => SettingError::Os {
                code: code as i32,
                message: format!("{} (Win32 error {})", context, code),
            },
        }
    }
}

const ERROR_FILE_NOT_FOUND: u32 = 2;
const ERROR_PATH_NOT_FOUND: u32 = 3;
const ERROR_ACCESS_DENIED: u32 = 5;
const ERROR_SERVICE_DOES_NOT_EXIST: u32 = 1060;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("State file I/O failed at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Profile '{name}' is malformed: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_setting_taxonomy() {
        let not_found = SettingError::from_io("x", io::Error::from(io::ErrorKind::NotFound));
        assert!(not_found.is_not_found());

        let denied = SettingError::from_io("x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, SettingError::AccessDenied(_)));

        let other = SettingError::from_io("x", io::Error::from_raw_os_error(32));
        assert!(matches!(other, SettingError::Os { code: 32, .. }));
    }

    #[test]
    fn win32_codes_map_to_setting_taxonomy() {
        assert!(SettingError::from_win32("svc", 1060).is_not_found());
        assert!(SettingError::from_win32("key", 2).is_not_found());
        assert!(matches!(
            SettingError::from_win32("key", 5),
            SettingError::AccessDenied(_)
        ));
        assert!(matches!(
            SettingError::from_win32("svc", 1052),
            SettingError::Os { code: 1052, .. }
        ));
    }
}
