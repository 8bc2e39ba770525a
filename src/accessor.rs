// src/accessor.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::errors::SettingError;

/// Location of one named value inside a namespace, e.g. a registry value under a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingPath {
    pub namespace: String,
    pub name: String,
}

impl SettingPath {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SettingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.namespace, self.name)
    }
}

/// Type tag of a stored value. Serialized with the registry type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum ValueKind {
    #[serde(rename = "REG_DWORD")]
    #[strum(serialize = "REG_DWORD")]
    Dword,
    #[serde(rename = "REG_QWORD")]
    #[strum(serialize = "REG_QWORD")]
    Qword,
    #[serde(rename = "REG_SZ")]
    #[strum(serialize = "REG_SZ")]
    String,
    #[serde(rename = "REG_EXPAND_SZ")]
    #[strum(serialize = "REG_EXPAND_SZ")]
    ExpandString,
    #[serde(rename = "REG_MULTI_SZ")]
    #[strum(serialize = "REG_MULTI_SZ")]
    MultiString,
    #[serde(rename = "REG_BINARY")]
    #[strum(serialize = "REG_BINARY")]
    Binary,
}

/// A typed setting value. Restoring a capture writes the same variant back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Dword(u32),
    Qword(u64),
    String(String),
    ExpandString(String),
    MultiString(Vec<String>),
    Binary(Vec<u8>),
}

impl SettingValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            SettingValue::Dword(_) => ValueKind::Dword,
            SettingValue::Qword(_) => ValueKind::Qword,
            SettingValue::String(_) => ValueKind::String,
            SettingValue::ExpandString(_) => ValueKind::ExpandString,
            SettingValue::MultiString(_) => ValueKind::MultiString,
            SettingValue::Binary(_) => ValueKind::Binary,
        }
    }

    /// Splits the value into its JSON payload and type tag.
    pub fn to_json(&self) -> (serde_json::Value, ValueKind) {
        let value = match self {
            SettingValue::Dword(v) => serde_json::Value::from(*v),
            SettingValue::Qword(v) => serde_json::Value::from(*v),
            SettingValue::String(s) | SettingValue::ExpandString(s) => {
                serde_json::Value::from(s.as_str())
            }
            SettingValue::MultiString(items) => serde_json::Value::from(items.clone()),
            SettingValue::Binary(bytes) => serde_json::Value::from(bytes.clone()),
        };
        (value, self.kind())
    }

    /// Rebuilds a value from a JSON payload and its type tag.
    pub fn from_json(value: serde_json::Value, kind: ValueKind) -> Result<Self, SettingError> {
        let mismatch = || SettingError::InvalidValue(format!("{} payload does not match type", kind));
        match kind {
            ValueKind::Dword => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(SettingValue::Dword)
                .ok_or_else(mismatch),
            ValueKind::Qword => value.as_u64().map(SettingValue::Qword).ok_or_else(mismatch),
            ValueKind::String => value
                .as_str()
                .map(|s| SettingValue::String(s.to_string()))
                .ok_or_else(mismatch),
            ValueKind::ExpandString => value
                .as_str()
                .map(|s| SettingValue::ExpandString(s.to_string()))
                .ok_or_else(mismatch),
            ValueKind::MultiString => serde_json::from_value::<Vec<String>>(value)
                .map(SettingValue::MultiString)
                .map_err(|_| mismatch()),
            ValueKind::Binary => serde_json::from_value::<Vec<u8>>(value)
                .map(SettingValue::Binary)
                .map_err(|_| mismatch()),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Dword(v) => write!(f, "Dword({})", v),
            SettingValue::Qword(v) => write!(f, "Qword({})", v),
            SettingValue::String(v) => write!(f, "String({})", v),
            SettingValue::ExpandString(v) => write!(f, "ExpandString({})", v),
            SettingValue::MultiString(v) => write!(f, "MultiString({:?})", v),
            SettingValue::Binary(v) => write!(f, "Binary({:?})", v),
        }
    }
}

/// Read/write/delete over named, typed values. Registry values are the production case.
///
/// `read` returns `Ok(None)` when the value does not exist; absence is a valid prior state,
/// not an error.
pub trait SettingAccessor {
    fn read(&self, path: &SettingPath) -> Result<Option<SettingValue>, SettingError>;

    /// Writes `value`, creating intermediate namespaces as needed.
    fn write(&self, path: &SettingPath, value: &SettingValue) -> Result<(), SettingError>;

    /// Deletes the value. Deleting an absent value succeeds.
    fn delete(&self, path: &SettingPath) -> Result<(), SettingError>;
}

/// Enumerates stable identifiers of the machine's network interfaces.
pub trait InterfaceEnumerator {
    fn interface_ids(&self) -> Result<Vec<String>, SettingError>;
}

/// Start mode of a system service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StartMode {
    Boot,
    System,
    Automatic,
    Manual,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub start_mode: StartMode,
    pub running: bool,
}

/// Service control: query, reconfigure, stop. A missing service is `SettingError::NotFound`.
pub trait ServiceControl {
    fn query(&self, name: &str) -> Result<ServiceStatus, SettingError>;

    fn set_start_mode(&self, name: &str, mode: StartMode) -> Result<(), SettingError>;

    /// Requests a stop. Returns once the request is accepted, not once the service has stopped.
    fn stop(&self, name: &str) -> Result<(), SettingError>;
}

/// Access to the machine's active power scheme.
pub trait PowerSchemeControl {
    fn active_scheme(&self) -> Result<Uuid, SettingError>;

    fn set_active_scheme(&self, scheme: &Uuid) -> Result<(), SettingError>;

    /// Friendly name for logging. Implementations without names return `None`.
    fn scheme_name(&self, _scheme: &Uuid) -> Option<String> {
        None
    }
}
