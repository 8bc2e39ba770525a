// src/state.rs

//! Durable capture storage.
//!
//! The store is a flat JSON object mapping state keys to captured prior values. It is read
//! once at startup and rewritten wholesale after every insertion, so each capture is on disk
//! before the change it protects is attempted.

use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    accessor::{SettingValue, StartMode, ValueKind},
    errors::StateStoreError,
};

const TOMBSTONE: &str = "__DELETE__";

/// Pre-change state of one setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CapturedRepr", into = "CapturedRepr")]
pub enum CapturedValue {
    /// The setting did not exist. Restoring deletes it.
    Tombstone,
    /// The setting existed with this value and type. Restoring writes it back.
    Recorded(SettingValue),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CapturedRepr {
    Sentinel(String),
    Recorded {
        value: serde_json::Value,
        #[serde(rename = "type")]
        kind: ValueKind,
    },
}

impl TryFrom<CapturedRepr> for CapturedValue {
    type Error = String;

    fn try_from(repr: CapturedRepr) -> Result<Self, Self::Error> {
        match repr {
            CapturedRepr::Sentinel(s) if s == TOMBSTONE => Ok(CapturedValue::Tombstone),
            CapturedRepr::Sentinel(s) => Err(format!("unexpected capture marker '{}'", s)),
            CapturedRepr::Recorded { value, kind } => SettingValue::from_json(value, kind)
                .map(CapturedValue::Recorded)
                .map_err(|e| e.to_string()),
        }
    }
}

impl From<CapturedValue> for CapturedRepr {
    fn from(value: CapturedValue) -> Self {
        match value {
            CapturedValue::Tombstone => CapturedRepr::Sentinel(TOMBSTONE.to_string()),
            CapturedValue::Recorded(v) => {
                let (value, kind) = v.to_json();
                CapturedRepr::Recorded { value, kind }
            }
        }
    }
}

/// One entry of the store.
///
/// Variant order matters for deserialization: a GUID string must not be taken for a
/// capture marker, and a service map must not be taken for a `{value, type}` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateEntry {
    Capture(CapturedValue),
    /// Prior start modes of every service the services tweak changed.
    ServiceModes(BTreeMap<String, StartMode>),
    /// Power scheme that was active before switching.
    PowerScheme(Uuid),
}

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    entries: IndexMap<String, StateEntry>,
}

impl StateStore {
    /// Loads the store from `path`.
    ///
    /// Never fails: a missing file is an empty store, and an unreadable or corrupt file is
    /// logged and treated as empty so the tool stays usable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<IndexMap<String, StateEntry>>(&text) {
                Ok(entries) => {
                    debug!("Loaded {} state entries from '{}'.", entries.len(), path.display());
                    entries
                }
                Err(e) => {
                    error!(
                        "State file '{}' is corrupt, starting without a backup: {}",
                        path.display(),
                        e
                    );
                    IndexMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => {
                error!(
                    "State file '{}' is unreadable, starting without a backup: {}",
                    path.display(),
                    e
                );
                IndexMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&StateEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts `entry` and flushes the whole map.
    ///
    /// The in-memory insert always happens. An `Err` means the entry is not durable and will
    /// be lost if the process exits before a later flush succeeds.
    pub fn put(&mut self, key: impl Into<String>, entry: StateEntry) -> Result<(), StateStoreError> {
        let key = key.into();
        debug!("Recording state '{}' = {:?}", key, entry);
        self.entries.insert(key, entry);
        self.flush()
    }

    /// Whether an optimize cycle is in effect.
    pub fn exists(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Drops every entry and removes the state file.
    pub fn clear(&mut self) -> Result<(), StateStoreError> {
        self.entries.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Backup state cleared.");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateStoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn flush(&self) -> Result<(), StateStoreError> {
        let data = serde_json::to_string_pretty(&self.entries)?;
        write_atomic(&self.path, data.as_bytes()).map_err(|source| {
            warn!(
                "Failed to persist state to '{}': {}",
                self.path.display(),
                source
            );
            StateStoreError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Writes through a sibling temp file so a crash never leaves a half-written state file.
fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> StateStore {
        StateStore::load(dir.path().join("state").join("backup_state.json"))
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.exists());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn put_is_durable_across_reload() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store
            .put(
                "reg_GameDVR_Enabled",
                StateEntry::Capture(CapturedValue::Recorded(SettingValue::Dword(1))),
            )
            .unwrap();
        store
            .put("reg_AppCaptureEnabled", StateEntry::Capture(CapturedValue::Tombstone))
            .unwrap();
        store
            .put(
                "power_plan_guid",
                StateEntry::PowerScheme(Uuid::from_u128(0x381b4222_f694_41f0_9685_ff5bb260df2e)),
            )
            .unwrap();
        store
            .put(
                "original_service_states",
                StateEntry::ServiceModes(BTreeMap::from([("SysMain".to_string(), StartMode::Automatic)])),
            )
            .unwrap();

        let reloaded = StateStore::load(store.path().to_path_buf());
        assert_eq!(reloaded.len(), 4);
        for key in store.keys() {
            assert_eq!(reloaded.get(key), store.get(key), "entry '{}' changed on reload", key);
        }
    }

    #[test]
    fn file_format_uses_sentinel_and_typed_records() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.put("a", StateEntry::Capture(CapturedValue::Tombstone)).unwrap();
        store
            .put("b", StateEntry::Capture(CapturedValue::Recorded(SettingValue::Dword(3))))
            .unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["a"], serde_json::json!("__DELETE__"));
        assert_eq!(json["b"], serde_json::json!({"value": 3, "type": "REG_DWORD"}));
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup_state.json");
        fs::write(&path, "{ not json").unwrap();
        let store = StateStore::load(&path);
        assert!(!store.exists());
    }

    #[test]
    fn clear_removes_file_and_entries() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.put("a", StateEntry::Capture(CapturedValue::Tombstone)).unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.exists());
        assert!(!store.path().exists());
        // Clearing twice is fine.
        store.clear().unwrap();
    }

    #[test]
    fn failed_flush_keeps_entry_in_memory() {
        let dir = TempDir::new().unwrap();
        // Parent "directory" is a regular file, so the flush cannot succeed.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let mut store = StateStore::load(blocker.join("backup_state.json"));

        let result = store.put("a", StateEntry::Capture(CapturedValue::Tombstone));
        assert!(matches!(result, Err(StateStoreError::Io { .. })));
        assert!(store.contains("a"));
        assert!(store.exists());
    }
}
