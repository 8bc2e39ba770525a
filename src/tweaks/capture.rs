// src/tweaks/capture.rs

//! Capture-then-mutate and blind restore, shared by every registry-style tweak.
//!
//! First capture wins: once a key is in the store, later `disable` passes never overwrite
//! it, so a second optimize run cannot record an already-tweaked value as the original.
//! Restore writes back exactly what was captured and never looks at the live value.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::{
    accessor::{SettingAccessor, SettingPath, SettingValue},
    state::{CapturedValue, StateEntry, StateStore},
};

/// What `restore` did for one setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreAction {
    /// The recorded value was written back.
    Rewritten,
    /// The setting did not exist before and was deleted.
    Deleted,
    /// No capture exists for this key; nothing was touched.
    NoBackup,
}

/// Captures the current value of `path` under `state_key` (unless already captured), then
/// writes `disable_value`.
///
/// A read failure other than "not found" aborts before anything is captured or written. A
/// failure to persist the capture is logged and the write still happens.
pub fn disable(
    store: &mut StateStore,
    state_key: &str,
    accessor: &dyn SettingAccessor,
    path: &SettingPath,
    disable_value: &SettingValue,
) -> Result<()> {
    if !store.contains(state_key) {
        let current = accessor
            .read(path)
            .with_context(|| format!("Failed to read original value of '{}'", path))?;

        let captured = match current {
            Some(value) => {
                debug!("Capturing '{}' = {} under '{}'.", path, value, state_key);
                CapturedValue::Recorded(value)
            }
            None => {
                debug!("'{}' does not exist, capturing tombstone under '{}'.", path, state_key);
                CapturedValue::Tombstone
            }
        };

        if let Err(e) = store.put(state_key, StateEntry::Capture(captured)) {
            warn!("Capture of '{}' is not durable: {}", path, e);
        }
    } else {
        debug!("'{}' already captured, keeping the original capture.", state_key);
    }

    accessor
        .write(path, disable_value)
        .with_context(|| format!("Failed to set '{}' to {}", path, disable_value))
}

/// Returns `path` to the state captured under `state_key`.
pub fn restore(
    store: &StateStore,
    state_key: &str,
    accessor: &dyn SettingAccessor,
    path: &SettingPath,
) -> Result<RestoreAction> {
    match store.get(state_key) {
        Some(StateEntry::Capture(CapturedValue::Tombstone)) => {
            accessor
                .delete(path)
                .with_context(|| format!("Failed to delete '{}'", path))?;
            Ok(RestoreAction::Deleted)
        }
        Some(StateEntry::Capture(CapturedValue::Recorded(value))) => {
            accessor
                .write(path, value)
                .with_context(|| format!("Failed to restore '{}' to {}", path, value))?;
            Ok(RestoreAction::Rewritten)
        }
        Some(other) => anyhow::bail!(
            "State '{}' does not hold a setting capture: {:?}",
            state_key,
            other
        ),
        None => Ok(RestoreAction::NoBackup),
    }
}
