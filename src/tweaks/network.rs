// src/tweaks/network.rs

use std::collections::HashSet;

use anyhow::Context;
use tracing::{debug, info, warn};

use super::{
    capture::{self, RestoreAction},
    ModuleId, ModuleOutcome, TweakModule,
};
use crate::{
    accessor::{SettingPath, SettingValue},
    constants::{NAGLE_STATE_PREFIX, TCPIP_INTERFACES_PATH},
    orchestrator::Session,
};

/// Per-interface values that turn off Nagle's algorithm and delayed ACKs.
pub const NAGLE_VALUES: [(&str, u32); 2] = [("TcpAckFrequency", 1), ("TCPNoDelay", 1)];

/// Low-latency TCP settings for every network interface.
pub struct NagleTweak {
    id: ModuleId,
}

impl NagleTweak {
    pub fn new() -> Self {
        Self {
            id: ModuleId::NagleAlgorithm,
        }
    }

    fn setting(interface: &str, value_name: &str) -> SettingPath {
        SettingPath::new(format!("{}\\{}", TCPIP_INTERFACES_PATH, interface), value_name)
    }

    /// Interface ids are GUIDs the registry compares without case, so the key is built from
    /// the lowercased id. Any enumerated spelling of an interface maps to the same capture.
    fn state_key(interface: &str, value_name: &str) -> String {
        format!(
            "{}{}_{}",
            NAGLE_STATE_PREFIX,
            interface.to_ascii_lowercase(),
            value_name
        )
    }

    /// Splits a state key written by this module into interface id and value name.
    fn parse_key(key: &str) -> Option<(&str, &'static str)> {
        let rest = key.strip_prefix(NAGLE_STATE_PREFIX)?;
        NAGLE_VALUES.iter().find_map(|(name, _)| {
            rest.strip_suffix(name)
                .and_then(|r| r.strip_suffix('_'))
                .filter(|id| !id.is_empty())
                .map(|id| (id, *name))
        })
    }

    /// Enumerated interfaces with aliases removed, keeping first-seen order.
    fn discover(session: &Session<'_>) -> anyhow::Result<Vec<String>> {
        let ids = session
            .backend
            .interfaces
            .interface_ids()
            .context("Failed to enumerate network interfaces")?;
        Ok(dedup_ids(ids))
    }
}

impl Default for NagleTweak {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup_ids(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.to_ascii_lowercase()))
        .collect()
}

impl TweakModule for NagleTweak {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn optimize(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Disabling Nagle's algorithm for low latency.", self.id);
        let interfaces = Self::discover(session)?;
        if interfaces.is_empty() {
            warn!("{:?} -> No network interfaces found, nothing to tweak.", self.id);
            return Ok(ModuleOutcome::NoTargets);
        }
        info!("{:?} -> Found {} network interfaces.", self.id, interfaces.len());

        let registry = session.backend.registry;
        let mut changed = 0;
        let mut failed = 0;
        for interface in &interfaces {
            for (value_name, value) in NAGLE_VALUES {
                let result = capture::disable(
                    &mut session.store,
                    &Self::state_key(interface, value_name),
                    registry,
                    &Self::setting(interface, value_name),
                    &SettingValue::Dword(value),
                );
                match result {
                    Ok(()) => changed += 1,
                    Err(e) => {
                        warn!("{:?} -> {:#}", self.id, e);
                        failed += 1;
                    }
                }
            }
        }

        info!(
            "{:?} -> Network tweaks applied to {} interfaces.",
            self.id,
            interfaces.len()
        );
        Ok(ModuleOutcome::Applied { changed, failed })
    }

    fn restore(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Restoring Nagle's algorithm settings.", self.id);

        // Driven by the captures rather than the live adapters: interfaces removed since the
        // optimize pass still get cleaned up and enumeration order cannot hide a capture.
        let captured: Vec<(String, String, &'static str)> = session
            .store
            .keys()
            .filter_map(|key| {
                Self::parse_key(key)
                    .map(|(interface, value_name)| (key.to_string(), interface.to_string(), value_name))
            })
            .collect();
        if captured.is_empty() {
            info!("{:?} -> No saved network settings, nothing to restore.", self.id);
            return Ok(ModuleOutcome::NothingToRestore);
        }

        let registry = session.backend.registry;
        let mut interfaces = HashSet::new();
        let mut restored = 0;
        let mut failed = 0;
        for (key, interface, value_name) in &captured {
            interfaces.insert(interface.to_ascii_lowercase());
            let result = capture::restore(
                &session.store,
                key,
                registry,
                &Self::setting(interface, value_name),
            );
            match result {
                Ok(RestoreAction::Rewritten | RestoreAction::Deleted) => restored += 1,
                Ok(RestoreAction::NoBackup) => {
                    debug!("{:?} -> No backup for {} on {}.", self.id, value_name, interface)
                }
                Err(e) => {
                    warn!("{:?} -> {:#}", self.id, e);
                    failed += 1;
                }
            }
        }

        info!(
            "{:?} -> Network settings restored on {} interfaces.",
            self.id,
            interfaces.len()
        );
        Ok(ModuleOutcome::Restored { restored, failed })
    }
}
