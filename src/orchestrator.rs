// src/orchestrator.rs

use std::{fmt, path::PathBuf};

use strum::IntoEnumIterator;
use tracing::{error, info, warn};

use crate::{
    accessor::{InterfaceEnumerator, PowerSchemeControl, ServiceControl, SettingAccessor},
    profile::Profile,
    state::StateStore,
    tweaks::{build_module, ModuleId, ModuleOutcome, ModuleParams},
};

/// The system-facing accessors a session drives.
#[derive(Clone, Copy)]
pub struct SystemBackend<'a> {
    pub registry: &'a dyn SettingAccessor,
    pub interfaces: &'a dyn InterfaceEnumerator,
    pub services: &'a dyn ServiceControl,
    pub power: &'a dyn PowerSchemeControl,
}

/// Everything one optimize or restore invocation works with. Built fresh per invocation.
pub struct Session<'a> {
    pub store: StateStore,
    pub backend: SystemBackend<'a>,
}

impl<'a> Session<'a> {
    pub fn new(store: StateStore, backend: SystemBackend<'a>) -> Self {
        Self { store, backend }
    }

    pub fn into_store(self) -> StateStore {
        self.store
    }
}

#[derive(Debug)]
pub struct ModuleReport {
    pub module: ModuleId,
    /// `Err` holds the message of a module-level failure.
    pub outcome: Result<ModuleOutcome, String>,
}

impl ModuleReport {
    /// Per-setting failures, or 1 when the whole module failed.
    pub fn failures(&self) -> usize {
        match &self.outcome {
            Ok(outcome) => outcome.failures(),
            Err(_) => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleKind {
    Optimize,
    Restore,
}

#[derive(Debug)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub modules: Vec<ModuleReport>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.modules.iter().all(ModuleReport::is_success)
    }

    pub fn outcome(&self, module: ModuleId) -> Option<&Result<ModuleOutcome, String>> {
        self.modules
            .iter()
            .find(|report| report.module == module)
            .map(|report| &report.outcome)
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self.kind {
            CycleKind::Optimize => "Optimize",
            CycleKind::Restore => "Restore",
        };
        writeln!(f, "{} results:", title)?;
        for report in &self.modules {
            match &report.outcome {
                Ok(outcome) => writeln!(f, "{:<16} {:?}", report.module.as_ref(), outcome)?,
                Err(e) => writeln!(f, "{:<16} FAILED: {}", report.module.as_ref(), e)?,
            }
        }
        Ok(())
    }
}

/// Runs the optimize path of every module, skipping those the profile does not enable.
///
/// A failing module is logged and recorded; the remaining modules still run.
pub fn optimize(session: &mut Session<'_>, profile: &Profile, temp_dirs: &[PathBuf]) -> CycleReport {
    info!("=== Optimizing with profile '{}' ===", profile.name);
    let params = ModuleParams {
        services: profile.optimizations.services.list.clone(),
        temp_dirs: temp_dirs.to_vec(),
    };

    let mut modules = Vec::new();
    for id in ModuleId::iter() {
        if !profile.is_enabled(id) {
            info!("{:?} -> Disabled in this profile.", id);
            modules.push(ModuleReport {
                module: id,
                outcome: Ok(ModuleOutcome::Disabled),
            });
            continue;
        }

        let module = build_module(id, &params);
        let outcome = module.optimize(session).map_err(|e| {
            error!("{:?} -> Optimization failed: {:#}", id, e);
            format!("{:#}", e)
        });
        modules.push(ModuleReport { module: id, outcome });
    }

    let report = CycleReport {
        kind: CycleKind::Optimize,
        modules,
    };

    info!("=== Optimization complete ===");
    if report.is_success() {
        info!("A restart is recommended for every change to take effect.");
    }
    report
}

/// Runs the restore path of every reversible module from whatever the store holds.
///
/// The store is cleared only if every module restored cleanly; otherwise it is kept so the
/// restore can be retried.
pub fn restore(session: &mut Session<'_>) -> CycleReport {
    info!("=== Restoring ===");
    let params = ModuleParams::default();

    let mut modules = Vec::new();
    for id in ModuleId::iter() {
        if !id.is_reversible() {
            info!("{:?} -> One-way change, nothing to restore.", id);
            modules.push(ModuleReport {
                module: id,
                outcome: Ok(ModuleOutcome::Irreversible),
            });
            continue;
        }

        let module = build_module(id, &params);
        let outcome = module.restore(session).map_err(|e| {
            error!("{:?} -> Restore failed: {:#}", id, e);
            format!("{:#}", e)
        });
        modules.push(ModuleReport { module: id, outcome });
    }

    let report = CycleReport {
        kind: CycleKind::Restore,
        modules,
    };

    if report.is_success() {
        if let Err(e) = session.store.clear() {
            error!("Failed to clear backup state: {}", e);
        }
        info!("=== Restore complete ===");
    } else {
        warn!(
            "Restore finished with failures; the backup at '{}' is kept so it can be retried.",
            session.store.path().display()
        );
    }
    report
}
