// src/tweaks/mod.rs

pub mod capture;
pub mod gaming_features;
pub mod network;
pub mod power_plan;
pub mod services;
pub mod temp_files;

#[cfg(test)]
pub(crate) mod fakes;

use std::path::PathBuf;

use gaming_features::GamingFeaturesTweak;
use network::NagleTweak;
use power_plan::PowerPlanTweak;
use serde::{Deserialize, Serialize};
use services::ServicesTweak;
use strum_macros::{AsRefStr, Display, EnumIter, IntoStaticStr};
use temp_files::TempFilesTweak;

use crate::orchestrator::Session;

/// One category of system change. The snake_case name is the key used in profiles.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModuleId {
    PowerPlan,
    Services,
    GamingFeatures,
    NagleAlgorithm,
    TempFiles,
}

impl ModuleId {
    /// Whether the module's changes can be undone by a restore cycle.
    pub fn is_reversible(self) -> bool {
        !matches!(self, ModuleId::TempFiles)
    }
}

/// Result of one module pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOutcome {
    /// The profile does not enable this module.
    Disabled,
    /// Settings were driven to their tweaked values.
    Applied { changed: usize, failed: usize },
    /// The system was already in the tweaked state; nothing was captured.
    AlreadyApplied,
    /// There was nothing for the module to act on (no interfaces, empty service list).
    NoTargets,
    Restored { restored: usize, failed: usize },
    /// No capture exists for this module.
    NothingToRestore,
    Purged { entries: usize, bytes: u64, skipped: usize },
    /// One-way action; there is nothing to restore.
    Irreversible,
}

impl ModuleOutcome {
    /// Per-setting failures that did not abort the pass.
    pub fn failures(&self) -> usize {
        match self {
            ModuleOutcome::Applied { failed, .. } | ModuleOutcome::Restored { failed, .. } => {
                *failed
            }
            _ => 0,
        }
    }
}

/// A reversible (or explicitly one-way) category of system change.
pub trait TweakModule {
    fn id(&self) -> ModuleId;

    /// Captures prior state, then applies the tweak.
    fn optimize(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome>;

    /// Reverts to the captured state. Never consults the profile.
    fn restore(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome>;
}

/// Parameters the modules take from outside the state store.
#[derive(Debug, Clone, Default)]
pub struct ModuleParams {
    pub services: Vec<String>,
    pub temp_dirs: Vec<PathBuf>,
}

/// Builds the module for `id`.
pub fn build_module(id: ModuleId, params: &ModuleParams) -> Box<dyn TweakModule> {
    match id {
        ModuleId::PowerPlan => Box::new(PowerPlanTweak::new()),
        ModuleId::Services => Box::new(ServicesTweak::new(params.services.clone())),
        ModuleId::GamingFeatures => Box::new(GamingFeaturesTweak::new()),
        ModuleId::NagleAlgorithm => Box::new(NagleTweak::new()),
        ModuleId::TempFiles => Box::new(TempFilesTweak::new(params.temp_dirs.clone())),
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn module_ids_match_profile_keys() {
        let names: Vec<String> = ModuleId::iter().map(|id| id.to_string()).collect();
        assert_eq!(
            names,
            ["power_plan", "services", "gaming_features", "nagle_algorithm", "temp_files"]
        );
    }

    #[test]
    fn built_modules_report_their_id() {
        let params = ModuleParams::default();
        for id in ModuleId::iter() {
            assert_eq!(build_module(id, &params).id(), id);
        }
        assert!(!ModuleId::TempFiles.is_reversible());
    }
}
