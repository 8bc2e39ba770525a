// src/tweaks/gaming_features.rs

use tracing::{info, warn};

use super::{
    capture::{self, RestoreAction},
    ModuleId, ModuleOutcome, TweakModule,
};
use crate::{
    accessor::{SettingPath, SettingValue},
    constants::GAMING_STATE_PREFIX,
    orchestrator::Session,
};

/// A per-user Game Bar / Game DVR switch.
#[derive(Debug, Clone, Copy)]
pub struct GamingFeature {
    pub id: &'static str,
    pub path: &'static str,
    pub value_name: &'static str,
    pub disable_value: u32,
}

impl GamingFeature {
    pub fn setting(&self) -> SettingPath {
        SettingPath::new(self.path, self.value_name)
    }

    pub fn state_key(&self) -> String {
        format!("{}{}", GAMING_STATE_PREFIX, self.id)
    }
}

pub const GAMING_FEATURES: [GamingFeature; 2] = [
    GamingFeature {
        id: "GameDVR_Enabled",
        path: "HKEY_CURRENT_USER\\System\\GameConfigStore",
        value_name: "GameDVR_Enabled",
        disable_value: 0,
    },
    GamingFeature {
        id: "AppCaptureEnabled",
        path: "HKEY_CURRENT_USER\\Software\\Microsoft\\Windows\\CurrentVersion\\GameDVR",
        value_name: "AppCaptureEnabled",
        disable_value: 0,
    },
];

/// Turns off background game recording.
pub struct GamingFeaturesTweak {
    id: ModuleId,
    features: &'static [GamingFeature],
}

impl GamingFeaturesTweak {
    pub fn new() -> Self {
        Self {
            id: ModuleId::GamingFeatures,
            features: &GAMING_FEATURES,
        }
    }
}

impl Default for GamingFeaturesTweak {
    fn default() -> Self {
        Self::new()
    }
}

impl TweakModule for GamingFeaturesTweak {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn optimize(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Disabling Windows gaming features.", self.id);
        let registry = session.backend.registry;
        let mut changed = 0;
        let mut failed = 0;

        for feature in self.features {
            let result = capture::disable(
                &mut session.store,
                &feature.state_key(),
                registry,
                &feature.setting(),
                &SettingValue::Dword(feature.disable_value),
            );
            match result {
                Ok(()) => {
                    info!("{:?} -> '{}' disabled.", self.id, feature.value_name);
                    changed += 1;
                }
                Err(e) => {
                    warn!("{:?} -> {:#}", self.id, e);
                    failed += 1;
                }
            }
        }

        Ok(ModuleOutcome::Applied { changed, failed })
    }

    fn restore(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Restoring Windows gaming features.", self.id);
        let registry = session.backend.registry;
        let mut restored = 0;
        let mut failed = 0;

        for feature in self.features {
            match capture::restore(&session.store, &feature.state_key(), registry, &feature.setting()) {
                Ok(RestoreAction::Rewritten) => {
                    info!("{:?} -> '{}' restored to its original value.", self.id, feature.value_name);
                    restored += 1;
                }
                Ok(RestoreAction::Deleted) => {
                    info!("{:?} -> '{}' removed (it did not exist before).", self.id, feature.value_name);
                    restored += 1;
                }
                Ok(RestoreAction::NoBackup) => {
                    info!("{:?} -> No backup for '{}'.", self.id, feature.value_name);
                }
                Err(e) => {
                    warn!("{:?} -> {:#}", self.id, e);
                    failed += 1;
                }
            }
        }

        if restored == 0 && failed == 0 {
            return Ok(ModuleOutcome::NothingToRestore);
        }
        Ok(ModuleOutcome::Restored { restored, failed })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::{
        orchestrator::SystemBackend,
        state::{CapturedValue, StateEntry, StateStore},
        tweaks::fakes::{FakePower, FakeRegistry, FakeServices},
    };

    fn run<F: FnOnce(&mut Session<'_>)>(registry: &FakeRegistry, dir: &TempDir, f: F) {
        let services = FakeServices::new();
        let power = FakePower::new(Uuid::nil());
        let backend = SystemBackend {
            registry,
            interfaces: registry,
            services: &services,
            power: &power,
        };
        let mut session =
            Session::new(StateStore::load(dir.path().join("backup_state.json")), backend);
        f(&mut session);
    }

    #[test]
    fn existing_value_is_rewritten_and_missing_value_is_deleted() {
        let dir = TempDir::new().unwrap();
        let registry = FakeRegistry::new();
        let dvr = GAMING_FEATURES[0].setting();
        let capture = GAMING_FEATURES[1].setting();
        registry.insert(&dvr, SettingValue::Dword(1));
        let tweak = GamingFeaturesTweak::new();

        run(&registry, &dir, |session| {
            let outcome = tweak.optimize(session).unwrap();
            assert_eq!(outcome, ModuleOutcome::Applied { changed: 2, failed: 0 });
            assert_eq!(
                session.store.get("reg_AppCaptureEnabled"),
                Some(&StateEntry::Capture(CapturedValue::Tombstone))
            );
        });
        assert_eq!(registry.get(&dvr), Some(SettingValue::Dword(0)));
        assert_eq!(registry.get(&capture), Some(SettingValue::Dword(0)));

        run(&registry, &dir, |session| {
            let outcome = tweak.restore(session).unwrap();
            assert_eq!(outcome, ModuleOutcome::Restored { restored: 2, failed: 0 });
        });
        assert_eq!(registry.get(&dvr), Some(SettingValue::Dword(1)));
        assert_eq!(registry.get(&capture), None);
    }

    #[test]
    fn denied_feature_is_counted_and_others_still_applied() {
        let dir = TempDir::new().unwrap();
        let registry = FakeRegistry::new();
        registry.deny_access(&GAMING_FEATURES[0].setting());

        run(&registry, &dir, |session| {
            let outcome = GamingFeaturesTweak::new().optimize(session).unwrap();
            assert_eq!(outcome, ModuleOutcome::Applied { changed: 1, failed: 1 });
            assert!(!session.store.contains(&GAMING_FEATURES[0].state_key()));
        });
        assert_eq!(
            registry.get(&GAMING_FEATURES[1].setting()),
            Some(SettingValue::Dword(0))
        );
    }

    #[test]
    fn restore_without_backup_is_noop() {
        let dir = TempDir::new().unwrap();
        let registry = FakeRegistry::new();
        registry.insert(&GAMING_FEATURES[0].setting(), SettingValue::Dword(0));

        run(&registry, &dir, |session| {
            assert_eq!(
                GamingFeaturesTweak::new().restore(session).unwrap(),
                ModuleOutcome::NothingToRestore
            );
        });
        assert_eq!(registry.mutation_count(), 0);
    }
}
