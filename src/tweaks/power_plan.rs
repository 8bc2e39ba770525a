// src/tweaks/power_plan.rs

use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ModuleId, ModuleOutcome, TweakModule};
use crate::{
    constants::{HIGH_PERFORMANCE_SCHEME, POWER_PLAN_STATE_KEY},
    orchestrator::Session,
    state::StateEntry,
};

/// Switches the active power scheme to High performance and back.
pub struct PowerPlanTweak {
    id: ModuleId,
    target: Uuid,
}

impl PowerPlanTweak {
    pub fn new() -> Self {
        Self {
            id: ModuleId::PowerPlan,
            target: HIGH_PERFORMANCE_SCHEME,
        }
    }

    fn describe(session: &Session<'_>, scheme: &Uuid) -> String {
        match session.backend.power.scheme_name(scheme) {
            Some(name) => format!("'{}' ({})", name, scheme),
            None => scheme.to_string(),
        }
    }
}

impl Default for PowerPlanTweak {
    fn default() -> Self {
        Self::new()
    }
}

impl TweakModule for PowerPlanTweak {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn optimize(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Switching to the High performance power plan.", self.id);
        let power = session.backend.power;
        let current = power
            .active_scheme()
            .context("Failed to read the active power scheme")?;

        if current == self.target {
            info!("{:?} -> High performance plan already active.", self.id);
            return Ok(ModuleOutcome::AlreadyApplied);
        }

        if !session.store.contains(POWER_PLAN_STATE_KEY) {
            if let Err(e) = session
                .store
                .put(POWER_PLAN_STATE_KEY, StateEntry::PowerScheme(current))
            {
                warn!("{:?} -> Power plan capture is not durable: {}", self.id, e);
            }
            info!(
                "{:?} -> Saved current power plan {}.",
                self.id,
                Self::describe(session, &current)
            );
        }

        power
            .set_active_scheme(&self.target)
            .context("Failed to activate the High performance power plan")?;
        info!("{:?} -> High performance power plan active.", self.id);
        Ok(ModuleOutcome::Applied {
            changed: 1,
            failed: 0,
        })
    }

    fn restore(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Restoring power plan.", self.id);
        let original = match session.store.get(POWER_PLAN_STATE_KEY) {
            Some(StateEntry::PowerScheme(scheme)) => *scheme,
            Some(other) => anyhow::bail!("Unexpected power plan capture: {:?}", other),
            None => {
                warn!("{:?} -> No saved power plan, nothing to restore.", self.id);
                return Ok(ModuleOutcome::NothingToRestore);
            }
        };

        session
            .backend
            .power
            .set_active_scheme(&original)
            .with_context(|| format!("Failed to reactivate power plan {}", original))?;
        info!(
            "{:?} -> Power plan restored to {}.",
            self.id,
            Self::describe(session, &original)
        );
        Ok(ModuleOutcome::Restored {
            restored: 1,
            failed: 0,
        })
    }
}
