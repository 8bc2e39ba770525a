// src/tweaks/services.rs

use std::{collections::BTreeMap, thread, time::Duration};

use tracing::{debug, error, info, warn};

use super::{ModuleId, ModuleOutcome, TweakModule};
use crate::{
    accessor::{ServiceControl, StartMode},
    constants::{SERVICES_STATE_KEY, SERVICE_STOP_POLL_MS, SERVICE_STOP_TIMEOUT_MS},
    orchestrator::Session,
    state::StateEntry,
};

/// Disables the services a profile lists, remembering each one's prior start mode.
///
/// All prior modes live in one composite state entry. A service already disabled before
/// the first optimize is never recorded, so restore leaves it disabled.
pub struct ServicesTweak {
    id: ModuleId,
    services: Vec<String>,
    stop_timeout: Duration,
    poll_interval: Duration,
}

impl ServicesTweak {
    pub fn new(services: Vec<String>) -> Self {
        Self {
            id: ModuleId::Services,
            services,
            stop_timeout: Duration::from_millis(SERVICE_STOP_TIMEOUT_MS),
            poll_interval: Duration::from_millis(SERVICE_STOP_POLL_MS),
        }
    }

    /// Overrides how long a stop request is awaited before reconfiguring anyway.
    pub fn with_stop_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.stop_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    fn recorded_modes(session: &Session<'_>) -> anyhow::Result<BTreeMap<String, StartMode>> {
        match session.store.get(SERVICES_STATE_KEY) {
            Some(StateEntry::ServiceModes(modes)) => Ok(modes.clone()),
            Some(other) => anyhow::bail!("Unexpected service capture: {:?}", other),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Requests a stop and waits, bounded, for the service to report it is no longer running.
    ///
    /// Best effort: a refused or slow stop is logged and the caller reconfigures anyway.
    fn stop_and_wait(&self, services: &dyn ServiceControl, name: &str) {
        info!("{:?} -> Stopping running service '{}'.", self.id, name);
        if let Err(e) = services.stop(name) {
            warn!("{:?} -> Failed to stop '{}': {}", self.id, name, e);
            return;
        }

        let mut waited = Duration::ZERO;
        loop {
            match services.query(name) {
                Ok(status) if !status.running => {
                    debug!("{:?} -> '{}' stopped.", self.id, name);
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("{:?} -> Could not confirm '{}' stopped: {}", self.id, name, e);
                    return;
                }
            }
            if waited >= self.stop_timeout {
                warn!(
                    "{:?} -> '{}' still running after {:?}, reconfiguring anyway.",
                    self.id, name, self.stop_timeout
                );
                return;
            }
            thread::sleep(self.poll_interval);
            waited += self.poll_interval.max(Duration::from_millis(1));
        }
    }
}

impl TweakModule for ServicesTweak {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn optimize(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        if self.services.is_empty() {
            info!("{:?} -> No services listed in this profile.", self.id);
            return Ok(ModuleOutcome::NoTargets);
        }
        info!("{:?} -> Disabling {} services.", self.id, self.services.len());

        let services = session.backend.services;
        let mut recorded = Self::recorded_modes(session)?;
        let mut changed = 0;
        let mut failed = 0;

        for name in &self.services {
            let status = match services.query(name) {
                Ok(status) => status,
                Err(e) if e.is_not_found() => {
                    info!("{:?} -> Service '{}' not found, skipping.", self.id, name);
                    continue;
                }
                Err(e) => {
                    warn!("{:?} -> Failed to query '{}': {}", self.id, name, e);
                    failed += 1;
                    continue;
                }
            };

            if status.start_mode != StartMode::Disabled && !recorded.contains_key(name) {
                recorded.insert(name.clone(), status.start_mode);
                info!(
                    "{:?} -> Saving start mode of '{}': {}",
                    self.id, name, status.start_mode
                );
                if let Err(e) = session
                    .store
                    .put(SERVICES_STATE_KEY, StateEntry::ServiceModes(recorded.clone()))
                {
                    warn!("{:?} -> Service capture is not durable: {}", self.id, e);
                }
            }

            if status.running {
                self.stop_and_wait(services, name);
            }

            if status.start_mode == StartMode::Disabled {
                info!("{:?} -> '{}' was already disabled.", self.id, name);
                continue;
            }

            match services.set_start_mode(name, StartMode::Disabled) {
                Ok(()) => {
                    info!("{:?} -> '{}' disabled.", self.id, name);
                    changed += 1;
                }
                Err(e) => {
                    warn!("{:?} -> Failed to disable '{}': {}", self.id, name, e);
                    failed += 1;
                }
            }
        }

        Ok(ModuleOutcome::Applied { changed, failed })
    }

    fn restore(&self, session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Restoring services.", self.id);
        let recorded = Self::recorded_modes(session)?;
        if recorded.is_empty() {
            warn!("{:?} -> No saved service states, nothing to restore.", self.id);
            return Ok(ModuleOutcome::NothingToRestore);
        }

        let services = session.backend.services;
        let mut restored = 0;
        let mut failed = 0;
        for (name, mode) in &recorded {
            match services.set_start_mode(name, *mode) {
                Ok(()) => {
                    info!("{:?} -> '{}' restored to {}.", self.id, name, mode);
                    restored += 1;
                }
                Err(e) if e.is_not_found() => {
                    info!("{:?} -> '{}' no longer exists, nothing to restore.", self.id, name);
                    restored += 1;
                }
                Err(e) => {
                    error!("{:?} -> Failed to restore '{}' to {}: {}", self.id, name, mode, e);
                    failed += 1;
                }
            }
        }

        Ok(ModuleOutcome::Restored { restored, failed })
    }
}
