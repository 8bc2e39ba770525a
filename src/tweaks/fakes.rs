// src/tweaks/fakes.rs

//! In-memory stand-ins for the system accessors, used by the unit tests.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
};

use uuid::Uuid;

use crate::{
    accessor::{
        InterfaceEnumerator, PowerSchemeControl, ServiceControl, ServiceStatus, SettingAccessor,
        SettingPath, SettingValue, StartMode,
    },
    errors::SettingError,
};

#[derive(Default)]
pub struct FakeRegistry {
    values: RefCell<HashMap<SettingPath, SettingValue>>,
    denied: RefCell<HashSet<SettingPath>>,
    failing_writes: RefCell<HashSet<SettingPath>>,
    interfaces: RefCell<Vec<String>>,
    mutations: Cell<usize>,
}

/// Registry key paths and value names compare case-insensitively.
fn fold(path: &SettingPath) -> SettingPath {
    SettingPath::new(
        path.namespace.to_ascii_lowercase(),
        path.name.to_ascii_lowercase(),
    )
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value without counting it as a mutation.
    pub fn insert(&self, path: &SettingPath, value: SettingValue) {
        self.values.borrow_mut().insert(fold(path), value);
    }

    pub fn get(&self, path: &SettingPath) -> Option<SettingValue> {
        self.values.borrow().get(&fold(path)).cloned()
    }

    pub fn deny_access(&self, path: &SettingPath) {
        self.denied.borrow_mut().insert(fold(path));
    }

    pub fn fail_writes(&self, path: &SettingPath) {
        self.failing_writes.borrow_mut().insert(fold(path));
    }

    pub fn set_interfaces(&self, ids: &[&str]) {
        *self.interfaces.borrow_mut() = ids.iter().map(|s| s.to_string()).collect();
    }

    /// Successful writes and deletes so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.get()
    }

    fn check_access(&self, path: &SettingPath) -> Result<(), SettingError> {
        if self.denied.borrow().contains(&fold(path)) {
            return Err(SettingError::AccessDenied(path.to_string()));
        }
        Ok(())
    }
}

impl SettingAccessor for FakeRegistry {
    fn read(&self, path: &SettingPath) -> Result<Option<SettingValue>, SettingError> {
        self.check_access(path)?;
        Ok(self.get(path))
    }

    fn write(&self, path: &SettingPath, value: &SettingValue) -> Result<(), SettingError> {
        self.check_access(path)?;
        if self.failing_writes.borrow().contains(&fold(path)) {
            return Err(SettingError::Os {
                code: 5,
                message: format!("write to {} rejected", path),
            });
        }
        self.insert(path, value.clone());
        self.mutations.set(self.mutations.get() + 1);
        Ok(())
    }

    fn delete(&self, path: &SettingPath) -> Result<(), SettingError> {
        self.check_access(path)?;
        self.values.borrow_mut().remove(&fold(path));
        self.mutations.set(self.mutations.get() + 1);
        Ok(())
    }
}

impl InterfaceEnumerator for FakeRegistry {
    fn interface_ids(&self) -> Result<Vec<String>, SettingError> {
        Ok(self.interfaces.borrow().clone())
    }
}

#[derive(Default)]
pub struct FakeServices {
    services: RefCell<HashMap<String, ServiceStatus>>,
    failing: RefCell<HashSet<String>>,
    stubborn: RefCell<HashSet<String>>,
    stop_requests: RefCell<Vec<String>>,
}

impl FakeServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: &str, start_mode: StartMode, running: bool) {
        self.services
            .borrow_mut()
            .insert(name.to_string(), ServiceStatus { start_mode, running });
    }

    pub fn remove(&self, name: &str) {
        self.services.borrow_mut().remove(name);
    }

    /// Reconfiguring this service fails with an OS error.
    pub fn fail(&self, name: &str) {
        self.failing.borrow_mut().insert(name.to_string());
    }

    /// This service accepts stop requests but keeps running.
    pub fn stubborn(&self, name: &str) {
        self.stubborn.borrow_mut().insert(name.to_string());
    }

    pub fn status(&self, name: &str) -> Option<ServiceStatus> {
        self.services.borrow().get(name).copied()
    }

    pub fn stop_requests(&self) -> Vec<String> {
        self.stop_requests.borrow().clone()
    }
}

impl ServiceControl for FakeServices {
    fn query(&self, name: &str) -> Result<ServiceStatus, SettingError> {
        self.status(name)
            .ok_or_else(|| SettingError::NotFound(format!("service '{}'", name)))
    }

    fn set_start_mode(&self, name: &str, mode: StartMode) -> Result<(), SettingError> {
        if self.failing.borrow().contains(name) {
            return Err(SettingError::Os {
                code: 1052,
                message: format!("cannot reconfigure '{}'", name),
            });
        }
        let mut services = self.services.borrow_mut();
        let status = services
            .get_mut(name)
            .ok_or_else(|| SettingError::NotFound(format!("service '{}'", name)))?;
        status.start_mode = mode;
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<(), SettingError> {
        self.stop_requests.borrow_mut().push(name.to_string());
        if self.stubborn.borrow().contains(name) {
            return Ok(());
        }
        let mut services = self.services.borrow_mut();
        let status = services
            .get_mut(name)
            .ok_or_else(|| SettingError::NotFound(format!("service '{}'", name)))?;
        status.running = false;
        Ok(())
    }
}

pub struct FakePower {
    active: Cell<Uuid>,
    switches: Cell<usize>,
}

impl FakePower {
    pub fn new(active: Uuid) -> Self {
        Self {
            active: Cell::new(active),
            switches: Cell::new(0),
        }
    }

    pub fn active(&self) -> Uuid {
        self.active.get()
    }

    pub fn switch_count(&self) -> usize {
        self.switches.get()
    }
}

impl PowerSchemeControl for FakePower {
    fn active_scheme(&self) -> Result<Uuid, SettingError> {
        Ok(self.active.get())
    }

    fn set_active_scheme(&self, scheme: &Uuid) -> Result<(), SettingError> {
        self.active.set(*scheme);
        self.switches.set(self.switches.get() + 1);
        Ok(())
    }
}
