// src/utils/services.rs

use widestring::U16CString;
use windows::{
    core::PCWSTR,
    Win32::System::Services::{
        ChangeServiceConfigW, CloseServiceHandle, ControlService, OpenSCManagerW, OpenServiceW,
        QueryServiceConfigW, QueryServiceStatus, ENUM_SERVICE_TYPE, QUERY_SERVICE_CONFIGW,
        SC_HANDLE, SC_MANAGER_CONNECT, SERVICE_AUTO_START, SERVICE_BOOT_START,
        SERVICE_CHANGE_CONFIG, SERVICE_CONTROL_STOP, SERVICE_DEMAND_START, SERVICE_DISABLED,
        SERVICE_ERROR, SERVICE_NO_CHANGE, SERVICE_QUERY_CONFIG, SERVICE_QUERY_STATUS,
        SERVICE_START_TYPE, SERVICE_STATUS, SERVICE_STOP, SERVICE_STOPPED, SERVICE_SYSTEM_START,
    },
};

use super::windows::{setting_error, win32_code};
use crate::{
    accessor::{ServiceControl, ServiceStatus, StartMode},
    errors::SettingError,
};

const ERROR_SERVICE_NOT_ACTIVE: u32 = 1062;

/// Closes a service or SCM handle on drop.
struct ScHandle(SC_HANDLE);

impl Drop for ScHandle {
    fn drop(&mut self) {
        if let Err(e) = unsafe { CloseServiceHandle(self.0) } {
            tracing::error!("Failed to close service handle: {:?}", e);
        }
    }
}

fn to_start_type(mode: StartMode) -> SERVICE_START_TYPE {
    match mode {
        StartMode::Boot => SERVICE_BOOT_START,
        StartMode::System => SERVICE_SYSTEM_START,
        StartMode::Automatic => SERVICE_AUTO_START,
        StartMode::Manual => SERVICE_DEMAND_START,
        StartMode::Disabled => SERVICE_DISABLED,
    }
}

fn from_start_type(start_type: SERVICE_START_TYPE) -> Result<StartMode, SettingError> {
    Ok(match start_type {
        SERVICE_BOOT_START => StartMode::Boot,
        SERVICE_SYSTEM_START => StartMode::System,
        SERVICE_AUTO_START => StartMode::Automatic,
        SERVICE_DEMAND_START => StartMode::Manual,
        SERVICE_DISABLED => StartMode::Disabled,
        other => {
            return Err(SettingError::InvalidValue(format!(
                "unknown service start type {}",
                other.0
            )))
        }
    })
}

/// Service control through the Service Control Manager.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsServiceControl;

impl WindowsServiceControl {
    pub fn new() -> Self {
        Self
    }

    fn open(&self, name: &str, access: u32) -> Result<ScHandle, SettingError> {
        let wide = U16CString::from_str(name)
            .map_err(|e| SettingError::InvalidPath(format!("service '{}': {}", name, e)))?;

        let scm = unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT) }
            .map(ScHandle)
            .map_err(|e| setting_error("Service Control Manager", &e))?;

        unsafe { OpenServiceW(scm.0, PCWSTR::from_raw(wide.as_ptr()), access) }
            .map(ScHandle)
            .map_err(|e| setting_error(format!("service '{}'", name), &e))
    }

    fn start_mode(&self, service: &ScHandle, name: &str) -> Result<StartMode, SettingError> {
        let mut needed = 0u32;
        // Sizing call; fails with ERROR_INSUFFICIENT_BUFFER by contract.
        let _ = unsafe { QueryServiceConfigW(service.0, None, 0, &mut needed) };

        // u64 elements keep the buffer aligned for QUERY_SERVICE_CONFIGW.
        let mut buffer = vec![0u64; (needed as usize).div_ceil(8).max(1)];
        let config = buffer.as_mut_ptr() as *mut QUERY_SERVICE_CONFIGW;
        unsafe { QueryServiceConfigW(service.0, Some(config), needed, &mut needed) }
            .map_err(|e| setting_error(format!("config of service '{}'", name), &e))?;

        from_start_type(unsafe { (*config).dwStartType })
    }
}

impl ServiceControl for WindowsServiceControl {
    fn query(&self, name: &str) -> Result<ServiceStatus, SettingError> {
        let service = self.open(name, SERVICE_QUERY_CONFIG | SERVICE_QUERY_STATUS)?;
        let start_mode = self.start_mode(&service, name)?;

        let mut status = SERVICE_STATUS::default();
        unsafe { QueryServiceStatus(service.0, &mut status) }
            .map_err(|e| setting_error(format!("status of service '{}'", name), &e))?;

        Ok(ServiceStatus {
            start_mode,
            running: status.dwCurrentState != SERVICE_STOPPED,
        })
    }

    fn set_start_mode(&self, name: &str, mode: StartMode) -> Result<(), SettingError> {
        let service = self.open(name, SERVICE_CHANGE_CONFIG)?;
        unsafe {
            ChangeServiceConfigW(
                service.0,
                ENUM_SERVICE_TYPE(SERVICE_NO_CHANGE),
                to_start_type(mode),
                SERVICE_ERROR(SERVICE_NO_CHANGE),
                PCWSTR::null(),
                PCWSTR::null(),
                None,
                PCWSTR::null(),
                PCWSTR::null(),
                PCWSTR::null(),
                PCWSTR::null(),
            )
        }
        .map_err(|e| setting_error(format!("start mode of service '{}'", name), &e))
    }

    fn stop(&self, name: &str) -> Result<(), SettingError> {
        let service = self.open(name, SERVICE_STOP)?;
        let mut status = SERVICE_STATUS::default();
        match unsafe { ControlService(service.0, SERVICE_CONTROL_STOP, &mut status) } {
            Ok(()) => Ok(()),
            Err(e) if win32_code(&e) == ERROR_SERVICE_NOT_ACTIVE => Ok(()),
            Err(e) => Err(setting_error(format!("stopping service '{}'", name), &e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_types_round_trip() {
        for mode in [
            StartMode::Boot,
            StartMode::System,
            StartMode::Automatic,
            StartMode::Manual,
            StartMode::Disabled,
        ] {
            assert_eq!(from_start_type(to_start_type(mode)).unwrap(), mode);
        }
    }

    #[test]
    fn missing_service_is_not_found() {
        let err = WindowsServiceControl::new()
            .query("perf_tool_no_such_service")
            .unwrap_err();
        assert!(err.is_not_found(), "{:?}", err);
    }

    #[test]
    #[ignore = "queries a live service"]
    fn queries_event_log_service() {
        let status = WindowsServiceControl::new().query("EventLog").unwrap();
        assert!(status.running);
    }
}
