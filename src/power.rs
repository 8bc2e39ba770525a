// src/power.rs

use std::ptr;

use tracing::warn;
use uuid::Uuid;
use widestring::U16String;
use windows::{
    core::GUID,
    Win32::{
        Foundation::{LocalFree, ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA, HLOCAL, WIN32_ERROR},
        System::Power::{PowerGetActiveScheme, PowerReadFriendlyName, PowerSetActiveScheme},
    },
};

use crate::{accessor::PowerSchemeControl, errors::SettingError};

fn to_guid(scheme: &Uuid) -> GUID {
    GUID::from_u128(scheme.as_u128())
}

fn to_uuid(guid: &GUID) -> Uuid {
    Uuid::from_u128(guid.to_u128())
}

fn check(result: WIN32_ERROR, context: &str) -> Result<(), SettingError> {
    if result == WIN32_ERROR(0) {
        Ok(())
    } else {
        Err(SettingError::from_win32(context, result.0))
    }
}

/// The active power scheme through the Power Management API.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPower;

impl WindowsPower {
    pub fn new() -> Self {
        Self
    }
}

impl PowerSchemeControl for WindowsPower {
    fn active_scheme(&self) -> Result<Uuid, SettingError> {
        let mut guid_pointer: *mut GUID = ptr::null_mut();
        let result = unsafe { PowerGetActiveScheme(None, &mut guid_pointer) };
        check(result, "active power scheme")?;
        if guid_pointer.is_null() {
            return Err(SettingError::NotFound("active power scheme".to_string()));
        }

        let active = LocalGuid { ptr: guid_pointer };
        let guid = unsafe { *active.ptr };
        Ok(to_uuid(&guid))
    }

    fn set_active_scheme(&self, scheme: &Uuid) -> Result<(), SettingError> {
        let guid = to_guid(scheme);
        let result = unsafe { PowerSetActiveScheme(None, Some(&guid)) };
        check(result, &format!("power scheme {}", scheme))
    }

    fn scheme_name(&self, scheme: &Uuid) -> Option<String> {
        read_friendly_name(&to_guid(scheme))
            .inspect_err(|e| warn!("Cannot read name of power scheme {}: {}", scheme, e))
            .ok()
            .flatten()
    }
}

fn read_friendly_name(scheme_guid: &GUID) -> Result<Option<String>, SettingError> {
    let mut buffer_size: u32 = 0;

    // First call sizes the buffer.
    let result = unsafe {
        PowerReadFriendlyName(None, Some(scheme_guid), None, None, None, &mut buffer_size)
    };
    if result == ERROR_FILE_NOT_FOUND {
        return Ok(None);
    }
    if result != WIN32_ERROR(0) && result != ERROR_MORE_DATA {
        return Err(SettingError::from_win32("power scheme name", result.0));
    }

    let mut buffer: Vec<u16> = vec![0; (buffer_size.max(2) / 2) as usize];
    let result = unsafe {
        PowerReadFriendlyName(
            None,
            Some(scheme_guid),
            None,
            None,
            Some(buffer.as_mut_ptr() as *mut u8),
            &mut buffer_size,
        )
    };
    check(result, "power scheme name")?;

    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    buffer.truncate(len);
    let name = U16String::from_vec(buffer).to_string_lossy();
    Ok((!name.is_empty()).then_some(name))
}

/// GUID allocated by the power API, released with `LocalFree`.
struct LocalGuid {
    ptr: *mut GUID,
}

impl Drop for LocalGuid {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            let freed = unsafe { LocalFree(HLOCAL(self.ptr as *mut _)) };
            if !freed.is_invalid() {
                warn!("Failed to free power scheme GUID.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HIGH_PERFORMANCE_SCHEME;

    #[test]
    fn guid_conversion_keeps_field_layout() {
        let guid = to_guid(&HIGH_PERFORMANCE_SCHEME);
        assert_eq!(guid.data1, 0x8c5e7fda);
        assert_eq!(guid.data2, 0xe8bf);
        assert_eq!(to_uuid(&guid), HIGH_PERFORMANCE_SCHEME);
    }

    #[test]
    #[ignore = "reads the live power configuration"]
    fn reads_active_scheme_and_its_name() {
        let power = WindowsPower::new();
        let active = power.active_scheme().unwrap();
        println!("Active scheme: {} {:?}", active, power.scheme_name(&active));
    }
}
