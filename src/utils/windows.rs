// src/utils/windows.rs

use windows::Win32::{
    Foundation::{CloseHandle, HANDLE},
    Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY},
    System::Threading::{GetCurrentProcess, OpenProcessToken},
};

use crate::errors::SettingError;

/// Checks if the current process is running with elevated (administrator) privileges.
pub fn is_elevated() -> bool {
    let mut handle = HANDLE::default();
    if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut handle) }.is_err() {
        return false;
    }
    let token = OwnedHandle(handle);

    let mut elevation = TOKEN_ELEVATION::default();
    let mut ret_size = 0u32;
    let queried = unsafe {
        GetTokenInformation(
            token.0,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut ret_size,
        )
    };
    queried.is_ok() && elevation.TokenIsElevated != 0
}

/// Closes a kernel handle on drop.
pub(crate) struct OwnedHandle(pub HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            if let Err(e) = unsafe { CloseHandle(self.0) } {
                tracing::error!("Failed to close handle: {:?}", e);
            }
        }
    }
}

/// Extracts the Win32 error code from an `HRESULT`-carrying error.
pub(crate) fn win32_code(e: &windows::core::Error) -> u32 {
    let hr = e.code().0 as u32;
    if hr & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    }
}

pub(crate) fn setting_error(context: impl Into<String>, e: &windows::core::Error) -> SettingError {
    SettingError::from_win32(context, win32_code(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_elevated() {
        let elevated = is_elevated();
        println!("Is elevated: {}", elevated);
    }

    #[test]
    fn hresult_from_win32_is_unwrapped() {
        let e = windows::core::Error::from(windows::core::HRESULT(0x8007_0424_u32 as i32));
        assert_eq!(win32_code(&e), 1060);
    }
}
