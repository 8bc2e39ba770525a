// src/memory.rs

//! Working-set trimming. One-shot, like the temp purge: nothing is captured or restored.

use std::fmt;

use crate::constants::CRITICAL_PROCESSES;

/// Outcome of one trim pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimReport {
    pub trimmed: usize,
    pub failed: usize,
    /// Drop in used physical memory across the pass. Other processes make this approximate.
    pub freed_bytes: u64,
}

impl fmt::Display for TrimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trimmed {} processes ({} inaccessible), ~{:.2} MB freed",
            self.trimmed,
            self.failed,
            self.freed_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}

/// Whether a process may have its working set emptied.
pub fn is_trim_candidate(exe_name: &str, pid: u32, own_pid: u32) -> bool {
    if pid == 0 || pid == own_pid {
        return false;
    }
    let name = exe_name.to_lowercase();
    !CRITICAL_PROCESSES.contains(&name.as_str())
}

#[cfg(windows)]
pub use self::native::free_ram;

#[cfg(not(windows))]
pub fn free_ram() -> Result<TrimReport, crate::errors::SettingError> {
    Err(crate::errors::SettingError::Unsupported(
        "working-set trimming requires Windows".to_string(),
    ))
}

#[cfg(windows)]
mod native {
    use tracing::{debug, info, warn};
    use windows::Win32::{
        Foundation::HANDLE,
        System::{
            Diagnostics::ToolHelp::{
                CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
                TH32CS_SNAPPROCESS,
            },
            ProcessStatus::K32EmptyWorkingSet,
            RemoteDesktop::ProcessIdToSessionId,
            SystemInformation::{GlobalMemoryStatusEx, MEMORYSTATUSEX},
            Threading::{
                GetCurrentProcessId, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
                PROCESS_SET_QUOTA,
            },
        },
    };

    use super::{is_trim_candidate, TrimReport};
    use crate::{
        errors::SettingError,
        utils::windows::{setting_error, OwnedHandle},
    };

    fn used_physical_memory() -> Result<u64, SettingError> {
        let mut status = MEMORYSTATUSEX {
            dwLength: std::mem::size_of::<MEMORYSTATUSEX>() as u32,
            ..Default::default()
        };
        unsafe { GlobalMemoryStatusEx(&mut status) }
            .map_err(|e| setting_error("memory status", &e))?;
        Ok(status.ullTotalPhys.saturating_sub(status.ullAvailPhys))
    }

    fn session_of(pid: u32) -> Option<u32> {
        let mut session = 0u32;
        unsafe { ProcessIdToSessionId(pid, &mut session) }
            .ok()
            .map(|_| session)
    }

    fn processes() -> Result<Vec<(u32, String)>, SettingError> {
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map(OwnedHandle)
            .map_err(|e| setting_error("process snapshot", &e))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        let mut list = Vec::new();
        let mut next = unsafe { Process32FirstW(snapshot.0, &mut entry) };
        while next.is_ok() {
            let len = entry
                .szExeFile
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(entry.szExeFile.len());
            list.push((
                entry.th32ProcessID,
                String::from_utf16_lossy(&entry.szExeFile[..len]),
            ));
            next = unsafe { Process32NextW(snapshot.0, &mut entry) };
        }
        Ok(list)
    }

    fn trim(pid: u32) -> bool {
        let handle: HANDLE = match unsafe {
            OpenProcess(PROCESS_SET_QUOTA | PROCESS_QUERY_LIMITED_INFORMATION, false, pid)
        } {
            Ok(handle) => handle,
            Err(_) => return false,
        };
        let process = OwnedHandle(handle);
        unsafe { K32EmptyWorkingSet(process.0) }.as_bool()
    }

    /// Empties the working set of every accessible process in the caller's session.
    pub fn free_ram() -> Result<TrimReport, SettingError> {
        info!("Trying to free RAM by trimming process working sets.");
        let own_pid = unsafe { GetCurrentProcessId() };
        let own_session = session_of(own_pid);
        let before = used_physical_memory()?;

        let mut report = TrimReport::default();
        for (pid, name) in processes()? {
            if !is_trim_candidate(&name, pid, own_pid) || session_of(pid) != own_session {
                continue;
            }
            if trim(pid) {
                debug!("Trimmed working set of {} ({}).", name, pid);
                report.trimmed += 1;
            } else {
                report.failed += 1;
            }
        }

        match used_physical_memory() {
            Ok(after) => report.freed_bytes = before.saturating_sub(after),
            Err(e) => warn!("Cannot measure freed memory: {}", e),
        }
        info!("{}", report);
        Ok(report)
    }
}
