//! Attached process control
//!
//! Opening, enumerating, and controlling a foreign process: handle
//! lifecycle, image path lookup, whole-process suspend/resume/terminate
//! through ntdll, remote thread creation, and payload injection.

use crate::handle::Handle;
use crate::injection::{Injection, InjectionResult};
use crate::memory::Memory;
use crate::thread::Thread;
use revenant_common::{ntstatus, Error, ProcessAccess, Result};
use tracing::info;
use std::ffi::c_void;
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    CreateRemoteThread, OpenProcess, QueryFullProcessImageNameW, PROCESS_ACCESS_RIGHTS,
    PROCESS_NAME_FORMAT,
};

// Whole-process suspend/resume/terminate have no documented Win32 surface;
// these return NTSTATUS, not the boolean-success convention.
#[link(name = "ntdll")]
extern "system" {
    fn NtSuspendProcess(process: HANDLE) -> i32;
    fn NtResumeProcess(process: HANDLE) -> i32;
    fn NtTerminateProcess(process: HANDLE, exit_status: i32) -> i32;
}

/// One row from a process snapshot.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: u32,
    pub parent_pid: u32,
    pub name: String,
}

/// An open handle to a foreign process.
#[derive(Debug)]
pub struct Process {
    pid: u32,
    handle: Handle,
}

impl Process {
    /// Open the process identified by `pid` with the given access rights.
    /// `inheritable` controls whether child processes inherit the handle.
    pub fn open(pid: u32, access: ProcessAccess, inheritable: bool) -> Result<Process> {
        let raw = unsafe { OpenProcess(PROCESS_ACCESS_RIGHTS(access.0), inheritable, pid) }
            .map_err(|e| Error::native_call("OpenProcess", e))?;
        info!(target: "revenant::process", "opened pid {pid} with access {:#x}", access.0);
        Ok(Process {
            pid,
            handle: Handle::new(raw),
        })
    }

    /// Snapshot every running process.
    pub fn all() -> Result<Vec<ProcessInfo>> {
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| Error::native_call("CreateToolhelp32Snapshot", e))?;

        let mut out = Vec::new();
        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        unsafe {
            if Process32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    out.push(ProcessInfo {
                        pid: entry.th32ProcessID,
                        parent_pid: entry.th32ParentProcessID,
                        name: wide_to_string(&entry.szExeFile),
                    });
                    if Process32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);
        }

        Ok(out)
    }

    /// PIDs of every process whose executable name matches `name`,
    /// case-insensitively.
    pub fn pids_by_name(name: &str) -> Result<Vec<u32>> {
        Ok(Self::all()?
            .into_iter()
            .filter(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.pid)
            .collect())
    }

    /// Open the first process matching `name` with a non-inheritable
    /// handle. Fails with [`Error::ProcessNotFound`] when no process
    /// matches.
    pub fn first_by_name(name: &str, access: ProcessAccess) -> Result<Process> {
        let pid = Self::pids_by_name(name)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProcessNotFound(name.to_string()))?;
        Self::open(pid, access, false)
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Borrowed view over this process's address space.
    pub fn memory(&self) -> Memory<'_> {
        Memory::new(self)
    }

    /// Full path of the process's main executable image.
    pub fn image_path(&self) -> Result<String> {
        let handle = self.handle.value()?;
        let mut buffer = vec![0u16; 1024];
        let mut len = buffer.len() as u32;
        unsafe {
            QueryFullProcessImageNameW(
                handle,
                PROCESS_NAME_FORMAT(0),
                PWSTR(buffer.as_mut_ptr()),
                &mut len,
            )
        }
        .map_err(|e| Error::native_call("QueryFullProcessImageNameW", e))?;
        Ok(String::from_utf16_lossy(&buffer[..len as usize]))
    }

    /// Suspend every thread in the process.
    pub fn suspend(&self) -> Result<()> {
        let handle = self.handle.value()?;
        check_status(unsafe { NtSuspendProcess(handle) })
    }

    /// Resume every thread in the process.
    pub fn resume(&self) -> Result<()> {
        let handle = self.handle.value()?;
        check_status(unsafe { NtResumeProcess(handle) })
    }

    /// Terminate the process with `exit_status`.
    pub fn terminate(&self, exit_status: i32) -> Result<()> {
        let handle = self.handle.value()?;
        info!(target: "revenant::process", "terminating pid {} with status {exit_status}", self.pid);
        check_status(unsafe { NtTerminateProcess(handle, exit_status) })
    }

    /// Start a new thread in the target at `start_address` with an optional
    /// pointer-sized `parameter`.
    pub fn create_thread(&self, start_address: usize, parameter: Option<usize>) -> Result<Thread> {
        let handle = self.handle.value()?;
        let mut tid = 0u32;
        let thread = unsafe {
            CreateRemoteThread(
                handle,
                None,
                0,
                Some(std::mem::transmute::<
                    usize,
                    unsafe extern "system" fn(*mut c_void) -> u32,
                >(start_address)),
                parameter.map(|p| p as *const c_void),
                0,
                Some(&mut tid),
            )
        }
        .map_err(|e| Error::native_call("CreateRemoteThread", e))?;
        info!(
            target: "revenant::process",
            "created thread {tid} at {start_address:#x} in pid {}", self.pid
        );
        Ok(Thread::from_parts(tid, Handle::new(thread)))
    }

    /// Run an injection against this process. See [`Injection::execute`].
    pub fn inject<'p>(&'p self, injection: &Injection<'_>) -> Result<InjectionResult<'p>> {
        injection.execute(self.memory())
    }

    /// Close the process handle. Subsequent operations fail with
    /// `HandleClosed`.
    pub fn close(&mut self) -> Result<()> {
        self.handle.close()
    }
}

fn check_status(status: i32) -> Result<()> {
    if ntstatus::is_success(status) {
        Ok(())
    } else {
        Err(Error::status_code(status as u32))
    }
}

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_contains_self() {
        let own_pid = std::process::id();
        let processes = Process::all().unwrap();
        assert!(processes.iter().any(|p| p.pid == own_pid));
    }

    #[test]
    fn test_open_self() {
        let process = Process::open(std::process::id(), ProcessAccess::ALL_ACCESS, false).unwrap();
        assert_eq!(process.pid(), std::process::id());
        assert!(process.handle().is_open());
    }

    #[test]
    fn test_open_inheritable_handle() {
        let process = Process::open(
            std::process::id(),
            ProcessAccess::QUERY_LIMITED_INFORMATION,
            true,
        )
        .unwrap();
        assert!(process.handle().is_open());
    }

    #[test]
    fn test_first_by_name_missing() {
        let result = Process::first_by_name(
            "no-such-process-by-this-name.exe",
            ProcessAccess::QUERY_LIMITED_INFORMATION,
        );
        assert!(matches!(result, Err(Error::ProcessNotFound(_))));
    }

    #[test]
    fn test_image_path_of_self() {
        let process = Process::open(
            std::process::id(),
            ProcessAccess::QUERY_LIMITED_INFORMATION,
            false,
        )
        .unwrap();
        let path = process.image_path().unwrap();
        assert!(path.to_lowercase().ends_with(".exe"));
    }

    #[test]
    fn test_closed_process_guards_operations() {
        let mut process = Process::open(std::process::id(), ProcessAccess::ALL_ACCESS, false).unwrap();
        process.close().unwrap();
        assert!(matches!(process.image_path(), Err(Error::HandleClosed)));
        assert!(matches!(process.suspend(), Err(Error::HandleClosed)));
        assert!(matches!(process.close(), Err(Error::HandleClosed)));
    }

    #[test]
    fn test_check_status_failure_maps_to_catalog() {
        let err = check_status(0xC000_0022u32 as i32).unwrap_err();
        match err {
            Error::StatusCode { code, message } => {
                assert_eq!(code, 0xC000_0022);
                assert!(message.to_lowercase().contains("access"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
