//! Module enumeration and ejection
//!
//! Snapshots the modules loaded in a target process and can unload one by
//! running `FreeLibrary` on a new remote thread.

use crate::process::Process;
use revenant_common::{Error, Result};
use tracing::info;
use windows::core::s;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, MODULEENTRY32W, TH32CS_SNAPMODULE,
    TH32CS_SNAPMODULE32,
};
use windows::Win32::System::LibraryLoader::{GetModuleHandleA, GetProcAddress};

/// A module loaded inside the target process.
#[derive(Debug, Clone)]
pub struct Module {
    pub pid: u32,
    pub name: String,
    pub path: String,
    pub base: usize,
    pub size: usize,
}

impl Module {
    /// Snapshot every module loaded in `pid`.
    pub fn all_of(pid: u32) -> Result<Vec<Module>> {
        let snapshot =
            unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) }
                .map_err(|e| Error::native_call("CreateToolhelp32Snapshot", e))?;

        let mut out = Vec::new();
        let mut entry = MODULEENTRY32W {
            dwSize: std::mem::size_of::<MODULEENTRY32W>() as u32,
            ..Default::default()
        };

        unsafe {
            if Module32FirstW(snapshot, &mut entry).is_ok() {
                loop {
                    out.push(Module {
                        pid,
                        name: wide_to_string(&entry.szModule),
                        path: wide_to_string(&entry.szExePath),
                        base: entry.modBaseAddr as usize,
                        size: entry.modBaseSize as usize,
                    });
                    if Module32NextW(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);
        }

        Ok(out)
    }

    /// Find a module of `pid` by file name, case-insensitively. Fails with
    /// [`Error::ModuleNotFound`] when absent.
    pub fn with_name(pid: u32, name: &str) -> Result<Module> {
        Self::all_of(pid)?
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }

    /// Unload this module from the target by running `FreeLibrary` on a new
    /// remote thread and waiting for it to finish.
    ///
    /// Relies on kernel32 sharing a base address across processes, the same
    /// assumption load-library injection makes.
    pub fn eject(&self, process: &Process) -> Result<()> {
        let free_library = resolve_kernel32_export("FreeLibrary")?;
        let thread = process.create_thread(free_library, Some(self.base))?;
        thread.wait(None, false)?;
        info!(
            target: "revenant::module",
            "ejected module {} from pid {}", self.name, self.pid
        );
        Ok(())
    }
}

/// Address of a kernel32 export, valid in any process that maps kernel32 at
/// the shared system base.
pub(crate) fn resolve_kernel32_export(export: &str) -> Result<usize> {
    let kernel32 = unsafe { GetModuleHandleA(s!("kernel32.dll")) }
        .map_err(|e| Error::native_call("GetModuleHandleA", e))?;
    let c_name = std::ffi::CString::new(export)
        .map_err(|e| Error::Internal(format!("bad export name {export:?}: {e}")))?;
    let address = unsafe {
        GetProcAddress(
            kernel32,
            windows::core::PCSTR(c_name.as_ptr() as *const u8),
        )
    }
    .ok_or_else(|| Error::Internal(format!("kernel32 export {export} not found")))?;
    Ok(address as usize)
}

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_of_self_contains_kernel32() {
        let modules = Module::all_of(std::process::id()).unwrap();
        assert!(!modules.is_empty());
        assert!(modules
            .iter()
            .any(|m| m.name.eq_ignore_ascii_case("kernel32.dll")));
    }

    #[test]
    fn test_with_name_case_insensitive() {
        let module = Module::with_name(std::process::id(), "KERNEL32.DLL").unwrap();
        assert!(module.base != 0);
        assert!(module.size > 0);
    }

    #[test]
    fn test_with_name_missing() {
        let result = Module::with_name(std::process::id(), "no-such-module.dll");
        assert!(matches!(result, Err(Error::ModuleNotFound(_))));
    }

    #[test]
    fn test_resolve_kernel32_export() {
        let load_library = resolve_kernel32_export("LoadLibraryA").unwrap();
        assert_ne!(load_library, 0);
        assert!(resolve_kernel32_export("NoSuchExportHere").is_err());
    }
}
