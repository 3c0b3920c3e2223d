//! Remote memory access and scanning
//!
//! [`Memory`] is a borrowed view over an attached process's virtual address
//! space: read, write, allocate, protect, query, and pattern scan. All
//! addresses are target-process-relative integers and are never dereferenced
//! locally. [`MemoryArea`] narrows the view to one allocation with
//! bounds-checked relative offsets.

use crate::pattern::Pattern;
use crate::process::Process;
use revenant_common::{AllocationKind, Error, FreeKind, Protection, RegionInfo, Result};
use tracing::{debug, trace};
use std::ffi::c_void;
use windows::Win32::System::Diagnostics::Debug::{ReadProcessMemory, WriteProcessMemory};
use windows::Win32::System::Memory::{
    VirtualAllocEx, VirtualFreeEx, VirtualProtectEx, VirtualQueryEx, MEMORY_BASIC_INFORMATION,
    PAGE_PROTECTION_FLAGS, VIRTUAL_ALLOCATION_TYPE, VIRTUAL_FREE_TYPE,
};

/// Borrowed view over an attached process's address space.
#[derive(Debug, Clone, Copy)]
pub struct Memory<'p> {
    process: &'p Process,
}

impl<'p> Memory<'p> {
    pub(crate) fn new(process: &'p Process) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &'p Process {
        self.process
    }

    /// Read `size` bytes at `address`. Short reads are surfaced as errors.
    pub fn read(&self, address: usize, size: usize) -> Result<Vec<u8>> {
        let handle = self.process.handle().value()?;
        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0usize;
        unsafe {
            ReadProcessMemory(
                handle,
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                size,
                Some(&mut bytes_read),
            )
        }
        .map_err(|e| Error::native_call("ReadProcessMemory", e))?;
        if bytes_read != size {
            return Err(Error::Internal(format!(
                "short read at {address:#x}: {bytes_read} of {size} bytes"
            )));
        }
        Ok(buffer)
    }

    /// Write `data` at `address`. Short writes are surfaced as errors.
    pub fn write(&self, address: usize, data: &[u8]) -> Result<()> {
        let handle = self.process.handle().value()?;
        let mut bytes_written = 0usize;
        unsafe {
            WriteProcessMemory(
                handle,
                address as *const c_void,
                data.as_ptr() as *const c_void,
                data.len(),
                Some(&mut bytes_written),
            )
        }
        .map_err(|e| Error::native_call("WriteProcessMemory", e))?;
        if bytes_written != data.len() {
            return Err(Error::Internal(format!(
                "short write at {address:#x}: {bytes_written} of {} bytes",
                data.len()
            )));
        }
        Ok(())
    }

    /// Allocate `size` bytes in the target, optionally at a preferred
    /// `address`, returning the base of the allocation.
    pub fn allocate(
        &self,
        address: Option<usize>,
        size: usize,
        kind: AllocationKind,
        protection: Protection,
    ) -> Result<usize> {
        let handle = self.process.handle().value()?;
        let base = unsafe {
            VirtualAllocEx(
                handle,
                address.map(|a| a as *const c_void),
                size,
                VIRTUAL_ALLOCATION_TYPE(kind.bits()),
                PAGE_PROTECTION_FLAGS(protection.0),
            )
        };
        if base.is_null() {
            return Err(Error::from_last_error("VirtualAllocEx"));
        }
        debug!(
            target: "revenant::memory",
            "allocated {size:#x} bytes at {:#x} in pid {}",
            base as usize,
            self.process.pid()
        );
        Ok(base as usize)
    }

    /// Allocate and wrap the result as an owned-by-the-target [`MemoryArea`].
    pub fn allocate_area(
        &self,
        address: Option<usize>,
        size: usize,
        kind: AllocationKind,
        protection: Protection,
    ) -> Result<MemoryArea<'p>> {
        let base = self.allocate(address, size, kind, protection)?;
        Ok(MemoryArea {
            memory: *self,
            base,
            size,
        })
    }

    /// Free a prior allocation. `Release` must free the whole reservation,
    /// so the size passed to the OS is zero in that case.
    pub fn free(&self, address: usize, size: usize, kind: FreeKind) -> Result<()> {
        let handle = self.process.handle().value()?;
        let size = match kind {
            FreeKind::Release => 0,
            FreeKind::Decommit => size,
        };
        unsafe {
            VirtualFreeEx(
                handle,
                address as *mut c_void,
                size,
                VIRTUAL_FREE_TYPE(kind.bits()),
            )
        }
        .map_err(|e| Error::native_call("VirtualFreeEx", e))
    }

    /// Change page protection on `[address, address + size)`, returning the
    /// protection in effect immediately prior to the call.
    pub fn protect(&self, address: usize, size: usize, protection: Protection) -> Result<Protection> {
        let handle = self.process.handle().value()?;
        let mut old = PAGE_PROTECTION_FLAGS(0);
        unsafe {
            VirtualProtectEx(
                handle,
                address as *const c_void,
                size,
                PAGE_PROTECTION_FLAGS(protection.0),
                &mut old,
            )
        }
        .map_err(|e| Error::native_call("VirtualProtectEx", e))?;
        Ok(Protection(old.0))
    }

    /// Query the region containing `address`.
    pub fn query(&self, address: usize) -> Result<RegionInfo> {
        let handle = self.process.handle().value()?;
        let mut info = MEMORY_BASIC_INFORMATION::default();
        let written = unsafe {
            VirtualQueryEx(
                handle,
                Some(address as *const c_void),
                &mut info,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 {
            return Err(Error::from_last_error("VirtualQueryEx"));
        }
        Ok(RegionInfo {
            base: info.BaseAddress as usize,
            allocation_base: info.AllocationBase as usize,
            size: info.RegionSize,
            protection: Protection(info.Protect.0),
            state: revenant_common::MemoryState::from_bits(info.State.0),
            kind: revenant_common::MemoryKind::from_bits(info.Type.0),
        })
    }

    /// Scan `[start_address, start_address + span)` for the first occurrence
    /// of `pattern`, walking the region map. Uncommitted and no-access
    /// regions are skipped; everything else is temporarily reprotected to
    /// execute-read-write, read, and restored before the walk continues.
    /// Returns the absolute address of the match, or `None`.
    ///
    /// The cursor always advances by the full region size, including on
    /// skips and failed reads, so an unscannable region can never stall the
    /// walk.
    pub fn scan(&self, pattern: &Pattern, start_address: usize, span: usize) -> Result<Option<usize>> {
        let end = start_address.saturating_add(span);
        let mut cursor = start_address;

        while cursor < end {
            let region = self.query(cursor)?;
            let region_end = region.base.saturating_add(region.size);

            if region.state != revenant_common::MemoryState::Commit
                || region.protection == Protection::NOACCESS
            {
                trace!(
                    target: "revenant::memory",
                    "skipping region {:#x}..{:#x} (state {:?}, prot {:#x})",
                    region.base,
                    region_end,
                    region.state,
                    region.protection.0
                );
                cursor = region_end;
                continue;
            }

            if let Some(offset) = self.scan_region(pattern, &region, cursor, end)? {
                return Ok(Some(offset));
            }
            cursor = region_end;
        }

        Ok(None)
    }

    // One region of the scan walk: reprotect, read, restore, match. The
    // original protection is restored on every exit path including read
    // failure. Image- and mapping-backed regions refuse PAGE_EXECUTE_READWRITE;
    // when they are already readable the region is read as-is instead of
    // being skipped. A read that still fails is logged and treated as no
    // match, never as a scan abort.
    fn scan_region(
        &self,
        pattern: &Pattern,
        region: &RegionInfo,
        cursor: usize,
        end: usize,
    ) -> Result<Option<usize>> {
        let region_end = region.base.saturating_add(region.size);
        let chunk_len = region_end.min(end) - cursor;

        let previous = match self.protect(region.base, region.size, Protection::EXECUTE_READWRITE) {
            Ok(previous) => Some(previous),
            Err(e) if region.is_scannable() => {
                trace!(
                    target: "revenant::memory",
                    "cannot reprotect region {:#x} for scan, reading as-is: {e}", region.base
                );
                None
            }
            Err(e) => {
                debug!(
                    target: "revenant::memory",
                    "cannot reprotect unreadable region {:#x} for scan: {e}", region.base
                );
                return Ok(None);
            }
        };

        let read_result = self.read(cursor, chunk_len);
        if let Some(previous) = previous {
            if let Err(e) = self.protect(region.base, region.size, previous) {
                debug!(
                    target: "revenant::memory",
                    "restoring protection {:#x} on region {:#x} failed: {e}",
                    previous.0,
                    region.base
                );
            }
        }

        match read_result {
            Ok(buffer) => Ok(pattern.find_first(&buffer).map(|offset| cursor + offset)),
            Err(e) => {
                debug!(
                    target: "revenant::memory",
                    "scan read failed at {cursor:#x}: {e}"
                );
                Ok(None)
            }
        }
    }
}

/// A bounds-checked window over one allocation in the target.
///
/// The area does not own the target allocation: freeing it, or the target
/// releasing it, leaves the area dangling, and further accesses surface OS
/// errors rather than panics.
#[derive(Debug, Clone, Copy)]
pub struct MemoryArea<'p> {
    memory: Memory<'p>,
    base: usize,
    size: usize,
}

impl<'p> MemoryArea<'p> {
    /// Wrap an existing target allocation.
    pub fn new(memory: Memory<'p>, base: usize, size: usize) -> Self {
        Self { memory, base, size }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn check_bounds(&self, offset: usize, len: usize) -> Result<()> {
        if offset.saturating_add(len) > self.size {
            return Err(Error::Internal(format!(
                "range {offset:#x}+{len:#x} out of bounds for area of {:#x} bytes",
                self.size
            )));
        }
        Ok(())
    }

    /// Read `len` bytes at `offset` relative to the area base.
    pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.check_bounds(offset, len)?;
        self.memory.read(self.base + offset, len)
    }

    /// Read the entire area.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.memory.read(self.base, self.size)
    }

    /// Write `data` at `offset` relative to the area base.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_bounds(offset, data.len())?;
        self.memory.write(self.base + offset, data)
    }

    /// Change protection of the whole area, returning the prior protection.
    pub fn protect(&self, protection: Protection) -> Result<Protection> {
        self.memory.protect(self.base, self.size, protection)
    }

    /// Find `pattern` within the area, returning its absolute address.
    pub fn scan(&self, pattern: &Pattern) -> Result<Option<usize>> {
        let buffer = self.read_all()?;
        Ok(pattern.find_first(&buffer).map(|offset| self.base + offset))
    }

    /// Free the underlying allocation. The area is dangling afterwards.
    pub fn free(&self, kind: FreeKind) -> Result<()> {
        self.memory.free(self.base, self.size, kind)
    }
}
