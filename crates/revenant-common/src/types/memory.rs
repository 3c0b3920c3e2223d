//! Memory-related types

use serde::{Deserialize, Serialize};

/// Page protection constant, mirroring the Win32 `PAGE_*` flag values.
///
/// Kept as a raw bit pattern so callers can pass any combination the
/// platform accepts, including modifiers like `PAGE_GUARD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protection(pub u32);

impl Protection {
    pub const NOACCESS: Protection = Protection(0x01);
    pub const READONLY: Protection = Protection(0x02);
    pub const READWRITE: Protection = Protection(0x04);
    pub const WRITECOPY: Protection = Protection(0x08);
    pub const EXECUTE: Protection = Protection(0x10);
    pub const EXECUTE_READ: Protection = Protection(0x20);
    pub const EXECUTE_READWRITE: Protection = Protection(0x40);
    pub const EXECUTE_WRITECOPY: Protection = Protection(0x80);
    pub const GUARD: Protection = Protection(0x100);
    pub const NOCACHE: Protection = Protection(0x200);

    pub fn is_readable(&self) -> bool {
        self.0
            & (Self::READONLY.0
                | Self::READWRITE.0
                | Self::WRITECOPY.0
                | Self::EXECUTE_READ.0
                | Self::EXECUTE_READWRITE.0
                | Self::EXECUTE_WRITECOPY.0)
            != 0
    }

    pub fn is_writable(&self) -> bool {
        self.0
            & (Self::READWRITE.0
                | Self::WRITECOPY.0
                | Self::EXECUTE_READWRITE.0
                | Self::EXECUTE_WRITECOPY.0)
            != 0
    }

    pub fn is_executable(&self) -> bool {
        self.0
            & (Self::EXECUTE.0
                | Self::EXECUTE_READ.0
                | Self::EXECUTE_READWRITE.0
                | Self::EXECUTE_WRITECOPY.0)
            != 0
    }

    pub fn is_guarded(&self) -> bool {
        self.0 & Self::GUARD.0 != 0
    }
}

/// How a virtual allocation is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationKind {
    /// Reserve address space without backing pages (`MEM_RESERVE`)
    Reserve,
    /// Commit backing pages (`MEM_COMMIT`)
    Commit,
    /// Reserve and commit in one call
    ReserveCommit,
}

impl AllocationKind {
    pub fn bits(&self) -> u32 {
        const MEM_COMMIT: u32 = 0x1000;
        const MEM_RESERVE: u32 = 0x2000;
        match self {
            AllocationKind::Reserve => MEM_RESERVE,
            AllocationKind::Commit => MEM_COMMIT,
            AllocationKind::ReserveCommit => MEM_RESERVE | MEM_COMMIT,
        }
    }
}

/// How a virtual allocation is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FreeKind {
    /// Release the entire reservation (`MEM_RELEASE`)
    Release,
    /// Decommit pages but keep the reservation (`MEM_DECOMMIT`)
    Decommit,
}

impl FreeKind {
    pub fn bits(&self) -> u32 {
        const MEM_DECOMMIT: u32 = 0x4000;
        const MEM_RELEASE: u32 = 0x8000;
        match self {
            FreeKind::Release => MEM_RELEASE,
            FreeKind::Decommit => MEM_DECOMMIT,
        }
    }
}

/// Commitment state of a queried region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryState {
    Commit,
    Reserve,
    Free,
}

impl MemoryState {
    pub fn from_bits(state: u32) -> Self {
        const MEM_COMMIT: u32 = 0x1000;
        const MEM_RESERVE: u32 = 0x2000;
        match state {
            MEM_COMMIT => MemoryState::Commit,
            MEM_RESERVE => MemoryState::Reserve,
            _ => MemoryState::Free,
        }
    }
}

/// Backing kind of a queried region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryKind {
    Image,
    Mapped,
    Private,
    Unknown,
}

impl MemoryKind {
    pub fn from_bits(kind: u32) -> Self {
        const MEM_IMAGE: u32 = 0x0100_0000;
        const MEM_MAPPED: u32 = 0x0004_0000;
        const MEM_PRIVATE: u32 = 0x0002_0000;
        match kind {
            MEM_IMAGE => MemoryKind::Image,
            MEM_MAPPED => MemoryKind::Mapped,
            MEM_PRIVATE => MemoryKind::Private,
            _ => MemoryKind::Unknown,
        }
    }
}

/// Snapshot of a single virtual memory region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionInfo {
    pub base: usize,
    pub allocation_base: usize,
    pub size: usize,
    pub protection: Protection,
    pub state: MemoryState,
    pub kind: MemoryKind,
}

impl RegionInfo {
    /// Whether a scan can safely read this region.
    pub fn is_scannable(&self) -> bool {
        self.state == MemoryState::Commit
            && self.protection.is_readable()
            && !self.protection.is_guarded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_readonly() {
        let prot = Protection::READONLY;
        assert!(prot.is_readable());
        assert!(!prot.is_writable());
        assert!(!prot.is_executable());
    }

    #[test]
    fn test_protection_execute_readwrite() {
        let prot = Protection::EXECUTE_READWRITE;
        assert!(prot.is_readable());
        assert!(prot.is_writable());
        assert!(prot.is_executable());
    }

    #[test]
    fn test_protection_noaccess() {
        let prot = Protection::NOACCESS;
        assert!(!prot.is_readable());
        assert!(!prot.is_writable());
        assert!(!prot.is_executable());
    }

    #[test]
    fn test_protection_guard_modifier() {
        let prot = Protection(Protection::READWRITE.0 | Protection::GUARD.0);
        assert!(prot.is_readable());
        assert!(prot.is_guarded());
    }

    #[test]
    fn test_allocation_kind_bits() {
        assert_eq!(AllocationKind::Commit.bits(), 0x1000);
        assert_eq!(AllocationKind::Reserve.bits(), 0x2000);
        assert_eq!(AllocationKind::ReserveCommit.bits(), 0x3000);
    }

    #[test]
    fn test_free_kind_bits() {
        assert_eq!(FreeKind::Release.bits(), 0x8000);
        assert_eq!(FreeKind::Decommit.bits(), 0x4000);
    }

    #[test]
    fn test_memory_state_from_bits() {
        assert_eq!(MemoryState::from_bits(0x1000), MemoryState::Commit);
        assert_eq!(MemoryState::from_bits(0x2000), MemoryState::Reserve);
        assert_eq!(MemoryState::from_bits(0x10000), MemoryState::Free);
    }

    #[test]
    fn test_memory_kind_from_bits() {
        assert_eq!(MemoryKind::from_bits(0x0100_0000), MemoryKind::Image);
        assert_eq!(MemoryKind::from_bits(0x0004_0000), MemoryKind::Mapped);
        assert_eq!(MemoryKind::from_bits(0x0002_0000), MemoryKind::Private);
        assert_eq!(MemoryKind::from_bits(0), MemoryKind::Unknown);
    }

    #[test]
    fn test_region_scannable() {
        let region = RegionInfo {
            base: 0x1000,
            allocation_base: 0x1000,
            size: 0x2000,
            protection: Protection::READWRITE,
            state: MemoryState::Commit,
            kind: MemoryKind::Private,
        };
        assert!(region.is_scannable());

        let guarded = RegionInfo {
            protection: Protection(Protection::READWRITE.0 | Protection::GUARD.0),
            ..region.clone()
        };
        assert!(!guarded.is_scannable());

        let free = RegionInfo {
            state: MemoryState::Free,
            ..region
        };
        assert!(!free.is_scannable());
    }
}
