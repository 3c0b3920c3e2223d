//! Process and thread access right masks
//!
//! Raw Win32 access masks kept as plain constants so handle opens can pass
//! any combination without going through a builder.

/// Process access rights (`PROCESS_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessAccess(pub u32);

impl ProcessAccess {
    pub const TERMINATE: ProcessAccess = ProcessAccess(0x0001);
    pub const CREATE_THREAD: ProcessAccess = ProcessAccess(0x0002);
    pub const VM_OPERATION: ProcessAccess = ProcessAccess(0x0008);
    pub const VM_READ: ProcessAccess = ProcessAccess(0x0010);
    pub const VM_WRITE: ProcessAccess = ProcessAccess(0x0020);
    pub const QUERY_INFORMATION: ProcessAccess = ProcessAccess(0x0400);
    pub const QUERY_LIMITED_INFORMATION: ProcessAccess = ProcessAccess(0x1000);
    pub const SUSPEND_RESUME: ProcessAccess = ProcessAccess(0x0800);
    pub const SYNCHRONIZE: ProcessAccess = ProcessAccess(0x0010_0000);
    pub const ALL_ACCESS: ProcessAccess = ProcessAccess(0x001F_FFFF);

    pub fn union(self, other: ProcessAccess) -> ProcessAccess {
        ProcessAccess(self.0 | other.0)
    }

    pub fn contains(self, other: ProcessAccess) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Thread access rights (`THREAD_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAccess(pub u32);

impl ThreadAccess {
    pub const TERMINATE: ThreadAccess = ThreadAccess(0x0001);
    pub const SUSPEND_RESUME: ThreadAccess = ThreadAccess(0x0002);
    pub const GET_CONTEXT: ThreadAccess = ThreadAccess(0x0008);
    pub const SET_CONTEXT: ThreadAccess = ThreadAccess(0x0010);
    pub const QUERY_INFORMATION: ThreadAccess = ThreadAccess(0x0040);
    pub const SET_INFORMATION: ThreadAccess = ThreadAccess(0x0020);
    pub const SYNCHRONIZE: ThreadAccess = ThreadAccess(0x0010_0000);
    pub const ALL_ACCESS: ThreadAccess = ThreadAccess(0x001F_FFFF);

    pub fn union(self, other: ThreadAccess) -> ThreadAccess {
        ThreadAccess(self.0 | other.0)
    }

    pub fn contains(self, other: ThreadAccess) -> bool {
        self.0 & other.0 == other.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_access_union() {
        let access = ProcessAccess::VM_READ.union(ProcessAccess::VM_WRITE);
        assert!(access.contains(ProcessAccess::VM_READ));
        assert!(access.contains(ProcessAccess::VM_WRITE));
        assert!(!access.contains(ProcessAccess::TERMINATE));
    }

    #[test]
    fn test_thread_access_union() {
        let access = ThreadAccess::GET_CONTEXT.union(ThreadAccess::SET_CONTEXT);
        assert!(access.contains(ThreadAccess::GET_CONTEXT));
        assert!(!access.contains(ThreadAccess::SUSPEND_RESUME));
    }

    #[test]
    fn test_all_access_covers_specific_rights() {
        assert!(ProcessAccess::ALL_ACCESS.contains(ProcessAccess::VM_OPERATION));
        assert!(ThreadAccess::ALL_ACCESS.contains(ThreadAccess::SUSPEND_RESUME));
    }
}
