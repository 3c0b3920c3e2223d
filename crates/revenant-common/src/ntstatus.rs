//! Static NTSTATUS catalog
//!
//! Maps numeric status codes to their symbolic names and human-readable
//! descriptions. The table is embedded at compile time and materialized once
//! into an immutable lookup map on first use; it is never mutated afterwards.
//! A handful of codes carry more than one registered description; the
//! deterministic default is the first entry in registration order.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Which of the registered descriptions is the default.
const DEFAULT_DESCRIPTION_CHOICE: usize = 0;

/// (code, symbolic name, description) in registration order.
static STATUS_TABLE: &[(u32, &str, &str)] = &[
    (0x0000_0000, "STATUS_SUCCESS", "The operation completed successfully"),
    (0x0000_0102, "STATUS_TIMEOUT", "The given timeout interval expired"),
    (0x0000_0103, "STATUS_PENDING", "The operation that was requested is pending completion"),
    (0x4000_000D, "STATUS_PARTIAL_COPY", "Not all bytes could be copied because part of the range was inaccessible"),
    (0x8000_0005, "STATUS_BUFFER_OVERFLOW", "The data was too large to fit into the specified buffer"),
    (0x8000_0005, "STATUS_BUFFER_OVERFLOW", "Warning status; output data was truncated to the buffer size"),
    (0xC000_0004, "STATUS_INFO_LENGTH_MISMATCH", "The specified information record length does not match the length that is required"),
    (0xC000_0005, "STATUS_ACCESS_VIOLATION", "The instruction referenced memory it does not have access to (access violation)"),
    (0xC000_0008, "STATUS_INVALID_HANDLE", "An invalid HANDLE was specified"),
    (0xC000_000D, "STATUS_INVALID_PARAMETER", "An invalid parameter was passed to a service or function"),
    (0xC000_0017, "STATUS_NO_MEMORY", "Not enough virtual memory or paging file quota is available to complete the specified operation"),
    (0xC000_0018, "STATUS_CONFLICTING_ADDRESSES", "The specified address range conflicts with the address space"),
    (0xC000_001C, "STATUS_INVALID_SYSTEM_SERVICE", "An invalid system service was specified in a system service call"),
    (0xC000_0022, "STATUS_ACCESS_DENIED", "A process has requested access to an object, but has not been granted those access rights"),
    (0xC000_0023, "STATUS_BUFFER_TOO_SMALL", "The buffer is too small to contain the entry"),
    (0xC000_002C, "STATUS_UNABLE_TO_FREE_VM", "An attempt was made to free virtual memory that is not allocated"),
    (0xC000_0034, "STATUS_OBJECT_NAME_NOT_FOUND", "The object name is not found"),
    (0xC000_0041, "STATUS_PORT_CONNECTION_REFUSED", "The NtConnectPort request is refused"),
    (0xC000_0043, "STATUS_SHARING_VIOLATION", "A file cannot be opened because the share access flags are incompatible"),
    (0xC000_0045, "STATUS_INVALID_PAGE_PROTECTION", "The specified page protection was not valid"),
    (0xC000_005C, "STATUS_NO_SUCH_THREAD", "The specified thread does not exist"),
    (0xC000_007A, "STATUS_PROCEDURE_NOT_FOUND", "The specified procedure address cannot be found in the DLL"),
    (0xC000_00B5, "STATUS_IO_TIMEOUT", "The specified I/O operation was not completed before the time-out period expired"),
    (0xC000_010A, "STATUS_PROCESS_IS_TERMINATING", "An attempt was made to access an exiting process"),
    (0xC000_0120, "STATUS_CANCELLED", "The I/O request was canceled"),
    (0xC000_0121, "STATUS_CANNOT_DELETE", "An attempt has been made to remove a file or directory that cannot be deleted"),
    (0xC000_012A, "STATUS_THREAD_IS_TERMINATING", "An attempt was made to access an exiting thread"),
    (0xC000_0135, "STATUS_DLL_NOT_FOUND", "The code execution cannot proceed because a required DLL was not found"),
    (0xC000_0139, "STATUS_ENTRYPOINT_NOT_FOUND", "The procedure entry point could not be located in the DLL"),
    (0xC000_0142, "STATUS_DLL_INIT_FAILED", "Initialization of the dynamic link library failed; the process is terminating abnormally"),
    (0xC000_01C4, "STATUS_VDM_DISALLOWED", "The operation is disallowed by policy"),
    (0xC000_0225, "STATUS_NOT_FOUND", "The object was not found"),
];

static CATALOG: Lazy<HashMap<u32, Vec<(&'static str, &'static str)>>> = Lazy::new(|| {
    let mut map: HashMap<u32, Vec<(&'static str, &'static str)>> = HashMap::new();
    for &(code, name, description) in STATUS_TABLE {
        map.entry(code).or_default().push((name, description));
    }
    map
});

/// Default description for `code`, if registered.
pub fn describe(code: u32) -> Option<&'static str> {
    CATALOG
        .get(&code)
        .and_then(|entries| entries.get(DEFAULT_DESCRIPTION_CHOICE))
        .map(|&(_, description)| description)
}

/// All registered descriptions for `code`, in registration order.
pub fn descriptions(code: u32) -> Vec<&'static str> {
    CATALOG
        .get(&code)
        .map(|entries| entries.iter().map(|&(_, d)| d).collect())
        .unwrap_or_default()
}

/// Symbolic name for `code`, if registered.
pub fn name(code: u32) -> Option<&'static str> {
    CATALOG
        .get(&code)
        .and_then(|entries| entries.first())
        .map(|&(name, _)| name)
}

/// NT convention: severity bits below `0xC0000000` are success or warning.
pub fn is_success(status: i32) -> bool {
    status >= 0
}
