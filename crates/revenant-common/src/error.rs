//! Error types for revenant
//!
//! Failures fall into a small taxonomy: operations on closed handles,
//! Win32 calls that signalled failure through `GetLastError`, kernel calls
//! that returned an NTSTATUS, and by-name lookups that produced no match.
//! "Not found" results from pattern matching and memory scanning are `Ok`
//! values, never errors.

use thiserror::Error;

use crate::ntstatus;

#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted on a handle that was already closed (or never opened).
    #[error("handle is closed")]
    HandleClosed,

    /// A Win32 primitive reported failure; carries the `GetLastError` code
    /// and the system-formatted description.
    #[error("{function} failed with code {code:#x}: {message}")]
    NativeCall {
        function: &'static str,
        code: u32,
        message: String,
    },

    /// A kernel call returned a failing NTSTATUS.
    #[error("[NTSTATUS {code:#x}] {message}")]
    StatusCode { code: u32, message: String },

    #[error("process not found: {0}")]
    ProcessNotFound(String),

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// Pattern text contained no usable nibbles after stripping.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a `StatusCode` error, resolving the description through the
    /// static NTSTATUS catalog. Unknown codes get a generic message.
    pub fn status_code(code: u32) -> Self {
        let message = ntstatus::describe(code)
            .unwrap_or("unrecognized status code")
            .to_string();
        Error::StatusCode { code, message }
    }

    /// Capture the calling thread's last Win32 error for `function`.
    #[cfg(windows)]
    pub fn from_last_error(function: &'static str) -> Self {
        let err = windows::core::Error::from_win32();
        Error::NativeCall {
            function,
            code: err.code().0 as u32,
            message: err.message(),
        }
    }

    /// Wrap an error returned by a `windows` crate call.
    #[cfg(windows)]
    pub fn native_call(function: &'static str, err: windows::core::Error) -> Self {
        Error::NativeCall {
            function,
            code: err.code().0 as u32,
            message: err.message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_closed_display() {
        let msg = format!("{}", Error::HandleClosed);
        assert_eq!(msg, "handle is closed");
    }

    #[test]
    fn test_native_call_display() {
        let err = Error::NativeCall {
            function: "OpenProcess",
            code: 5,
            message: "Access is denied".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("OpenProcess"));
        assert!(msg.contains("0x5"));
        assert!(msg.contains("Access is denied"));
    }

    #[test]
    fn test_status_code_uses_catalog() {
        let err = Error::status_code(0xC000_0005);
        let msg = format!("{}", err);
        assert!(msg.contains("0xc0000005"));
        assert!(msg.to_lowercase().contains("access violation"));
    }

    #[test]
    fn test_status_code_unknown() {
        let err = Error::status_code(0xDEAD_BEEF);
        let msg = format!("{}", err);
        assert!(msg.contains("unrecognized status code"));
    }

    #[test]
    fn test_process_not_found_display() {
        let msg = format!("{}", Error::ProcessNotFound("notepad.exe".into()));
        assert!(msg.contains("notepad.exe"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_err() -> Result<()> {
            Err(Error::HandleClosed)
        }
        assert!(matches!(returns_err(), Err(Error::HandleClosed)));
    }
}
