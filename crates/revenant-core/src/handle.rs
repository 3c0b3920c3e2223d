//! Resource handle lifecycle
//!
//! Wraps a raw Win32 `HANDLE` with an explicit open/closed state. Every
//! accessor checks the state and fails with [`Error::HandleClosed`] once the
//! handle is closed, so no operation can race a stale OS handle value.

use revenant_common::{Error, Result};
use tracing::debug;
use windows::Win32::Foundation::{CloseHandle, HANDLE};

/// An owned OS handle to a process or thread resource.
///
/// Closing is explicit and idempotent only in the sense that a second
/// `close` fails with `HandleClosed` rather than touching the OS again.
/// Drop closes a still-open handle as a last resort.
#[derive(Debug)]
pub struct Handle {
    raw: HANDLE,
    open: bool,
}

// HANDLE is a plain kernel object reference, safe to move across threads.
unsafe impl Send for Handle {}

impl Handle {
    /// Take ownership of a raw handle obtained from an `Open*` call.
    pub fn new(raw: HANDLE) -> Self {
        Self { raw, open: true }
    }

    /// The raw handle value, guarded by the open state.
    pub fn value(&self) -> Result<HANDLE> {
        if !self.open {
            return Err(Error::HandleClosed);
        }
        Ok(self.raw)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Close the underlying OS handle. Fails with `HandleClosed` if already
    /// closed.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::HandleClosed);
        }
        self.open = false;
        unsafe { CloseHandle(self.raw) }.map_err(|e| Error::native_call("CloseHandle", e))
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = unsafe { CloseHandle(self.raw) } {
                debug!(target: "revenant::handle", "CloseHandle on drop failed: {e}");
            }
        }
    }
}
