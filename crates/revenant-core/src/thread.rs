//! Thread enumeration and execution control
//!
//! Open handles to schedulable units inside the target: suspend/resume with
//! checked return codes, CPU context capture and write-back, waiting, and
//! the hijack state machine that redirects a running thread's instruction
//! pointer. Every failure path during a hijack resumes the thread before
//! the error surfaces, so the target is never left suspended by accident.

use crate::handle::Handle;
use revenant_common::{ntstatus, Error, Result, ThreadAccess};
use std::ffi::c_void;
use std::time::Duration;
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{
    CloseHandle, HANDLE, WAIT_FAILED, WAIT_IO_COMPLETION, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows::Win32::System::Diagnostics::Debug::{
    GetThreadContext, SetThreadContext, CONTEXT, CONTEXT_FULL_AMD64,
};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Thread32First, Thread32Next, TH32CS_SNAPTHREAD, THREADENTRY32,
};
use windows::Win32::System::Threading::{
    GetExitCodeThread, GetThreadPriority, OpenThread, ResumeThread, SetThreadPriority,
    SuspendThread, TerminateThread, WaitForSingleObjectEx, INFINITE, THREAD_ACCESS_RIGHTS,
    THREAD_PRIORITY,
};

// GetThreadPriority's documented failure sentinel.
const THREAD_PRIORITY_ERROR_RETURN: i32 = 0x7FFF_FFFF;

// THREADINFOCLASS value for ThreadQuerySetWin32StartAddress.
const THREAD_QUERY_SET_WIN32_START_ADDRESS: u32 = 9;

// The thread start address has no Win32 surface; NtQueryInformationThread
// returns an NTSTATUS, not the boolean-success convention.
#[link(name = "ntdll")]
extern "system" {
    fn NtQueryInformationThread(
        thread: HANDLE,
        class: u32,
        info: *mut c_void,
        info_len: u32,
        return_len: *mut u32,
    ) -> i32;
}

/// One row from a thread snapshot.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub tid: u32,
    pub owner_pid: u32,
    pub base_priority: i32,
}

/// Outcome of waiting on a thread handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The thread terminated.
    Signaled,
    /// The timeout elapsed first.
    TimedOut,
    /// An APC interrupted an alertable wait.
    Interrupted,
}

/// Captured CPU state of a suspended thread (x64).
///
/// Only the instruction pointer is exposed for mutation; the rest of the
/// register file is carried through write-back untouched.
#[derive(Clone)]
pub struct ExecutionContext {
    raw: CONTEXT,
}

impl ExecutionContext {
    fn from_raw(raw: CONTEXT) -> Self {
        Self { raw }
    }

    pub fn instruction_pointer(&self) -> usize {
        self.raw.Rip as usize
    }

    pub fn set_instruction_pointer(&mut self, address: usize) {
        self.raw.Rip = address as u64;
    }

    pub fn stack_pointer(&self) -> usize {
        self.raw.Rsp as usize
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("rip", &format_args!("{:#x}", self.raw.Rip))
            .field("rsp", &format_args!("{:#x}", self.raw.Rsp))
            .finish_non_exhaustive()
    }
}

/// An open handle to a thread in the target.
#[derive(Debug)]
pub struct Thread {
    tid: u32,
    handle: Handle,
}

impl Thread {
    /// Open the thread identified by `tid` with the given access rights.
    /// `inheritable` controls whether child processes inherit the handle.
    pub fn open(tid: u32, access: ThreadAccess, inheritable: bool) -> Result<Thread> {
        let raw = unsafe { OpenThread(THREAD_ACCESS_RIGHTS(access.0), inheritable, tid) }
            .map_err(|e| Error::native_call("OpenThread", e))?;
        Ok(Thread {
            tid,
            handle: Handle::new(raw),
        })
    }

    pub(crate) fn from_parts(tid: u32, handle: Handle) -> Thread {
        Thread { tid, handle }
    }

    /// Snapshot every thread on the system.
    pub fn all() -> Result<Vec<ThreadInfo>> {
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) }
            .map_err(|e| Error::native_call("CreateToolhelp32Snapshot", e))?;

        let mut out = Vec::new();
        let mut entry = THREADENTRY32 {
            dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
            ..Default::default()
        };

        unsafe {
            if Thread32First(snapshot, &mut entry).is_ok() {
                loop {
                    out.push(ThreadInfo {
                        tid: entry.th32ThreadID,
                        owner_pid: entry.th32OwnerProcessID,
                        base_priority: entry.tpBasePri,
                    });
                    if Thread32Next(snapshot, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snapshot);
        }

        Ok(out)
    }

    /// All threads owned by `pid`, in snapshot order.
    pub fn all_of(pid: u32) -> Result<Vec<ThreadInfo>> {
        Ok(Self::all()?
            .into_iter()
            .filter(|t| t.owner_pid == pid)
            .collect())
    }

    /// The first enumerated thread of `pid`, conventionally the main thread.
    pub fn main_of(pid: u32, access: ThreadAccess) -> Result<Thread> {
        let info = Self::all_of(pid)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProcessNotFound(format!("no threads for pid {pid}")))?;
        Self::open(info.tid, access, false)
    }

    pub fn tid(&self) -> u32 {
        self.tid
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Suspend the thread, returning its previous suspend count.
    pub fn suspend(&self) -> Result<u32> {
        let handle = self.handle.value()?;
        let previous = unsafe { SuspendThread(handle) };
        if previous == u32::MAX {
            return Err(Error::from_last_error("SuspendThread"));
        }
        Ok(previous)
    }

    /// Resume the thread, returning its previous suspend count.
    pub fn resume(&self) -> Result<u32> {
        let handle = self.handle.value()?;
        let previous = unsafe { ResumeThread(handle) };
        if previous == u32::MAX {
            return Err(Error::from_last_error("ResumeThread"));
        }
        Ok(previous)
    }

    /// Terminate the thread with `exit_code`.
    pub fn terminate(&self, exit_code: u32) -> Result<()> {
        let handle = self.handle.value()?;
        warn!(target: "revenant::thread", "terminating thread {} with code {exit_code}", self.tid);
        unsafe { TerminateThread(handle, exit_code) }
            .map_err(|e| Error::native_call("TerminateThread", e))
    }

    /// Capture the thread's CPU context. The thread should be suspended
    /// first or the snapshot is immediately stale.
    pub fn context(&self) -> Result<ExecutionContext> {
        let handle = self.handle.value()?;
        let mut raw = CONTEXT {
            ContextFlags: CONTEXT_FULL_AMD64,
            ..Default::default()
        };
        unsafe { GetThreadContext(handle, &mut raw) }
            .map_err(|e| Error::native_call("GetThreadContext", e))?;
        Ok(ExecutionContext::from_raw(raw))
    }

    /// Write a CPU context back to the thread.
    pub fn set_context(&self, context: &ExecutionContext) -> Result<()> {
        let handle = self.handle.value()?;
        unsafe { SetThreadContext(handle, &context.raw) }
            .map_err(|e| Error::native_call("SetThreadContext", e))
    }

    /// Redirect the thread to start executing at `address`.
    ///
    /// State machine: suspend, capture context, rewrite the instruction
    /// pointer, write the context back, resume. If capture or write-back
    /// fails, the thread is resumed before the error propagates.
    pub fn hijack(&self, address: usize) -> Result<()> {
        self.suspend()?;

        let mut context = match self.context() {
            Ok(context) => context,
            Err(e) => {
                self.resume_best_effort();
                return Err(e);
            }
        };

        let old_ip = context.instruction_pointer();
        context.set_instruction_pointer(address);

        if let Err(e) = self.set_context(&context) {
            self.resume_best_effort();
            return Err(e);
        }

        self.resume()?;
        info!(
            target: "revenant::thread",
            "hijacked thread {}: rip {old_ip:#x} -> {address:#x}", self.tid
        );
        Ok(())
    }

    fn resume_best_effort(&self) {
        if let Err(e) = self.resume() {
            debug!(
                target: "revenant::thread",
                "resume after failed hijack on thread {} failed: {e}", self.tid
            );
        }
    }

    /// Address the thread started executing at (its Win32 start routine).
    pub fn start_address(&self) -> Result<usize> {
        let handle = self.handle.value()?;
        let mut address = 0usize;
        let status = unsafe {
            NtQueryInformationThread(
                handle,
                THREAD_QUERY_SET_WIN32_START_ADDRESS,
                &mut address as *mut usize as *mut c_void,
                std::mem::size_of::<usize>() as u32,
                std::ptr::null_mut(),
            )
        };
        if !ntstatus::is_success(status) {
            return Err(Error::status_code(status as u32));
        }
        Ok(address)
    }

    /// Scheduling priority of the thread.
    pub fn priority(&self) -> Result<i32> {
        let handle = self.handle.value()?;
        let priority = unsafe { GetThreadPriority(handle) };
        if priority == THREAD_PRIORITY_ERROR_RETURN {
            return Err(Error::from_last_error("GetThreadPriority"));
        }
        Ok(priority)
    }

    pub fn set_priority(&self, priority: i32) -> Result<()> {
        let handle = self.handle.value()?;
        unsafe { SetThreadPriority(handle, THREAD_PRIORITY(priority)) }
            .map_err(|e| Error::native_call("SetThreadPriority", e))
    }

    /// Wait for the thread to terminate. `timeout` of `None` waits forever.
    pub fn wait(&self, timeout: Option<Duration>, alertable: bool) -> Result<WaitOutcome> {
        let handle = self.handle.value()?;
        let millis = timeout.map_or(INFINITE, |t| t.as_millis().min(u32::MAX as u128) as u32);
        let event = unsafe { WaitForSingleObjectEx(handle, millis, alertable) };
        match event {
            e if e == WAIT_OBJECT_0 => Ok(WaitOutcome::Signaled),
            e if e == WAIT_TIMEOUT => Ok(WaitOutcome::TimedOut),
            e if e == WAIT_IO_COMPLETION => Ok(WaitOutcome::Interrupted),
            e if e == WAIT_FAILED => Err(Error::from_last_error("WaitForSingleObjectEx")),
            other => Err(Error::Internal(format!(
                "unexpected wait result {:#x}",
                other.0
            ))),
        }
    }

    /// Exit code of a terminated thread, or `None` while it is still
    /// running (the OS reports STILL_ACTIVE in that case).
    pub fn exit_code(&self) -> Result<Option<u32>> {
        const STILL_ACTIVE: u32 = 259;
        let handle = self.handle.value()?;
        let mut code = 0u32;
        unsafe { GetExitCodeThread(handle, &mut code) }
            .map_err(|e| Error::native_call("GetExitCodeThread", e))?;
        Ok((code != STILL_ACTIVE).then_some(code))
    }

    /// Close the thread handle. Subsequent operations fail with
    /// `HandleClosed`.
    pub fn close(&mut self) -> Result<()> {
        self.handle.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use windows::Win32::System::Threading::GetCurrentThreadId;

    // Spawns a spin-looping thread and returns its OS thread id plus the
    // stop flag and join handle.
    fn spawn_spinner() -> (u32, Arc<AtomicBool>, std::thread::JoinHandle<()>) {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let (tx, rx) = mpsc::channel();
        let joiner = std::thread::spawn(move || {
            tx.send(unsafe { GetCurrentThreadId() }).unwrap();
            while !stop_clone.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        });
        let tid = rx.recv().unwrap();
        (tid, stop, joiner)
    }

    #[test]
    fn test_all_of_contains_current_thread() {
        let current = unsafe { GetCurrentThreadId() };
        let threads = Thread::all_of(std::process::id()).unwrap();
        assert!(threads.iter().any(|t| t.tid == current));
    }

    #[test]
    fn test_suspend_resume_counts() {
        let (tid, stop, joiner) = spawn_spinner();
        let thread = Thread::open(tid, ThreadAccess::ALL_ACCESS, false).unwrap();

        assert_eq!(thread.suspend().unwrap(), 0);
        assert_eq!(thread.suspend().unwrap(), 1);
        assert_eq!(thread.resume().unwrap(), 2);
        assert_eq!(thread.resume().unwrap(), 1);

        stop.store(true, Ordering::Relaxed);
        joiner.join().unwrap();
    }

    #[test]
    fn test_context_capture_and_write_back() {
        let (tid, stop, joiner) = spawn_spinner();
        let thread = Thread::open(tid, ThreadAccess::ALL_ACCESS, false).unwrap();

        thread.suspend().unwrap();
        let context = thread.context().unwrap();
        assert_ne!(context.instruction_pointer(), 0);
        assert_ne!(context.stack_pointer(), 0);
        // Writing back an unmodified context must not disturb the thread.
        thread.set_context(&context).unwrap();
        thread.resume().unwrap();

        stop.store(true, Ordering::Relaxed);
        joiner.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_and_exit() {
        let (tid, stop, joiner) = spawn_spinner();
        let thread = Thread::open(tid, ThreadAccess::ALL_ACCESS, false).unwrap();

        let outcome = thread.wait(Some(Duration::from_millis(20)), false).unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);

        stop.store(true, Ordering::Relaxed);
        let outcome = thread.wait(Some(Duration::from_secs(10)), false).unwrap();
        assert_eq!(outcome, WaitOutcome::Signaled);
        assert!(thread.exit_code().unwrap().is_some());
        joiner.join().unwrap();
    }

    #[test]
    fn test_exit_code_none_while_running() {
        let (tid, stop, joiner) = spawn_spinner();
        let thread = Thread::open(tid, ThreadAccess::ALL_ACCESS, false).unwrap();

        assert_eq!(thread.exit_code().unwrap(), None);

        stop.store(true, Ordering::Relaxed);
        joiner.join().unwrap();
    }

    #[test]
    fn test_priority_roundtrip() {
        let (tid, stop, joiner) = spawn_spinner();
        let thread = Thread::open(tid, ThreadAccess::ALL_ACCESS, false).unwrap();

        let priority = thread.priority().unwrap();
        thread.set_priority(priority).unwrap();
        assert_eq!(thread.priority().unwrap(), priority);

        stop.store(true, Ordering::Relaxed);
        joiner.join().unwrap();
    }

    #[test]
    fn test_start_address_nonzero() {
        let (tid, stop, joiner) = spawn_spinner();
        let thread = Thread::open(tid, ThreadAccess::ALL_ACCESS, false).unwrap();

        assert_ne!(thread.start_address().unwrap(), 0);

        stop.store(true, Ordering::Relaxed);
        joiner.join().unwrap();
    }

    #[test]
    fn test_hijack_failure_resumes_thread() {
        let (tid, stop, joiner) = spawn_spinner();
        // No GET_CONTEXT right, so the capture step inside hijack must fail
        // after the suspend succeeded.
        let thread = Thread::open(tid, ThreadAccess::SUSPEND_RESUME, false).unwrap();

        assert!(matches!(
            thread.hijack(0x1000),
            Err(Error::NativeCall { .. })
        ));

        // A previous suspend count of 0 proves the failed hijack resumed
        // the thread instead of leaving it suspended.
        assert_eq!(thread.suspend().unwrap(), 0);
        assert_eq!(thread.resume().unwrap(), 1);

        stop.store(true, Ordering::Relaxed);
        joiner.join().unwrap();
    }

    #[test]
    fn test_hijack_redirects_execution() {
        use crate::process::Process;
        use revenant_common::{AllocationKind, FreeKind, ProcessAccess, Protection};

        let (tid, _stop, joiner) = spawn_spinner();
        let thread = Thread::open(tid, ThreadAccess::ALL_ACCESS, false).unwrap();

        let process = Process::open(std::process::id(), ProcessAccess::ALL_ACCESS, false).unwrap();
        let memory = process.memory();
        let area = memory
            .allocate_area(None, 0x200, AllocationKind::ReserveCommit, Protection::EXECUTE_READWRITE)
            .unwrap();

        // mov byte [rip+0xF9], 1  (sets the flag at area offset 0x100)
        // jmp $                   (parks the thread without touching the stack)
        let code = [0xC6, 0x05, 0xF9, 0x00, 0x00, 0x00, 0x01, 0xEB, 0xFE];
        area.write(0, &code).unwrap();

        thread.hijack(area.base()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while area.read(0x100, 1).unwrap()[0] != 1 {
            assert!(
                std::time::Instant::now() < deadline,
                "hijacked thread never reached the redirected entry point"
            );
            std::thread::sleep(Duration::from_millis(10));
        }

        // The thread is parked in the payload loop and can only be torn
        // down directly; dropping the join handle detaches it.
        thread.terminate(0).unwrap();
        thread.wait(Some(Duration::from_secs(10)), false).unwrap();
        area.free(FreeKind::Release).unwrap();
        drop(joiner);
    }

    #[test]
    fn test_closed_thread_guards_operations() {
        let (tid, stop, joiner) = spawn_spinner();
        let mut thread = Thread::open(tid, ThreadAccess::ALL_ACCESS, false).unwrap();
        thread.close().unwrap();

        assert!(matches!(thread.suspend(), Err(Error::HandleClosed)));
        assert!(matches!(thread.context(), Err(Error::HandleClosed)));
        assert!(matches!(thread.hijack(0x1000), Err(Error::HandleClosed)));
        assert!(matches!(thread.close(), Err(Error::HandleClosed)));

        stop.store(true, Ordering::Relaxed);
        joiner.join().unwrap();
    }
}
