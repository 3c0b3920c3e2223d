//! Revenant Core Library
//!
//! Remote process memory and execution control primitives: handle lifecycle,
//! byte pattern compilation and scanning, remote memory read/write/allocate,
//! module and thread enumeration, thread hijacking, and payload injection.
//!
//! Pattern compilation and matching are platform independent; everything that
//! touches a live process is Windows only.

pub mod pattern;

#[cfg(windows)]
pub mod handle;
#[cfg(windows)]
pub mod injection;
#[cfg(windows)]
pub mod memory;
#[cfg(windows)]
pub mod module;
#[cfg(windows)]
pub mod process;
#[cfg(windows)]
pub mod thread;

pub use pattern::{ByteOrder, Pattern};
pub use revenant_common::{Error, Result};

#[cfg(windows)]
pub use handle::Handle;
#[cfg(windows)]
pub use injection::{Injection, InjectionResult};
#[cfg(windows)]
pub use memory::{Memory, MemoryArea};
#[cfg(windows)]
pub use module::Module;
#[cfg(windows)]
pub use process::Process;
#[cfg(windows)]
pub use thread::{ExecutionContext, Thread, WaitOutcome};
