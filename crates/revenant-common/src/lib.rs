//! Revenant Common Types
//!
//! Shared types, the error taxonomy, the static NTSTATUS catalog and logging
//! configuration used by the revenant crates.

pub mod error;
pub mod logging;
pub mod ntstatus;
pub mod types;

pub use error::{Error, Result};
pub use logging::{init_logging, LogConfig};
pub use types::*;

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
