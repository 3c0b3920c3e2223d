//! Common types used across revenant components
//!
//! This module is organized into submodules by functionality:
//! - `memory` - Memory protection, allocation, and region types
//! - `access` - Process and thread access right masks

pub mod access;
pub mod memory;

pub use access::*;
pub use memory::*;
