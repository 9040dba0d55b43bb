//! Reelcut Common Utilities
//!
//! Shared infrastructure for all Reelcut crates:
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Configuration loading
//! - Per-render temporary file scoping

pub mod config;
pub mod error;
pub mod logging;
pub mod temp;

pub use config::*;
pub use error::*;
pub use temp::TempScope;
