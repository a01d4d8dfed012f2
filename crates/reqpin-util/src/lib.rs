//! Shared utilities for reqpin.
//!
//! Cross-cutting concerns used by the other reqpin crates: the top-level
//! error type, filesystem helpers, process spawning for sandboxed metadata
//! extraction, and terminal status output.

pub mod errors;
pub mod fs;
pub mod process;
pub mod progress;
