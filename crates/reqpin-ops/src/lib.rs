//! High-level operations behind the `reqpin` commands.

pub mod ops_compile;
pub mod ops_why;
