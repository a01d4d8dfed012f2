//! Resolution engine: turns top-level requirements into a fully pinned
//! distribution graph using the registered repositories.

pub mod conflict;
pub mod resolver;

pub use conflict::{Contribution, Rejection, ResolutionConflict};
pub use resolver::{ConstraintSet, Resolution, ResolveError, Resolver, ResolverOptions};
