//! Core data types for reqpin.
//!
//! The requirement algebra (names, versions, specifiers, markers and the
//! merge rules that combine requirements), the distribution graph that
//! accumulates requirements while a resolution runs, the solution file
//! codec, requirements-file ingestion and user configuration.

pub mod config;
pub mod dist;
pub mod dists;
pub mod error;
pub mod marker;
pub mod merge;
pub mod name;
pub mod reqfile;
pub mod requirement;
pub mod solution;
pub mod specifier;
pub mod version;

pub use dist::{DistInfo, RepositoryId};
pub use dists::{DistSource, DistributionGraph, Node, NodeId, NodeKey};
pub use error::{MergeError, ParseError};
pub use marker::{MarkerEnvironment, MarkerTree};
pub use merge::MergeCache;
pub use name::{normalize_name, NameCache, PackageName};
pub use requirement::Requirement;
pub use specifier::{Clause, Operator, Specifier};
pub use version::Version;
