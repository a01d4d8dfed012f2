//! Candidate sources for reqpin.
//!
//! Every source implements [`Repository`]: in-memory sets, local source
//! trees, PyPI-compatible JSON indexes, previously written solution files,
//! and an ordered aggregate of all of these.

pub mod download;
pub mod error;
pub mod extract;
pub mod memory;
pub mod multi;
pub mod pypi;
pub mod repository;
pub mod solution;
pub mod source;

pub use error::{ExtractionError, RepositoryError, RepositoryInitializationError};
pub use extract::{CommandExtractor, MetadataExtractor, PyprojectExtractor};
pub use memory::MemoryRepository;
pub use multi::MultiRepository;
pub use pypi::PyPiRepository;
pub use repository::{Candidate, DistributionType, Repository};
pub use solution::SolutionRepository;
pub use source::SourceRepository;
