use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use reqpin_core::error::ParseError;
use reqpin_core::solution::SolutionError;

/// A repository's backing source is unusable. Fatal for that repository
/// only; the caller decides whether to continue without it.
#[derive(Debug, Error, Diagnostic)]
pub enum RepositoryInitializationError {
    #[error("failed to read {}", path.display())]
    #[diagnostic(code(reqpin::repos::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: requirement has no source annotation: `{text}`", path.display())]
    #[diagnostic(
        code(reqpin::repos::unannotated),
        help("solution files must record why each package is included; recompile against an index to add annotations")
    )]
    Unannotated {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("invalid solution file {}", path.display())]
    #[diagnostic(code(reqpin::repos::solution))]
    Solution {
        path: PathBuf,
        #[source]
        source: SolutionError,
    },

    #[error("source directory {} does not exist", path.display())]
    #[diagnostic(code(reqpin::repos::missing_source))]
    MissingSource { path: PathBuf },

    #[error("invalid exclude pattern `{pattern}`: {message}")]
    #[diagnostic(code(reqpin::repos::exclude))]
    InvalidExclude { pattern: String, message: String },

    #[error("repository {identity} is registered twice")]
    #[diagnostic(code(reqpin::repos::duplicate))]
    Duplicate { identity: String },

    #[error("failed to create HTTP client: {message}")]
    #[diagnostic(code(reqpin::repos::client))]
    Client { message: String },
}

/// A single candidate could not be materialized. The resolver treats this
/// as a rejection and moves on to the next candidate.
#[derive(Debug, Error, Diagnostic)]
pub enum RepositoryError {
    #[error("{name} {version} is not provided by {identity}")]
    #[diagnostic(code(reqpin::repos::not_found))]
    NotFound {
        identity: String,
        name: String,
        version: String,
    },

    #[error("request to {url} failed: {message}")]
    #[diagnostic(code(reqpin::repos::network))]
    Network { url: String, message: String },

    #[error("invalid metadata for {name} {version}: {message}")]
    #[diagnostic(code(reqpin::repos::metadata))]
    Metadata {
        name: String,
        version: String,
        message: String,
    },

    #[error("invalid requirement `{text}` in metadata of {name}")]
    #[diagnostic(code(reqpin::repos::requirement))]
    Requirement {
        name: String,
        text: String,
        #[source]
        source: ParseError,
    },

    #[error("repository {identity} is closed")]
    #[diagnostic(code(reqpin::repos::closed))]
    Closed { identity: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Failure to read metadata out of a source tree.
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractionError {
    #[error("failed to read {}", path.display())]
    #[diagnostic(code(reqpin::extract::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has no static project metadata", path.display())]
    #[diagnostic(
        code(reqpin::extract::no_metadata),
        help("configure `[extract] command` to read metadata from setup.py projects")
    )]
    NoMetadata { path: PathBuf },

    #[error("invalid metadata in {}: {message}", path.display())]
    #[diagnostic(code(reqpin::extract::invalid))]
    Invalid { path: PathBuf, message: String },

    #[error("failed to run `{program}`: {message}")]
    #[diagnostic(code(reqpin::extract::spawn))]
    Spawn { program: String, message: String },

    #[error("`{program}` exited with {status}: {stderr}")]
    #[diagnostic(code(reqpin::extract::failed))]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}
