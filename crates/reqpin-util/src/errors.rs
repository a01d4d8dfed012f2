use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for reqpin operations above the resolution engine.
#[derive(Debug, Error, Diagnostic)]
pub enum ReqpinError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed configuration file.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check reqpin.toml and ~/.reqpin/config.toml for syntax errors"))]
    Config { message: String },

    /// A requirements file could not be read or parsed.
    #[error("Requirements error: {message}")]
    Requirements { message: String },

    /// A repository could not be set up from its backing source.
    #[error("Repository error: {message}")]
    Repository { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type ReqpinResult<T> = miette::Result<T>;
