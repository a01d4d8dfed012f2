//! Errors raised by the requirement algebra.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Malformed requirement, version, specifier or marker text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("{message} at position {} in `{input}`", span.offset())]
#[diagnostic(code(reqpin::parse))]
pub struct ParseError {
    pub message: String,
    #[source_code]
    pub input: String,
    #[label("here")]
    pub span: SourceSpan,
}

impl ParseError {
    pub fn new(message: impl Into<String>, input: &str, position: usize) -> Self {
        Self {
            message: message.into(),
            input: input.to_string(),
            span: SourceSpan::from(position.min(input.len())),
        }
    }

    /// Byte offset of the error within the input.
    pub fn position(&self) -> usize {
        self.span.offset()
    }
}

/// Precondition violation when combining two requirements.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum MergeError {
    #[error("cannot merge requirements for different packages: `{left}` and `{right}`")]
    #[diagnostic(code(reqpin::merge))]
    NameMismatch { left: String, right: String },
}
