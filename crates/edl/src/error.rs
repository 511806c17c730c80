//! EDL error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, EdlError>;

/// Errors that can occur while reading an edit decision list.
#[derive(Error, Debug)]
pub enum EdlError {
    /// A line had fewer than two fields.
    #[error("line {line}: expected at least two fields, found {found}")]
    MissingFields { line: usize, found: usize },

    /// A field could not be read as a time or frame value.
    #[error("line {line}: invalid time value '{value}'")]
    InvalidTime { line: usize, value: String },

    /// The cut region ends before it starts.
    #[error("line {line}: cut ends ({end}) before it starts ({start})")]
    InvertedRange { line: usize, start: f64, end: f64 },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
