//! Error types for CI-V frame handling

use thiserror::Error;

/// Errors from the strict frame parse
///
/// Callers on the wire path treat [`Incomplete`](ParseError::Incomplete)
/// as "keep reading"; only a terminated-but-malformed cut is worth a log
/// line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No complete frame in the buffer yet
    #[error("incomplete frame: missing {0}")]
    Incomplete(&'static str),

    /// A terminated cut that cannot be a frame
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),
}
