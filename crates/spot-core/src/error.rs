//! Error types for the scan pipeline

use thiserror::Error;

/// Errors that can occur while running the scan pipeline
///
/// Only the configuration-shaped variants are fatal; everything reachable
/// from a running scan loop is handled with a logged backoff.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Serial control link could not be opened
    #[error("serial port unavailable: {0}")]
    IoUnavailable(String),

    /// No usable audio input device
    #[error("audio capture unavailable: {0}")]
    AudioUnavailable(String),

    /// I/O error on an open link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Recognizer backend failure
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// WAV file could not be read
    #[error("WAV read error: {0}")]
    Wav(#[from] hound::Error),
}
