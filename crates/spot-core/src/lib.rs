//! Squelch-scan pipeline engine
//!
//! The IC-705 does its own memory-channel scanning and stops wherever the
//! squelch opens. This crate watches that happen and turns it into
//! structured detections:
//!
//! 1. A [`radio::RadioClient`] polls squelch state and the tuned
//!    frequency over the CI-V control link.
//! 2. A [`segmenter::Segmenter`] cuts the continuous capture stream into
//!    discrete transmissions, with pre-roll and a silence tail.
//! 3. The recognition stage normalizes each transmission to 16 kHz,
//!    decodes it through an injected [`recognize::Recognizer`], and runs
//!    [`callsign::extract`] over the transcript.
//! 4. Accepted callsigns become [`notify::Activity`] records dispatched
//!    to an injected [`notify::Notifier`].
//!
//! The [`scanner::Scanner`] composes the stages. The two long-lived loops
//! communicate only through bounded drop-oldest queues: live monitoring
//! prefers recency over completeness, and the audio callback must never
//! block.

pub mod audio;
pub mod callsign;
pub mod error;
pub mod notify;
pub mod queue;
pub mod radio;
pub mod recognize;
pub mod scanner;
pub mod segmenter;

pub use audio::{resample_linear, AudioChunk, AudioSource, AUDIO_QUEUE_CAPACITY};
pub use callsign::{extract, Callsign, ExtractionMethod};
pub use error::ScanError;
pub use notify::{Activity, CompositeNotifier, Notifier};
pub use queue::LossyQueue;
pub use radio::{Mode, RadioClient};
pub use recognize::{
    NullRecognizer, Recognizer, SharedRecognizer, Transcription, RECOGNIZER_SAMPLE_RATE,
};
pub use scanner::{Scanner, ScannerConfig, RECOGNITION_QUEUE_CAPACITY};
pub use segmenter::{Segmenter, SegmenterConfig, Transmission};
