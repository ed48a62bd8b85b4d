//! Speech recognition capability
//!
//! The pipeline depends only on the [`Recognizer`] trait; concrete ASR
//! backends are injected by the application. Recognizers are not safe for
//! concurrent decoding, so the only way the pipeline touches one is
//! through [`SharedRecognizer`], which owns the mutual-exclusion guard.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::audio::resample_linear;
use crate::error::ScanError;

/// Sample rate every recognizer input is normalized to
pub const RECOGNIZER_SAMPLE_RATE: u32 = 16_000;

/// Result of one decode
#[derive(Debug, Clone, Default)]
pub struct Transcription {
    /// Recognized text; empty when nothing was understood
    pub text: String,
    /// Decoder confidence in [0, 1]
    pub confidence: f32,
    /// Length of the decoded audio in seconds
    pub duration_secs: f32,
}

/// An offline speech recognizer
///
/// `transcribe` receives mono f32 samples already at
/// [`RECOGNIZER_SAMPLE_RATE`]. Implementations may hold large models and
/// are assumed non-reentrant.
pub trait Recognizer: Send {
    /// Whether the backend is loaded and able to decode
    fn is_ready(&self) -> bool;

    /// Load models and allocate the decoder. Returns `Ok(false)` when the
    /// backend is configured out rather than broken.
    fn initialize(&mut self) -> Result<bool, ScanError>;

    /// Decode one utterance
    fn transcribe(&mut self, samples: &[f32]) -> Result<Transcription, ScanError>;

    /// Decode a 16-bit PCM WAV file, resampling to the recognizer rate
    fn transcribe_file(&mut self, path: &Path) -> Result<Transcription, ScanError> {
        let (samples, sample_rate) = read_wav_mono(path)?;
        let samples = if sample_rate == RECOGNIZER_SAMPLE_RATE {
            samples
        } else {
            resample_linear(&samples, sample_rate, RECOGNIZER_SAMPLE_RATE)
        };
        self.transcribe(&samples)
    }
}

/// Load a WAV file as mono f32 samples plus its sample rate.
///
/// 16-bit integer samples map to [-1, 1] by division by 32768; multi-channel
/// files are downmixed by averaging each frame.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), ScanError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()?,
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// The single guard serializing access to a non-reentrant recognizer.
///
/// Cloning shares the guard; callers never synchronize themselves.
#[derive(Clone)]
pub struct SharedRecognizer {
    inner: Arc<Mutex<Box<dyn Recognizer>>>,
}

impl SharedRecognizer {
    /// Wrap a backend behind the guard
    pub fn new(recognizer: Box<dyn Recognizer>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(recognizer)),
        }
    }

    /// Whether the wrapped backend can decode
    pub fn is_ready(&self) -> bool {
        self.inner.lock().expect("recognizer guard poisoned").is_ready()
    }

    /// Initialize the wrapped backend
    pub fn initialize(&self) -> Result<bool, ScanError> {
        self.inner
            .lock()
            .expect("recognizer guard poisoned")
            .initialize()
    }

    /// Decode one utterance, holding the guard for the whole call
    pub fn transcribe(&self, samples: &[f32]) -> Result<Transcription, ScanError> {
        self.inner
            .lock()
            .expect("recognizer guard poisoned")
            .transcribe(samples)
    }
}

/// Backend used when no ASR is wired: never ready, decodes to empty text.
///
/// Transmissions still flow through the pipeline; they just carry no
/// transcript and produce no callsigns.
pub struct NullRecognizer;

impl Recognizer for NullRecognizer {
    fn is_ready(&self) -> bool {
        false
    }

    fn initialize(&mut self) -> Result<bool, ScanError> {
        Ok(false)
    }

    fn transcribe(&mut self, _samples: &[f32]) -> Result<Transcription, ScanError> {
        Ok(Transcription::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_recognizer_is_never_ready() {
        let mut null = NullRecognizer;
        assert!(!null.is_ready());
        assert!(!null.initialize().unwrap());
        assert!(null.transcribe(&[0.0; 16]).unwrap().text.is_empty());
    }

    #[test]
    fn test_shared_recognizer_serializes_calls() {
        struct Counting(u32);
        impl Recognizer for Counting {
            fn is_ready(&self) -> bool {
                true
            }
            fn initialize(&mut self) -> Result<bool, ScanError> {
                Ok(true)
            }
            fn transcribe(&mut self, _s: &[f32]) -> Result<Transcription, ScanError> {
                self.0 += 1;
                Ok(Transcription {
                    text: format!("call {}", self.0),
                    confidence: 1.0,
                    duration_secs: 0.0,
                })
            }
        }

        let shared = SharedRecognizer::new(Box::new(Counting(0)));
        let other = shared.clone();
        assert_eq!(shared.transcribe(&[]).unwrap().text, "call 1");
        assert_eq!(other.transcribe(&[]).unwrap().text, "call 2");
    }
}
