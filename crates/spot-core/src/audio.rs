//! Audio capture capability and sample-rate conversion
//!
//! The pipeline is agnostic to the capture backend: anything that yields
//! mono f32 chunks through [`AudioSource`] will do. Concrete adapters live
//! in the daemon; tests drive scripted sources.

use std::time::SystemTime;

use crate::error::ScanError;

/// Capacity of the chunk queue a capture adapter keeps between its OS
/// callback and the control loop. Overflow drops the oldest chunk; the
/// callback must never block.
pub const AUDIO_QUEUE_CAPACITY: usize = 100;

/// A contiguous block of mono samples from the capture source
///
/// Samples are f32 in [-1.0, 1.0]. Immutable once queued.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono samples
    pub samples: Vec<f32>,
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Wall-clock time the chunk was produced
    pub captured_at: SystemTime,
}

impl AudioChunk {
    /// Build a chunk stamped with the current wall-clock time
    pub fn now(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            captured_at: SystemTime::now(),
        }
    }
}

/// An audio capture backend delivering mono f32 chunks
///
/// The reader side is non-blocking: the control loop drains at most one
/// chunk per tick via [`try_next_chunk`](AudioSource::try_next_chunk).
pub trait AudioSource: Send {
    /// Begin capturing. Fails when no usable input device exists.
    fn start(&mut self) -> Result<(), ScanError>;

    /// Stop capturing and drop any buffered chunks
    fn stop(&mut self);

    /// Whether the backend is currently delivering chunks
    fn is_capturing(&self) -> bool;

    /// Take the oldest buffered chunk, if any, without blocking
    fn try_next_chunk(&mut self) -> Option<AudioChunk>;
}

/// Resample mono audio by linear interpolation between adjacent samples.
///
/// For each output index `i` the source position `i / ratio` is split into
/// integer and fractional parts; the final source sample is clamped at the
/// boundary. A fresh buffer is allocated; the caller drops the original.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let out_len = (samples.len() as f64 * ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 / ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;

        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_identity_at_same_rate() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 48_000, 48_000), samples);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..480).map(|i| i as f32 / 480.0).collect();
        let out = resample_linear(&samples, 48_000, 24_000);
        assert_eq!(out.len(), 240);
    }

    #[test]
    fn test_resample_48k_to_16k() {
        let samples = vec![0.0; 4800];
        let out = resample_linear(&samples, 48_000, 16_000);
        assert_eq!(out.len(), 1600);
    }

    #[test]
    fn test_resample_interpolates_between_neighbors() {
        // Upsampling a ramp keeps it monotone and inside the input range.
        let samples = vec![0.0, 1.0];
        let out = resample_linear(&samples, 8_000, 16_000);
        assert_eq!(out.len(), 4);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
        assert!(out.iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample_linear(&[], 48_000, 16_000).is_empty());
    }
}
