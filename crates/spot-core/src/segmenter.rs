//! Squelch-gated transmission segmentation
//!
//! The segmenter turns a continuous stream of capture chunks plus the
//! polled squelch state into discrete transmissions: a rolling pre-roll
//! buffer catches the leading edge before the gate opened, a silence tail
//! keeps trailing speech after it closed, and duration clamps discard
//! noise blips and cut off stuck carriers.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Segmentation timing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Look-behind retained while the gate is closed (seconds)
    pub pre_roll_secs: f32,
    /// Recording kept after the gate closes before the transmission is
    /// considered complete (seconds)
    pub silence_tail_secs: f32,
    /// Recordings with less content than this are dropped as noise (seconds)
    pub min_duration_secs: f32,
    /// Recordings reaching this length are force-terminated (seconds)
    pub max_duration_secs: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            pre_roll_secs: 0.5,
            silence_tail_secs: 1.0,
            min_duration_secs: 1.0,
            max_duration_secs: 60.0,
        }
    }
}

/// A completed squelch-open-to-quiet recording
///
/// Owns its sample buffer; the recognition stage consumes it exactly once
/// by move.
#[derive(Debug, Clone)]
pub struct Transmission {
    /// Mono samples at `sample_rate`
    pub samples: Vec<f32>,
    /// Capture sample rate in Hz, carried verbatim
    pub sample_rate: u32,
    /// Wall-clock time the gate opened
    pub started_at: SystemTime,
    /// Frequency the radio was tuned to when the gate opened
    pub frequency_hz: Option<u64>,
}

impl Transmission {
    /// Recording length in seconds
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Recording,
}

/// Squelch-gated segmenter state machine
#[derive(Debug)]
pub struct Segmenter {
    config: SegmenterConfig,
    sample_rate: u32,
    state: State,
    pre_roll: VecDeque<f32>,
    pre_roll_capacity: usize,
    recording: Vec<f32>,
    started_at: SystemTime,
    silence_samples: usize,
    silence_tail_samples: usize,
    min_samples: usize,
    max_samples: usize,
}

impl Segmenter {
    /// Create a segmenter for a fixed capture sample rate
    pub fn new(config: SegmenterConfig, sample_rate: u32) -> Self {
        let per_sec = sample_rate as f32;
        let pre_roll_capacity = (config.pre_roll_secs * per_sec) as usize;
        let silence_tail_samples = (config.silence_tail_secs * per_sec) as usize;
        let min_samples = (config.min_duration_secs * per_sec) as usize;
        let max_samples = (config.max_duration_secs * per_sec) as usize;

        Self {
            config,
            sample_rate,
            state: State::Idle,
            pre_roll: VecDeque::with_capacity(pre_roll_capacity),
            pre_roll_capacity,
            recording: Vec::new(),
            started_at: SystemTime::UNIX_EPOCH,
            silence_samples: 0,
            silence_tail_samples,
            min_samples,
            max_samples,
        }
    }

    /// The timing parameters this segmenter was built with
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Whether a transmission is currently being recorded
    pub fn is_recording(&self) -> bool {
        self.state == State::Recording
    }

    /// Return to Idle with empty buffers.
    ///
    /// The coordinator calls this on every fresh squelch-open edge so
    /// pre-roll from the previous channel cannot leak into the new
    /// transmission.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.pre_roll.clear();
        self.recording = Vec::new();
        self.silence_samples = 0;
    }

    /// Feed one batch of samples together with the current gate state.
    ///
    /// Emits at most one completed transmission per open-to-quiet cycle.
    pub fn push(&mut self, samples: &[f32], gate_open: bool) -> Option<Transmission> {
        match self.state {
            State::Idle => {
                if gate_open {
                    self.begin_recording(samples);
                    None
                } else {
                    self.feed_pre_roll(samples);
                    None
                }
            }
            State::Recording => {
                self.recording.extend_from_slice(samples);
                if gate_open {
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }

                if self.silence_samples >= self.silence_tail_samples {
                    self.finish(false)
                } else if self.recording.len() >= self.max_samples {
                    self.finish(true)
                } else {
                    None
                }
            }
        }
    }

    fn begin_recording(&mut self, samples: &[f32]) {
        self.state = State::Recording;
        self.started_at = SystemTime::now();
        self.silence_samples = 0;
        self.recording = Vec::with_capacity(self.pre_roll.len() + samples.len());
        self.recording.extend(self.pre_roll.drain(..));
        self.recording.extend_from_slice(samples);
    }

    fn feed_pre_roll(&mut self, samples: &[f32]) {
        if self.pre_roll_capacity == 0 {
            return;
        }
        for &sample in samples {
            if self.pre_roll.len() == self.pre_roll_capacity {
                self.pre_roll.pop_front();
            }
            self.pre_roll.push_back(sample);
        }
    }

    fn finish(&mut self, forced: bool) -> Option<Transmission> {
        self.state = State::Idle;
        let samples = std::mem::take(&mut self.recording);
        let silence = std::mem::replace(&mut self.silence_samples, 0);

        // Content length is what was on the air: everything recorded up to
        // the moment the gate went quiet for good.
        let content = samples.len().saturating_sub(silence);
        if !forced && content < self.min_samples {
            debug!(
                content_secs = content as f32 / self.sample_rate as f32,
                "dropping short transmission"
            );
            return None;
        }

        Some(Transmission {
            samples,
            sample_rate: self.sample_rate,
            started_at: self.started_at,
            frequency_hz: None,
        })
    }
}
