//! whisper.cpp recognizer backend (behind the `whisper` feature)
//!
//! Loads a ggml model from the configured models directory. The model
//! file must already be present; fetching archives is an ops concern.

use std::path::PathBuf;

use spot_core::{Recognizer, ScanError, Transcription, RECOGNIZER_SAMPLE_RATE};
use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::settings::AsrSettings;

pub struct WhisperRecognizer {
    model_path: PathBuf,
    threads: i32,
    use_gpu: bool,
    context: Option<WhisperContext>,
}

impl WhisperRecognizer {
    pub fn new(asr: &AsrSettings) -> Self {
        Self {
            model_path: asr.model_path(),
            threads: asr.threads.max(1) as i32,
            use_gpu: asr.use_gpu,
            context: None,
        }
    }
}

impl Recognizer for WhisperRecognizer {
    fn is_ready(&self) -> bool {
        self.context.is_some()
    }

    fn initialize(&mut self) -> Result<bool, ScanError> {
        if self.context.is_some() {
            return Ok(true);
        }
        if !self.model_path.exists() {
            return Err(ScanError::Recognizer(format!(
                "model file missing: {}",
                self.model_path.display()
            )));
        }

        let mut params = WhisperContextParameters::default();
        params.use_gpu = self.use_gpu;
        let path = self.model_path.to_string_lossy();
        let context = WhisperContext::new_with_params(&path, params)
            .map_err(|e| ScanError::Recognizer(format!("loading {path}: {e}")))?;

        info!(model = %path, threads = self.threads, "whisper model loaded");
        self.context = Some(context);
        Ok(true)
    }

    fn transcribe(&mut self, samples: &[f32]) -> Result<Transcription, ScanError> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| ScanError::Recognizer("not initialized".to_string()))?;

        let mut state = context
            .create_state()
            .map_err(|e| ScanError::Recognizer(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads);
        params.set_language(Some("en"));
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_special(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| ScanError::Recognizer(e.to_string()))?;

        let segments = state
            .full_n_segments()
            .map_err(|e| ScanError::Recognizer(e.to_string()))?;

        let mut text = String::new();
        let mut prob_sum = 0.0f32;
        let mut token_count = 0u32;
        for segment in 0..segments {
            let piece = state
                .full_get_segment_text(segment)
                .map_err(|e| ScanError::Recognizer(e.to_string()))?;
            text.push_str(piece.trim());
            text.push(' ');

            let tokens = state
                .full_n_tokens(segment)
                .map_err(|e| ScanError::Recognizer(e.to_string()))?;
            for token in 0..tokens {
                prob_sum += state
                    .full_get_token_prob(segment, token)
                    .map_err(|e| ScanError::Recognizer(e.to_string()))?;
                token_count += 1;
            }
        }

        let confidence = if token_count > 0 {
            prob_sum / token_count as f32
        } else {
            0.0
        };

        Ok(Transcription {
            text: text.trim().to_string(),
            confidence,
            duration_secs: samples.len() as f32 / RECOGNIZER_SAMPLE_RATE as f32,
        })
    }
}
