//! Scanner coordinator
//!
//! Owns the two long-lived cooperative tasks of the pipeline. The control
//! loop polls the squelch, feeds captured audio through the segmenter and
//! hands completed transmissions to the recognition queue; the recognition
//! loop decodes them, extracts callsigns and dispatches notifications.
//! The loops talk only through a bounded drop-oldest queue, so a slow
//! recognizer sheds the oldest backlog instead of stalling the poll.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::{resample_linear, AudioSource};
use crate::callsign;
use crate::error::ScanError;
use crate::notify::{Activity, Notifier};
use crate::queue::LossyQueue;
use crate::radio::RadioClient;
use crate::recognize::{SharedRecognizer, RECOGNIZER_SAMPLE_RATE};
use crate::segmenter::{Segmenter, SegmenterConfig, Transmission};

/// Completed transmissions waiting on the recognizer; overflow sheds the
/// oldest so fresh traffic wins when decoding falls behind.
pub const RECOGNITION_QUEUE_CAPACITY: usize = 10;

/// Backoff after a failed poll tick
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Coordinator timing and filtering parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Squelch poll period in milliseconds
    pub poll_interval_ms: u64,
    /// Callsigns below this confidence are logged, not dispatched
    pub min_callsign_confidence: f32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            min_callsign_confidence: 0.5,
        }
    }
}

/// The top-level pipeline: radio client, capture source, recognizer and
/// notifier, composed behind one `run` entry point.
pub struct Scanner<T> {
    radio: Arc<RadioClient<T>>,
    source: Box<dyn AudioSource>,
    recognizer: SharedRecognizer,
    notifier: Arc<dyn Notifier>,
    segmenter_config: SegmenterConfig,
    config: ScannerConfig,
    sample_rate: u32,
}

impl<T> Scanner<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        radio: Arc<RadioClient<T>>,
        source: Box<dyn AudioSource>,
        recognizer: SharedRecognizer,
        notifier: Arc<dyn Notifier>,
        segmenter_config: SegmenterConfig,
        config: ScannerConfig,
        sample_rate: u32,
    ) -> Self {
        Self {
            radio,
            source,
            recognizer,
            notifier,
            segmenter_config,
            config,
            sample_rate,
        }
    }

    /// Run both loops until the token cancels, then drain and release.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ScanError> {
        self.source.start()?;

        if !self.recognizer.is_ready() {
            match self.recognizer.initialize() {
                Ok(true) => info!("recognizer initialized"),
                Ok(false) => warn!("recognizer unavailable; transmissions will not be transcribed"),
                Err(e) => warn!("recognizer initialization failed: {e}"),
            }
        }

        let recognition_queue = LossyQueue::new(RECOGNITION_QUEUE_CAPACITY);
        let recognition_task = tokio::spawn(recognition_loop(
            recognition_queue.clone(),
            self.recognizer.clone(),
            Arc::clone(&self.notifier),
            self.config.min_callsign_confidence,
            cancel.clone(),
        ));

        let result = self.control_loop(&recognition_queue, &cancel).await;

        // Shutdown order: stop the producer, close the queue so the
        // recognition loop drains out, then join it.
        self.source.stop();
        recognition_queue.close();
        if let Err(e) = recognition_task.await {
            warn!("recognition task aborted: {e}");
        }
        info!("scanner stopped");
        result
    }

    /// The 50 ms control loop: squelch poll, edge handling, one audio
    /// chunk per tick.
    async fn control_loop(
        &mut self,
        recognition_queue: &LossyQueue<Transmission>,
        cancel: &CancellationToken,
    ) -> Result<(), ScanError> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let mut segmenter = Segmenter::new(self.segmenter_config.clone(), self.sample_rate);
        let mut gate_was_open = false;
        let mut current_frequency: Option<u64> = None;

        info!(
            poll_ms = self.config.poll_interval_ms,
            sample_rate = self.sample_rate,
            "scan loop started"
        );

        while !cancel.is_cancelled() {
            let delay = match self
                .tick(&mut segmenter, &mut gate_was_open, &mut current_frequency, recognition_queue)
                .await
            {
                Ok(()) => poll_interval,
                Err(e) => {
                    warn!("scan tick failed: {e}");
                    ERROR_BACKOFF
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Ok(())
    }

    async fn tick(
        &mut self,
        segmenter: &mut Segmenter,
        gate_was_open: &mut bool,
        current_frequency: &mut Option<u64>,
        recognition_queue: &LossyQueue<Transmission>,
    ) -> Result<(), ScanError> {
        // An unanswered or malformed poll reads as "closed" and the next
        // tick tries again.
        let gate_open = self.radio.is_squelch_open().await?.unwrap_or(false);

        if gate_open && !*gate_was_open {
            // Fresh squelch-open edge: tag the transmission with the tuned
            // frequency and forget any pre-roll from the previous channel.
            *current_frequency = self.radio.read_frequency().await?;
            segmenter.reset();
            debug!(frequency_hz = *current_frequency, "squelch opened");
        }

        if let Some(chunk) = self.source.try_next_chunk() {
            if let Some(mut transmission) = segmenter.push(&chunk.samples, gate_open) {
                transmission.frequency_hz = *current_frequency;
                info!(
                    duration_secs = transmission.duration_secs(),
                    frequency_hz = transmission.frequency_hz,
                    "transmission complete"
                );
                if recognition_queue.push(transmission).is_some() {
                    debug!("recognition backlog full; dropped oldest transmission");
                }
            }
        }

        *gate_was_open = gate_open;
        Ok(())
    }
}

/// Second cooperative task: decode, extract, notify.
async fn recognition_loop(
    queue: LossyQueue<Transmission>,
    recognizer: SharedRecognizer,
    notifier: Arc<dyn Notifier>,
    min_confidence: f32,
    cancel: CancellationToken,
) {
    while let Some(transmission) = queue.pop().await {
        // Cancellation is observed between decodes, never mid-decode;
        // whatever is still queued at shutdown is discarded quickly.
        if cancel.is_cancelled() {
            debug!("discarding queued transmission during shutdown");
            continue;
        }

        let duration_secs = transmission.duration_secs();
        let started_at = transmission.started_at;
        let frequency_hz = transmission.frequency_hz;

        let samples = if transmission.sample_rate == RECOGNIZER_SAMPLE_RATE {
            transmission.samples
        } else {
            resample_linear(
                &transmission.samples,
                transmission.sample_rate,
                RECOGNIZER_SAMPLE_RATE,
            )
        };

        let decoder = recognizer.clone();
        let decoded = tokio::task::spawn_blocking(move || decoder.transcribe(&samples)).await;
        let transcription = match decoded {
            Ok(Ok(t)) => t,
            Ok(Err(e)) => {
                warn!("transcription failed: {e}");
                continue;
            }
            Err(e) => {
                warn!("recognizer task failed: {e}");
                continue;
            }
        };

        if transcription.text.trim().is_empty() {
            debug!(duration_secs, "transmission decoded to nothing");
            continue;
        }
        debug!(text = %transcription.text, "transcript");

        for found in callsign::extract(&transcription.text) {
            if found.confidence < min_confidence {
                debug!(
                    callsign = %found.text,
                    confidence = found.confidence,
                    "candidate below confidence floor"
                );
                continue;
            }

            info!(
                callsign = %found.text,
                frequency_hz,
                confidence = found.confidence,
                "station heard"
            );
            let activity = Activity {
                callsign: found.text,
                frequency_hz,
                heard_at: started_at,
                duration_secs,
                transcript: Some(transcription.text.clone()),
                confidence: found.confidence,
            };
            notifier.send_activity(&activity).await;
        }
    }
}
