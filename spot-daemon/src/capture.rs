//! cpal capture adapter
//!
//! Implements the pipeline's `AudioSource` over the host audio API
//! (WASAPI on Windows, ALSA on Unix). The cpal stream is not `Send`, so a
//! worker thread owns it for the lifetime of the capture; the OS callback
//! downmixes to mono f32 and pushes chunks through the bounded
//! drop-oldest queue without ever blocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat, SampleRate, StreamConfig};
use spot_core::{AudioChunk, AudioSource, LossyQueue, ScanError, AUDIO_QUEUE_CAPACITY};
use tracing::{debug, info, warn};

/// Device-name fragments that identify the radio's USB audio codec
const RADIO_DEVICE_HINTS: [&str; 3] = ["IC-705", "ICOM", "USB AUDIO CODEC"];

enum WorkerCmd {
    Shutdown,
}

/// `AudioSource` over a cpal input stream
pub struct CpalSource {
    device_index: i32,
    sample_rate: u32,
    queue: LossyQueue<AudioChunk>,
    capturing: Arc<AtomicBool>,
    cmd_tx: Option<mpsc::Sender<WorkerCmd>>,
    worker: Option<JoinHandle<()>>,
}

impl CpalSource {
    /// Create an idle source; `device_index == -1` auto-detects the radio
    pub fn new(device_index: i32, sample_rate: u32) -> Self {
        Self {
            device_index,
            sample_rate,
            queue: LossyQueue::new(AUDIO_QUEUE_CAPACITY),
            capturing: Arc::new(AtomicBool::new(false)),
            cmd_tx: None,
            worker: None,
        }
    }

    fn pick_device(&self) -> Result<Device, ScanError> {
        let host = cpal::default_host();

        if self.device_index >= 0 {
            return host
                .input_devices()
                .map_err(|e| ScanError::AudioUnavailable(e.to_string()))?
                .nth(self.device_index as usize)
                .ok_or_else(|| {
                    ScanError::AudioUnavailable(format!(
                        "no input device at index {}",
                        self.device_index
                    ))
                });
        }

        // Auto-detect: any input device whose name looks like the radio.
        let devices = host
            .input_devices()
            .map_err(|e| ScanError::AudioUnavailable(e.to_string()))?;
        for device in devices {
            let name = device.name().unwrap_or_default();
            let upper = name.to_uppercase();
            if RADIO_DEVICE_HINTS.iter().any(|hint| upper.contains(hint)) {
                info!(device = %name, "auto-detected radio audio device");
                return Ok(device);
            }
        }

        match host.default_input_device() {
            Some(device) => {
                warn!(
                    device = %device.name().unwrap_or_default(),
                    "radio audio device not found; falling back to default input"
                );
                Ok(device)
            }
            None => Err(ScanError::AudioUnavailable(
                "no audio input devices present".to_string(),
            )),
        }
    }
}

impl AudioSource for CpalSource {
    fn start(&mut self) -> Result<(), ScanError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let device = self.pick_device()?;
        let queue = self.queue.clone();
        let capturing = Arc::clone(&self.capturing);
        let sample_rate = self.sample_rate;
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (startup_tx, startup_rx) = mpsc::channel::<Result<(), ScanError>>();

        // The stream is !Send; a dedicated thread owns it until shutdown.
        let worker = std::thread::spawn(move || {
            let stream = match build_stream(&device, sample_rate, queue) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = startup_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = startup_tx.send(Err(ScanError::AudioUnavailable(e.to_string())));
                return;
            }

            capturing.store(true, Ordering::SeqCst);
            let _ = startup_tx.send(Ok(()));

            // Keep the stream alive until asked to stop.
            let _ = cmd_rx.recv();
            capturing.store(false, Ordering::SeqCst);
            drop(stream);
        });

        match startup_rx.recv() {
            Ok(Ok(())) => {
                self.cmd_tx = Some(cmd_tx);
                self.worker = Some(worker);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => Err(ScanError::AudioUnavailable(
                "capture worker died during startup".to_string(),
            )),
        }
    }

    fn stop(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WorkerCmd::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        while self.queue.try_pop().is_some() {}
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn try_next_chunk(&mut self) -> Option<AudioChunk> {
        self.queue.try_pop()
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_stream(
    device: &Device,
    sample_rate: u32,
    queue: LossyQueue<AudioChunk>,
) -> Result<cpal::Stream, ScanError> {
    let default = device
        .default_input_config()
        .map_err(|e| ScanError::AudioUnavailable(e.to_string()))?;
    let channels = default.channels() as usize;
    let config = StreamConfig {
        channels: default.channels(),
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        device = %device.name().unwrap_or_default(),
        sample_rate,
        channels,
        format = ?default.sample_format(),
        "opening capture stream"
    );

    match default.sample_format() {
        SampleFormat::F32 => typed_stream::<f32>(device, &config, channels, sample_rate, queue),
        SampleFormat::I16 => typed_stream::<i16>(device, &config, channels, sample_rate, queue),
        SampleFormat::U16 => typed_stream::<u16>(device, &config, channels, sample_rate, queue),
        SampleFormat::I32 => typed_stream::<i32>(device, &config, channels, sample_rate, queue),
        other => Err(ScanError::AudioUnavailable(format!(
            "unsupported sample format {other:?}"
        ))),
    }
}

fn typed_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    sample_rate: u32,
    queue: LossyQueue<AudioChunk>,
) -> Result<cpal::Stream, ScanError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let callback = move |data: &[T], _: &cpal::InputCallbackInfo| {
        let mono: Vec<f32> = if channels == 1 {
            data.iter().map(|&s| s.to_sample::<f32>()).collect()
        } else {
            data.chunks_exact(channels)
                .map(|frame| {
                    frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32
                })
                .collect()
        };

        if queue.push(AudioChunk::now(mono, sample_rate)).is_some() {
            debug!("audio queue full; dropped oldest chunk");
        }
    };

    device
        .build_input_stream(
            config,
            callback,
            |e| warn!("capture stream error: {e}"),
            None,
        )
        .map_err(|e| ScanError::AudioUnavailable(e.to_string()))
}

/// Print the available input devices (for `--list-audio-devices`)
pub fn list_input_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let mut any = false;
    for (index, device) in host.input_devices()?.enumerate() {
        any = true;
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let rate = device
            .default_input_config()
            .map(|c| c.sample_rate().0.to_string())
            .unwrap_or_else(|_| "?".to_string());
        println!("{index}: {name} ({rate} Hz)");
    }
    if !any {
        println!("no audio input devices found");
    }
    Ok(())
}
