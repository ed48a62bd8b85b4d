//! Daemon configuration
//!
//! Loaded from a TOML file; every section falls back to defaults so a
//! missing file yields a runnable (if notification-less) setup. A present
//! but malformed file is fatal configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use spot_core::{ScannerConfig, SegmenterConfig};
use tracing::info;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub radio: RadioSettings,
    pub audio: AudioSettings,
    pub asr: AsrSettings,
    pub scanner: ScannerConfig,
    pub segmenter: SegmenterConfig,
    pub notifications: NotificationSettings,
}

/// Serial control link
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSettings {
    /// Serial device of the USB control link
    pub port_name: String,
    pub baud_rate: u32,
    /// CI-V address of the radio (factory default 0xA4)
    pub address: u8,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            port_name: default_port_name(),
            baud_rate: 19_200,
            address: spot_protocol::IC705_ADDR,
        }
    }
}

#[cfg(windows)]
fn default_port_name() -> String {
    "COM3".to_string()
}

#[cfg(not(windows))]
fn default_port_name() -> String {
    "/dev/ttyACM0".to_string()
}

/// Capture backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Input device index; -1 auto-detects the radio's USB audio codec
    pub device_index: i32,
    pub sample_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device_index: -1,
            sample_rate: 48_000,
        }
    }
}

/// Offline recognizer backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrSettings {
    /// Model file name inside `models_dir`
    pub model: String,
    pub models_dir: PathBuf,
    pub use_gpu: bool,
    pub threads: usize,
}

impl Default for AsrSettings {
    fn default() -> Self {
        Self {
            model: "ggml-base.en.bin".to_string(),
            models_dir: PathBuf::from("models"),
            use_gpu: false,
            threads: 4,
        }
    }
}

impl AsrSettings {
    /// Full path to the configured model file
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(&self.model)
    }
}

/// Notification transports; each configured transport joins the fan-out
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// POST each detection as JSON to this URL
    pub webhook_url: Option<String>,
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
