//! IC-705 squelch-scan monitor daemon
//!
//! Wires the pipeline together: serial CI-V client, cpal capture,
//! recognizer backend, notification transports. The radio does the
//! scanning; this process listens, transcribes and reports.

mod capture;
mod notifiers;
mod settings;
#[cfg(feature = "whisper")]
mod whisper;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use spot_core::{
    CompositeNotifier, Notifier, RadioClient, Scanner, SharedRecognizer,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use capture::CpalSource;
use notifiers::{LogNotifier, WebhookNotifier};
use settings::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about = "Passive IC-705 squelch-scan monitor")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "spotter.toml")]
    config: PathBuf,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// List audio input devices and exit
    #[arg(long)]
    list_audio_devices: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.list_ports {
        return list_ports();
    }
    if args.list_audio_devices {
        return capture::list_input_devices();
    }

    let settings = Settings::load(&args.config)?;
    info!(config = %args.config.display(), "starting squelch-scan monitor");

    let radio = Arc::new(
        RadioClient::open_serial(
            &settings.radio.port_name,
            settings.radio.baud_rate,
            settings.radio.address,
        )
        .await
        .context("opening radio control link")?,
    );
    let source = Box::new(CpalSource::new(
        settings.audio.device_index,
        settings.audio.sample_rate,
    ));
    let recognizer = build_recognizer(&settings);
    let notifier = build_notifier(&settings);

    let scanner = Scanner::new(
        radio,
        source,
        recognizer,
        notifier,
        settings.segmenter.clone(),
        settings.scanner.clone(),
        settings.audio.sample_rate,
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    scanner.run(cancel).await.context("scanner failed")?;
    Ok(())
}

#[cfg(feature = "whisper")]
fn build_recognizer(settings: &Settings) -> SharedRecognizer {
    SharedRecognizer::new(Box::new(whisper::WhisperRecognizer::new(&settings.asr)))
}

#[cfg(not(feature = "whisper"))]
fn build_recognizer(_settings: &Settings) -> SharedRecognizer {
    SharedRecognizer::new(Box::new(spot_core::NullRecognizer))
}

fn build_notifier(settings: &Settings) -> Arc<dyn Notifier> {
    let mut transports: Vec<Arc<dyn Notifier>> = vec![Arc::new(LogNotifier)];
    if let Some(url) = &settings.notifications.webhook_url {
        transports.push(Arc::new(WebhookNotifier::new(url.clone())));
    }
    Arc::new(CompositeNotifier::new(transports))
}

fn list_ports() -> anyhow::Result<()> {
    let ports = serialport::available_ports().context("enumerating serial ports")?;
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for port in ports {
        println!("{}", port.port_name);
    }
    Ok(())
}
