//! Notification transports
//!
//! Each transport logs and swallows its own failures; the composite in
//! spot-core fans detections out across whatever is configured here.

use async_trait::async_trait;
use spot_core::{Activity, Notifier};
use tracing::{debug, info, warn};

/// Writes each detection to the log; always configured
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_activity(&self, activity: &Activity) {
        let mhz = activity
            .frequency_hz
            .map(|hz| format!("{:.4} MHz", hz as f64 / 1_000_000.0))
            .unwrap_or_else(|| "unknown frequency".to_string());
        info!(
            callsign = %activity.callsign,
            confidence = activity.confidence,
            duration_secs = activity.duration_secs,
            "heard {} on {}",
            activity.callsign,
            mhz
        );
    }
}

/// POSTs each detection as JSON to a configured URL
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_activity(&self, activity: &Activity) {
        match self.client.post(&self.url).json(activity).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(callsign = %activity.callsign, "webhook delivered");
            }
            Ok(response) => {
                warn!(status = %response.status(), "webhook rejected activity");
            }
            Err(e) => {
                warn!("webhook delivery failed: {e}");
            }
        }
    }
}
