//! Detection notifications
//!
//! One [`Activity`] is built per accepted callsign and handed to the
//! injected [`Notifier`]. Transport failures never cross the boundary
//! back into the pipeline; the composite fans out to every configured
//! transport concurrently and isolates each one.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

/// A heard station, ready for delivery
#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    /// Extracted callsign
    pub callsign: String,
    /// Tuned frequency when the squelch opened, if the read succeeded
    pub frequency_hz: Option<u64>,
    /// Wall-clock time the transmission started
    pub heard_at: SystemTime,
    /// Transmission length in seconds
    pub duration_secs: f32,
    /// Full transcript the callsign came from
    pub transcript: Option<String>,
    /// Extraction confidence in [0, 1]
    pub confidence: f32,
}

/// A notification transport
///
/// Implementations log and swallow their own failures; `send_activity`
/// must not panic or return an error across this boundary.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a detection, best effort
    async fn send_activity(&self, activity: &Activity);
}

/// Fans a detection out to several transports concurrently.
///
/// Each transport runs in its own task, so a slow or panicking transport
/// cannot take the others down.
pub struct CompositeNotifier {
    transports: Vec<Arc<dyn Notifier>>,
}

impl CompositeNotifier {
    /// Build a composite over the given transports
    pub fn new(transports: Vec<Arc<dyn Notifier>>) -> Self {
        Self { transports }
    }
}

#[async_trait]
impl Notifier for CompositeNotifier {
    async fn send_activity(&self, activity: &Activity) {
        let mut deliveries = tokio::task::JoinSet::new();
        for transport in &self.transports {
            let transport = Arc::clone(transport);
            let activity = activity.clone();
            deliveries.spawn(async move { transport.send_activity(&activity).await });
        }
        while let Some(result) = deliveries.join_next().await {
            if let Err(e) = result {
                warn!("notification transport task failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counting(AtomicU32);

    #[async_trait]
    impl Notifier for Counting {
        async fn send_activity(&self, _activity: &Activity) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    #[async_trait]
    impl Notifier for Panicking {
        async fn send_activity(&self, _activity: &Activity) {
            panic!("transport blew up");
        }
    }

    fn activity() -> Activity {
        Activity {
            callsign: "W1AW".into(),
            frequency_hz: Some(144_500_000),
            heard_at: SystemTime::now(),
            duration_secs: 2.5,
            transcript: Some("this is W1AW".into()),
            confidence: 0.9,
        }
    }

    #[tokio::test]
    async fn test_composite_reaches_every_transport() {
        let a = Arc::new(Counting(AtomicU32::new(0)));
        let b = Arc::new(Counting(AtomicU32::new(0)));
        let composite = CompositeNotifier::new(vec![a.clone(), b.clone()]);

        composite.send_activity(&activity()).await;
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_composite_isolates_a_failing_transport() {
        let counting = Arc::new(Counting(AtomicU32::new(0)));
        let composite = CompositeNotifier::new(vec![Arc::new(Panicking), counting.clone()]);

        composite.send_activity(&activity()).await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }
}
