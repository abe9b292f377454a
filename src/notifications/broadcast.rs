//! Fan-out delivery of one message to every subscription in a snapshot.
//!
//! Each subscription gets its own delivery future; all of them are driven
//! concurrently and joined before the counts are reduced, so the report is
//! exact regardless of completion order. A failed delivery never affects the
//! others and nothing is rolled back.
//!
//! The engine never touches the live registry. Endpoints reported gone are
//! only collected here; removing them is the eviction step's job.

use std::collections::HashSet;

use futures_util::future::join_all;

use super::push::{DeliveryOutcome, PushDelivery, PushMessage};
use super::store::Snapshot;

/// Aggregate result of one broadcast.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Deliveries the push service accepted.
    pub delivered: usize,
    /// Failed deliveries, gone ones included.
    pub failed: usize,
    /// Endpoints the push service reported as permanently gone.
    pub gone: HashSet<String>,
}

impl BroadcastReport {
    /// Total deliveries attempted.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }

    fn record(&mut self, endpoint: &str, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Retryable => self.failed += 1,
            DeliveryOutcome::Gone => {
                self.failed += 1;
                self.gone.insert(endpoint.to_string());
            }
        }
    }
}

/// Stamp `message` with the current time and deliver it to every subscription.
pub async fn broadcast<D>(
    delivery: &D,
    message: &PushMessage,
    snapshot: &Snapshot,
) -> serde_json::Result<BroadcastReport>
where
    D: PushDelivery + ?Sized,
{
    let payload = message.to_payload(chrono::Utc::now().timestamp())?;
    Ok(broadcast_payload(delivery, &payload, snapshot).await)
}

/// Deliver an already-serialized payload to every subscription.
pub async fn broadcast_payload<D>(delivery: &D, payload: &[u8], snapshot: &Snapshot) -> BroadcastReport
where
    D: PushDelivery + ?Sized,
{
    let deliveries = snapshot.iter().map(|(endpoint, subscription)| async move {
        let outcome = delivery.deliver(subscription, payload).await;
        (endpoint.as_str(), outcome)
    });

    let report = join_all(deliveries)
        .await
        .into_iter()
        .fold(BroadcastReport::default(), |mut report, (endpoint, outcome)| {
            report.record(endpoint, outcome);
            report
        });

    log::info!(
        "[WebPush] Broadcast to {} subscription(s): {} delivered, {} failed, {} gone",
        snapshot.len(),
        report.delivered,
        report.failed,
        report.gone.len()
    );
    report
}
