//! Push subscription types and the signed delivery capability.
//!
//! Sends encrypted web push messages (RFC 8030, RFC 8291) using VAPID
//! authentication (RFC 8292). The delivery engine only sees the
//! [`PushDelivery`] trait; [`WebPushDelivery`] is the production
//! implementation built on the `web-push` crate plus `reqwest`.

// Rust guideline compliant 2026-02

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::vapid::VapidKeys;

/// Upper bound on a single push service round trip.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// A browser's push subscription as produced by `PushManager.subscribe()`.
///
/// The endpoint is the identity key. Subscriptions are immutable once stored;
/// re-registering the same endpoint replaces the whole value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Client encryption keys.
    pub keys: SubscriptionKeys,
}

/// Encryption material supplied by the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
}

impl PushSubscription {
    /// Build a subscription from its three credential strings.
    pub fn new(
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            keys: SubscriptionKeys {
                p256dh: p256dh.into(),
                auth: auth.into(),
            },
        }
    }
}

/// A broadcast request. Ephemeral, never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Optional icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Optional click-through URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Wire payload handed to the service worker.
#[derive(Debug, Serialize)]
struct NotificationPayload<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    timestamp: i64,
}

impl PushMessage {
    /// Serialize the message with a server-assigned unix timestamp.
    pub fn to_payload(&self, timestamp: i64) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&NotificationPayload {
            title: &self.title,
            body: &self.body,
            icon: self.icon.as_deref(),
            url: self.url.as_deref(),
            timestamp,
        })
    }
}

/// Result of a single delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The push service accepted the message.
    Delivered,
    /// The attempt failed but the subscription may still be valid.
    Retryable,
    /// The push service reported the endpoint will never accept messages again.
    Gone,
}

impl DeliveryOutcome {
    /// Classify a push service HTTP status.
    ///
    /// 404 and 410 both mean the subscription no longer exists on the push
    /// service (RFC 8030 §7.3 uses 410; several services answer 404).
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Delivered,
            404 | 410 => Self::Gone,
            _ => Self::Retryable,
        }
    }
}

/// The signed delivery capability consumed by the broadcast engine.
///
/// Implementations absorb their own failures: every call yields exactly one
/// outcome, never an error.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    /// Attempt one delivery of `payload` to `subscription`.
    async fn deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryOutcome;
}

/// VAPID-signed web push delivery over HTTPS.
///
/// A single `reqwest::Client` is shared across all deliveries for
/// connection pooling.
#[derive(Debug, Clone)]
pub struct WebPushDelivery {
    client: reqwest::Client,
    vapid_private_b64: String,
    subject: String,
    ttl: u32,
}

impl WebPushDelivery {
    /// Create a delivery capability signing as `subject` (a `mailto:` or
    /// `https:` contact) with the given TTL hint in seconds.
    pub fn new(keys: &VapidKeys, subject: impl Into<String>, ttl: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .context("Failed to build push HTTP client")?;
        Ok(Self {
            client,
            vapid_private_b64: keys.private_key_base64url().to_string(),
            subject: subject.into(),
            ttl,
        })
    }

    /// Encrypt, sign, and POST one message. Returns the push service status.
    async fn send(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<u16> {
        use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

        let sub_info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut sig_builder = VapidSignatureBuilder::from_base64(&self.vapid_private_b64, &sub_info)
            .context("Failed to build VAPID signature")?;
        sig_builder.add_claim("sub", self.subject.as_str());
        let sig = sig_builder.build().context("Failed to sign VAPID JWT")?;

        let mut builder = WebPushMessageBuilder::new(&sub_info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(sig);
        builder.set_ttl(self.ttl);

        let message = builder.build().context("Failed to build web push message")?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(urgency) = message.urgency {
            request = request.header("Urgency", urgency.to_string());
        }

        if let Some(topic) = message.topic {
            request = request.header("Topic", topic);
        }

        if let Some(push_payload) = message.payload {
            request = request
                .header("Content-Encoding", push_payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (key, value) in &push_payload.crypto_headers {
                request = request.header(*key, value.as_str());
            }

            request = request.body(push_payload.content);
        }

        let response = request.send().await.context("Web push HTTP request failed")?;
        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            log::debug!("[WebPush] Push service answered HTTP {status}: {body}");
        }

        Ok(status)
    }
}

#[async_trait]
impl PushDelivery for WebPushDelivery {
    async fn deliver(&self, subscription: &PushSubscription, payload: &[u8]) -> DeliveryOutcome {
        let label = endpoint_label(&subscription.endpoint);
        match self.send(subscription, payload).await {
            Ok(status) => {
                let outcome = DeliveryOutcome::from_status(status);
                match outcome {
                    DeliveryOutcome::Delivered => {
                        log::debug!("[WebPush] Delivered to {label}");
                    }
                    DeliveryOutcome::Gone => {
                        log::info!("[WebPush] Subscription expired (HTTP {status}): {label}");
                    }
                    DeliveryOutcome::Retryable => {
                        log::warn!("[WebPush] Send failed (HTTP {status}): {label}");
                    }
                }
                outcome
            }
            Err(e) => {
                log::warn!("[WebPush] Send failed for {label}: {e:#}");
                DeliveryOutcome::Retryable
            }
        }
    }
}

/// Shortened endpoint for log lines. Push endpoints embed long opaque tokens.
pub(crate) fn endpoint_label(endpoint: &str) -> String {
    const MAX_CHARS: usize = 48;
    if endpoint.chars().count() <= MAX_CHARS {
        return endpoint.to_string();
    }
    let head: String = endpoint.chars().take(MAX_CHARS).collect();
    format!("{head}…")
}
