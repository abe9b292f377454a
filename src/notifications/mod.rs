//! Web push subscription registry and fan-out delivery.
//!
//! Browsers register their push subscription (endpoint + keys); the relay
//! keeps them in a [`SubscriptionRegistry`] persisted to a JSON file and, on
//! request, broadcasts a VAPID-signed message to all of them.
//!
//! # Architecture
//!
//! ```text
//! POST /api/push
//!     ↓
//! registry.snapshot()            (read lock, caller-owned copy)
//!     ↓
//! broadcast::broadcast()         (one concurrent delivery per subscription)
//!     ↓
//! report.gone  →  eviction::evict()   (one write lock, one save)
//! ```
//!
//! # VAPID Keys
//!
//! A single P-256 ECDSA keypair (VAPID, RFC 8292) signs every delivery. The
//! public key is served to browsers so they can subscribe; the private key
//! never leaves the process.

// Rust guideline compliant 2026-02

pub mod broadcast;
pub mod eviction;
pub mod push;
pub mod registry;
pub mod store;
pub mod vapid;

pub use broadcast::{broadcast, BroadcastReport};
pub use eviction::evict;
pub use push::{DeliveryOutcome, PushDelivery, PushMessage, PushSubscription, SubscriptionKeys, WebPushDelivery};
pub use registry::{RegistryError, SubscriptionRegistry};
pub use store::{PersistenceError, Snapshot, SubscriptionStore};
pub use vapid::VapidKeys;
