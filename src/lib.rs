//! webpush-relay - browser push subscription relay.
//!
//! Accepts push subscription registrations, stores them durably, and fans
//! VAPID-signed web push messages out to every registered endpoint, pruning
//! endpoints the push service reports as gone.
//!
//! # Modules
//!
//! - [`notifications`] - subscription registry, persistence, broadcast, eviction
//! - [`server`] - HTTP API (axum)
//! - [`config`] - environment configuration
//! - [`commands`] - non-server subcommands (key generation)

pub mod commands;
pub mod config;
pub mod notifications;
pub mod server;

pub use config::Config;
pub use notifications::{SubscriptionRegistry, SubscriptionStore, VapidKeys};
