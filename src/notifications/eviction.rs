//! Removal of subscriptions the push service reported as gone.
//!
//! Runs after a broadcast has finished iterating its snapshot, so removal
//! never overlaps the delivery pass. The whole batch is removed under one
//! registry write lock and persisted once.

use std::collections::HashSet;

use super::registry::SubscriptionRegistry;

/// Remove every endpoint in `gone` from `registry`.
///
/// Returns how many were still registered. Endpoints already unsubscribed by
/// a concurrent request are skipped silently.
pub fn evict(registry: &SubscriptionRegistry, gone: &HashSet<String>) -> usize {
    if gone.is_empty() {
        return 0;
    }

    let removed = registry.remove_many(gone.iter().map(String::as_str));
    if removed > 0 {
        log::info!("[WebPush] Evicted {removed} gone subscription(s)");
    }
    if removed < gone.len() {
        log::debug!(
            "[WebPush] {} gone endpoint(s) were already unregistered",
            gone.len() - removed
        );
    }

    removed
}
