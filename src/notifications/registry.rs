//! In-memory subscription registry.
//!
//! The registry is the single owner of every stored [`PushSubscription`].
//! It guards the endpoint → subscription map with a reader/writer lock:
//! `snapshot`/`count` take the read side and may run concurrently, while
//! `upsert`/`remove` take the write side.
//!
//! Each effective mutation is followed by a save through the optional
//! [`SubscriptionStore`]. Saves are serialized by a separate mutex and each
//! one snapshots the live map while holding it, so concurrent mutations can
//! never leave an older set on disk after a newer one.
//!
//! All methods do blocking work (file I/O on mutation); async callers should
//! go through `tokio::task::spawn_blocking`.

use std::sync::{Mutex, PoisonError, RwLock};

#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use super::push::{endpoint_label, PushSubscription};
use super::store::{PersistenceError, Snapshot, SubscriptionStore};

/// Rejected registry mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Endpoints are the identity key and may not be empty.
    #[error("subscription endpoint must not be empty")]
    EmptyEndpoint,
}

/// Concurrency-safe endpoint → subscription map with write-through persistence.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<Snapshot>,
    store: Option<SubscriptionStore>,
    persist_lock: Mutex<()>,
    #[cfg(test)]
    saves: AtomicUsize,
}

impl SubscriptionRegistry {
    /// Registry with no backing file. Used by tests and ephemeral setups.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Registry backed by `store`, seeded from its current contents.
    ///
    /// A corrupt or unreadable file is logged and the registry starts empty;
    /// the next successful save overwrites it.
    pub fn open(store: SubscriptionStore) -> Self {
        let entries = match store.load() {
            Ok(entries) => {
                if !entries.is_empty() {
                    log::info!(
                        "Loaded {} subscription(s) from {}",
                        entries.len(),
                        store.path().display()
                    );
                }
                entries
            }
            Err(e @ PersistenceError::CorruptState { .. }) => {
                log::warn!("{e}; starting with an empty subscription set");
                Snapshot::new()
            }
            Err(e) => {
                log::warn!("Failed to load subscriptions ({e}); starting with an empty subscription set");
                Snapshot::new()
            }
        };

        Self {
            entries: RwLock::new(entries),
            store: Some(store),
            ..Self::default()
        }
    }

    /// Insert or replace the subscription for its endpoint (last write wins).
    pub fn upsert(&self, subscription: PushSubscription) -> Result<(), RegistryError> {
        if subscription.endpoint.is_empty() {
            return Err(RegistryError::EmptyEndpoint);
        }

        let label = endpoint_label(&subscription.endpoint);
        let count = {
            let mut entries = self.write();
            entries.insert(subscription.endpoint.clone(), subscription);
            entries.len()
        };
        log::info!("[WebPush] Subscribed {label} ({count} active)");

        self.persist();
        Ok(())
    }

    /// Remove the subscription for `endpoint`. Returns whether it existed.
    ///
    /// Nothing is written to disk when the endpoint was unknown.
    pub fn remove(&self, endpoint: &str) -> bool {
        let existed = self.write().remove(endpoint).is_some();
        if existed {
            log::info!("[WebPush] Unsubscribed {}", endpoint_label(endpoint));
            self.persist();
        }
        existed
    }

    /// Remove every listed endpoint under one write lock.
    ///
    /// Returns how many were actually present. At most one save is performed
    /// for the whole batch.
    pub fn remove_many<'a, I>(&self, endpoints: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let removed = {
            let mut entries = self.write();
            endpoints
                .into_iter()
                .filter(|endpoint| entries.remove(*endpoint).is_some())
                .count()
        };
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Caller-owned copy of the current entries.
    ///
    /// The lock is released before returning, so iteration never blocks
    /// writers and never observes later mutations.
    pub fn snapshot(&self) -> Snapshot {
        self.read().clone()
    }

    /// Number of active subscriptions.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    /// Whether a subscription exists for `endpoint`.
    pub fn contains(&self, endpoint: &str) -> bool {
        self.read().contains_key(endpoint)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Snapshot> {
        // Subscriptions are replaced whole, so a panicked writer cannot leave a torn entry.
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Snapshot> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the live set to the backing store. Failures are logged only.
    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();

        #[cfg(test)]
        self.saves.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = store.save(&snapshot) {
            log::warn!("[WebPush] Failed to persist subscriptions: {e}");
        }
    }

    #[cfg(test)]
    pub(crate) fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}
