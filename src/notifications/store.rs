//! Durable subscription state.
//!
//! The whole subscription set lives in one human-readable JSON file mapping
//! endpoint → subscription. Every save rewrites it wholesale: the document is
//! written to a temporary sibling file, synced, then renamed over the target,
//! so a crash mid-save leaves either the old file or the new one, never a
//! truncated mix.
//!
//! # Storage structure
//!
//! ```text
//! data/subscriptions.json
//! {
//!   "https://push.example/abc": {
//!     "endpoint": "https://push.example/abc",
//!     "keys": { "p256dh": "BBp...", "auth": "xyz=" }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use super::push::PushSubscription;

/// Point-in-time mapping from endpoint to subscription.
pub type Snapshot = HashMap<String, PushSubscription>;

/// Failure loading or saving the subscription file.
///
/// Never fatal: callers log it and carry on with in-memory state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem error while reading or writing.
    #[error("failed to {action} subscription file {}: {source}", path.display())]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The file exists but is not a valid subscription document.
    #[error("subscription file {} is corrupt: {source}", path.display())]
    CorruptState {
        /// The corrupt file.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// The in-memory set could not be encoded.
    #[error("failed to serialize subscriptions: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// JSON file holding the subscription set.
#[derive(Debug, Clone)]
pub struct SubscriptionStore {
    path: PathBuf,
}

impl SubscriptionStore {
    /// Store backed by the file at `path`. Nothing is touched until `load`/`save`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted subscription set.
    ///
    /// A missing file is a first run, not a fault, and yields an empty set.
    /// So does an empty file.
    pub fn load(&self) -> Result<Snapshot, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "Subscription file {} not found, starting empty",
                    self.path.display()
                );
                return Ok(Snapshot::new());
            }
            Err(source) => {
                return Err(PersistenceError::Io {
                    action: "read",
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Snapshot::new());
        }

        let stored: Snapshot =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::CorruptState {
                path: self.path.clone(),
                source,
            })?;
        Ok(self.rekey_by_endpoint(stored))
    }

    /// Key every entry by its own `endpoint`.
    ///
    /// A hand-edited file can carry a map key that disagrees with the entry's
    /// endpoint; left alone, a later upsert would add a second entry for the
    /// same endpoint. The inner endpoint wins.
    fn rekey_by_endpoint(&self, stored: Snapshot) -> Snapshot {
        let mut snapshot = Snapshot::with_capacity(stored.len());
        for (key, subscription) in stored {
            if key != subscription.endpoint {
                log::warn!(
                    "Subscription file {} lists {} under key {}; keying it by its endpoint",
                    self.path.display(),
                    subscription.endpoint,
                    key
                );
            }
            snapshot.insert(subscription.endpoint.clone(), subscription);
        }
        snapshot
    }

    /// Atomically replace the persisted set with `snapshot`.
    ///
    /// Creates the containing directory if needed.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| PersistenceError::Io {
            action: "create directory for",
            path: dir.to_path_buf(),
            source,
        })?;

        let content = serde_json::to_vec_pretty(snapshot).map_err(PersistenceError::Serialize)?;

        let io_err = |action: &'static str| {
            let path = self.path.clone();
            move |source: io::Error| PersistenceError::Io {
                action,
                path,
                source,
            }
        };

        // Same directory as the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err("create temp file for"))?;
        tmp.write_all(&content).map_err(io_err("write"))?;
        tmp.as_file().sync_all().map_err(io_err("sync"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))
                .map_err(io_err("set permissions on"))?;
        }

        tmp.persist(&self.path)
            .map_err(|e| io_err("replace")(e.error))?;

        log::debug!(
            "Saved {} subscription(s) to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}
