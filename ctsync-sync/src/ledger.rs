//! Durable parking for drafts whose references could not be resolved.
//!
//! Entries live in a dedicated container of a [`DocumentStore`], keyed by the
//! SHA-256 hex digest of the draft key so arbitrary keys fit the store's key
//! constraints. A later pass fetches them back, retries resolution and deletes
//! the ones that succeed.

use crate::document_store::DocumentStore;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use ctsync_types::SyncDraft;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Container used when none is configured.
pub const DEFAULT_LEDGER_CONTAINER: &str = "ctsync.UnresolvedReferenceLedger.drafts";

/// Maximum entries examined per cleanup round.
pub const CLEANUP_PAGE_SIZE: usize = 500;

/// A parked draft and the ids it is waiting for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingToBeResolved<D> {
    pub draft: D,
    pub missing_reference_ids: BTreeSet<String>,
}

impl<D> WaitingToBeResolved<D> {
    pub fn new(draft: D, missing_reference_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            draft,
            missing_reference_ids: missing_reference_ids.into_iter().collect(),
        }
    }
}

/// Counts from one cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStatistics {
    pub deleted: usize,
    pub failed: usize,
}

/// Hashes a draft key into a ledger key.
#[must_use]
pub fn ledger_key(draft_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(draft_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Keyed storage of [`WaitingToBeResolved`] drafts.
pub struct UnresolvedReferenceLedger<D> {
    store: Arc<dyn DocumentStore>,
    container: String,
    _draft: PhantomData<fn() -> D>,
}

impl<D> UnresolvedReferenceLedger<D>
where
    D: SyncDraft + Serialize + DeserializeOwned + Send + Sync,
{
    /// A ledger in the default container.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_container(store, DEFAULT_LEDGER_CONTAINER)
    }

    pub fn with_container(store: Arc<dyn DocumentStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
            _draft: PhantomData,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Fetches the entries parked under the given draft keys. Keys with no
    /// entry are skipped.
    pub async fn fetch<I, S>(&self, draft_keys: I) -> SyncResult<Vec<WaitingToBeResolved<D>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hashed: Vec<String> = draft_keys
            .into_iter()
            .map(|k| ledger_key(k.as_ref()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if hashed.is_empty() {
            return Ok(Vec::new());
        }

        let documents = self.store.fetch(&self.container, &hashed).await.map_err(|e| {
            SyncError::Storage(format!(
                "failed to fetch {} unresolved entries: {e}",
                hashed.len()
            ))
        })?;
        documents
            .into_iter()
            .map(|document| {
                serde_json::from_value(document.value).map_err(|e| {
                    SyncError::Storage(format!(
                        "failed to decode unresolved entry with key '{}': {e}",
                        document.key
                    ))
                })
            })
            .collect()
    }

    /// Parks `entry`, replacing any entry with the same draft key.
    pub async fn save(&self, entry: WaitingToBeResolved<D>) -> SyncResult<WaitingToBeResolved<D>> {
        let draft_key = entry
            .draft
            .key()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SyncError::BlankKey { position: 0 })?;
        let hashed = ledger_key(draft_key);

        let value = serde_json::to_value(&entry)?;
        self.store
            .upsert(&self.container, &hashed, value)
            .await
            .map_err(|e| {
                SyncError::Storage(format!(
                    "failed to save unresolved entry with key '{hashed}': {e}"
                ))
            })?;
        debug!("Parked draft {} with {} missing references", draft_key, entry.missing_reference_ids.len());
        Ok(entry)
    }

    /// Removes the entry parked under `draft_key`, returning it if present.
    pub async fn delete(&self, draft_key: &str) -> SyncResult<Option<WaitingToBeResolved<D>>> {
        let hashed = ledger_key(draft_key);
        let removed = self
            .store
            .delete(&self.container, &hashed)
            .await
            .map_err(|e| {
                SyncError::Storage(format!(
                    "failed to delete unresolved entry with key '{hashed}': {e}"
                ))
            })?;
        removed
            .map(|document| serde_json::from_value(document.value))
            .transpose()
            .map_err(SyncError::from)
    }

    /// Deletes every entry last modified before `older_than`.
    ///
    /// Entries are examined in pages of [`CLEANUP_PAGE_SIZE`]. A failed
    /// deletion is counted and the run continues; a failed page query ends it.
    pub async fn cleanup(&self, older_than: DateTime<Utc>) -> CleanupStatistics {
        let mut stats = CleanupStatistics::default();

        loop {
            let page = match self
                .store
                .query_older_than(&self.container, older_than, CLEANUP_PAGE_SIZE)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to list unresolved entries in {}: {}", self.container, e);
                    break;
                }
            };
            if page.is_empty() {
                break;
            }

            let page_len = page.len();
            let results = join_all(page.iter().map(|document| self.store.delete(&self.container, &document.key))).await;
            let mut deleted_this_round = 0;
            for (document, result) in page.iter().zip(results) {
                match result {
                    Ok(_) => deleted_this_round += 1,
                    Err(e) => {
                        warn!("Failed to delete unresolved entry {}: {}", document.key, e);
                        stats.failed += 1;
                    }
                }
            }
            stats.deleted += deleted_this_round;

            if page_len < CLEANUP_PAGE_SIZE || deleted_this_round == 0 {
                break;
            }
        }

        info!(
            "Cleaned up unresolved entries in {}: {} deleted, {} failed",
            self.container, stats.deleted, stats.failed
        );
        stats
    }
}
