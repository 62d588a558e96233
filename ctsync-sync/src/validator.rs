//! Batch validation before any remote call.

use crate::error::SyncError;
use ctsync_types::{is_blank, SyncDraft};
use std::collections::HashSet;
use tracing::debug;

/// Drafts split into those fit to sync and those rejected.
#[derive(Debug)]
pub struct ValidationOutcome<D> {
    pub valid: Vec<D>,
    pub rejected: Vec<(D, SyncError)>,
}

/// Rejects drafts with a blank key and every repeat of a key already seen in
/// the batch. The first draft carrying a key is kept.
pub fn validate_batch<D: SyncDraft>(drafts: Vec<D>) -> ValidationOutcome<D> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut valid = Vec::with_capacity(drafts.len());
    let mut rejected = Vec::new();

    for (position, draft) in drafts.into_iter().enumerate() {
        let error = match draft.key() {
            key if is_blank(key) => Some(SyncError::BlankKey { position }),
            Some(key) if !seen.insert(key.to_string()) => Some(SyncError::DuplicateKey {
                key: key.to_string(),
                position,
            }),
            _ => None,
        };
        match error {
            Some(error) => {
                debug!("Rejected draft: {}", error);
                rejected.push((draft, error));
            }
            None => valid.push(draft),
        }
    }

    ValidationOutcome { valid, rejected }
}
