//! Per-engine sync counters.

use serde::Serialize;

/// Counts accumulated over the lifetime of one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatistics {
    /// Drafts received, each counted once even if retried later.
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// Drafts currently parked with unresolved references.
    pub unresolved: usize,
}

impl SyncStatistics {
    /// One-line summary for logs.
    #[must_use]
    pub fn report_message(&self) -> String {
        format!(
            "Summary: {} drafts were processed in total ({} created, {} updated, {} failed to sync and {} with unresolved references).",
            self.processed, self.created, self.updated, self.failed, self.unresolved
        )
    }
}
