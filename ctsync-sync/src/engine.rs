//! Sync engine: the pipeline for one resource family.
//!
//! Each batch of drafts is validated, resolved, matched to its targets by
//! key, then created or diffed and updated. Drafts with unresolved
//! references are parked in the ledger and retried later. A failure is
//! contained to the draft that caused it.

use crate::document_store::DocumentStore;
use crate::error::{SyncError, SyncResult};
use crate::executor::BatchExecutor;
use crate::ledger::{UnresolvedReferenceLedger, WaitingToBeResolved};
use crate::lock;
use crate::metadata::{MetadataProvider, NoMetadata};
use crate::options::SyncOptions;
use crate::resolver::{ReferenceResolver, ResolutionGap};
use crate::statistics::SyncStatistics;
use crate::transport::{CtpClient, CtpRequest, CtpResponse};
use crate::validator::validate_batch;
use ctsync_diff::Synthesizer;
use ctsync_types::{ReferenceFamily, ResourceHandle, SyncDraft, SyncResource};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

enum Outcome {
    Created,
    Updated,
    Unchanged,
    Failed,
}

/// Syncs drafts of type `D` into resources of type `R`.
pub struct SyncEngine<D, R> {
    family: ReferenceFamily,
    client: Arc<dyn CtpClient>,
    options: SyncOptions<D, R>,
    resolver: ReferenceResolver<D>,
    target_resolver: Option<ReferenceResolver<R>>,
    synthesizer: Synthesizer<R, D>,
    metadata: Arc<dyn MetadataProvider<D>>,
    executor: BatchExecutor,
    ledger: Option<UnresolvedReferenceLedger<D>>,
    statistics: Arc<RwLock<SyncStatistics>>,
    parked: Mutex<HashSet<String>>,
}

impl<D, R> SyncEngine<D, R>
where
    D: SyncDraft + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    R: SyncResource + DeserializeOwned + Send + Sync + 'static,
{
    /// Creates an engine writing to `client`.
    ///
    /// `resolver` normalizes the drafts; `synthesizer` diffs each draft
    /// against its current resource.
    pub fn new(
        family: ReferenceFamily,
        client: Arc<dyn CtpClient>,
        resolver: ReferenceResolver<D>,
        synthesizer: Synthesizer<R, D>,
        options: SyncOptions<D, R>,
    ) -> SyncResult<Self> {
        if options.batch_size == 0 {
            return Err(SyncError::Config("batch_size must be at least 1".into()));
        }
        let executor = BatchExecutor::new(client.clone(), options.executor)?;
        Ok(Self {
            family,
            client,
            options,
            resolver,
            target_resolver: None,
            synthesizer,
            metadata: Arc::new(NoMetadata),
            executor,
            ledger: None,
            statistics: Arc::new(RwLock::new(SyncStatistics::default())),
            parked: Mutex::new(HashSet::new()),
        })
    }

    /// Resolves the references of fetched targets too, so both sides of a
    /// diff carry keys.
    #[must_use]
    pub fn with_target_resolver(mut self, resolver: ReferenceResolver<R>) -> Self {
        self.target_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, provider: impl MetadataProvider<D> + 'static) -> Self {
        self.metadata = Arc::new(provider);
        self
    }

    /// Parks unresolved drafts in `store`, under the configured container.
    #[must_use]
    pub fn with_ledger(mut self, store: Arc<dyn DocumentStore>) -> Self {
        let container = self.options.ledger_container.clone();
        self.ledger = Some(UnresolvedReferenceLedger::with_container(store, container));
        self
    }

    pub fn family(&self) -> ReferenceFamily {
        self.family
    }

    pub fn options(&self) -> &SyncOptions<D, R> {
        &self.options
    }

    pub fn ledger(&self) -> Option<&UnresolvedReferenceLedger<D>> {
        self.ledger.as_ref()
    }

    /// A snapshot of the counters.
    pub async fn statistics(&self) -> SyncStatistics {
        *self.statistics.read().await
    }

    /// Keys of the drafts currently parked, sorted.
    pub fn parked_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.parked).iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Syncs `drafts` in batches of the configured size.
    pub async fn sync(&self, drafts: Vec<D>) -> SyncStatistics {
        info!("Starting sync of {} {} drafts", drafts.len(), self.family);
        let mut drafts = drafts.into_iter().peekable();
        while drafts.peek().is_some() {
            let batch: Vec<D> = drafts.by_ref().take(self.options.batch_size).collect();
            self.process(batch, true).await;
        }

        let stats = self.statistics().await;
        info!("{}", stats.report_message());
        stats
    }

    /// Fetches every parked draft back from the ledger and syncs it again.
    ///
    /// Absent markers of the ids they wait for are dropped first, so those
    /// ids are asked again.
    pub async fn retry_parked(&self) -> SyncStatistics {
        let keys = self.parked_keys();
        let Some(ledger) = &self.ledger else {
            return self.statistics().await;
        };
        if keys.is_empty() {
            return self.statistics().await;
        }

        match ledger.fetch(&keys).await {
            Ok(entries) => {
                info!("Retrying {} parked {} drafts", entries.len(), self.family);
                let cache = self.resolver.cache();
                for entry in &entries {
                    for id in &entry.missing_reference_ids {
                        cache.forget_absent(id);
                    }
                }
                let mut drafts = entries.into_iter().map(|entry| entry.draft).peekable();
                while drafts.peek().is_some() {
                    let batch: Vec<D> = drafts.by_ref().take(self.options.batch_size).collect();
                    self.process(batch, false).await;
                }
            }
            Err(e) => warn!("Failed to fetch parked {} drafts: {}", self.family, e),
        }
        self.statistics().await
    }

    async fn process(&self, drafts: Vec<D>, first_seen: bool) {
        let mut delta = SyncStatistics::default();
        if first_seen {
            delta.processed = drafts.len();
        }

        let validation = validate_batch(drafts);
        for (draft, error) in &validation.rejected {
            self.report_error(error, Some(draft), None);
        }
        delta.failed += validation.rejected.len();

        let resolution = self.resolver.resolve(validation.valid).await;
        for warning in &resolution.warnings {
            self.options.apply_warning_callback(warning);
        }
        for gap in resolution.unresolved {
            if !self.park(gap).await {
                delta.failed += 1;
            }
        }
        for draft in &resolution.resolved {
            self.unpark(draft).await;
        }

        let drafts = resolution.resolved;
        let (mut targets, mut fetch_failures) = self.fetch_targets(&drafts).await;

        let mut pairs = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let key = draft.key().unwrap_or_default().to_string();
            if let Some(error) = fetch_failures.remove(&key) {
                self.report_error(&error, Some(&draft), None);
                delta.failed += 1;
                continue;
            }
            let target = targets.remove(&key);
            pairs.push((draft, target));
        }

        let outcomes = join_all(pairs.into_iter().map(|(draft, target)| self.sync_one(draft, target))).await;
        for outcome in outcomes {
            match outcome {
                Outcome::Created => delta.created += 1,
                Outcome::Updated => delta.updated += 1,
                Outcome::Failed => delta.failed += 1,
                Outcome::Unchanged => {}
            }
        }

        let mut stats = self.statistics.write().await;
        stats.processed += delta.processed;
        stats.created += delta.created;
        stats.updated += delta.updated;
        stats.failed += delta.failed;
        stats.unresolved = lock(&self.parked).len();
        debug!(
            "Batch done for {}: {} created, {} updated, {} failed",
            self.family, delta.created, delta.updated, delta.failed
        );
    }

    // ── Lazy resolution ──────────────────────────────────────────

    async fn park(&self, gap: ResolutionGap<D>) -> bool {
        let key = gap.draft.key().unwrap_or_default().to_string();
        let gap_error = SyncError::ResolutionGap {
            key: key.clone(),
            references: gap.references.iter().map(ToString::to_string).collect(),
        };
        warn!("{}", gap_error);
        self.options.apply_warning_callback(&gap_error.to_string());

        if let Some(ledger) = &self.ledger {
            let entry = WaitingToBeResolved::new(gap.draft.clone(), gap.missing_ids());
            if let Err(e) = ledger.save(entry).await {
                self.report_error(&e, Some(&gap.draft), None);
                return false;
            }
        }
        lock(&self.parked).insert(key);
        true
    }

    async fn unpark(&self, draft: &D) {
        let Some(key) = draft.key() else {
            return;
        };
        if !lock(&self.parked).remove(key) {
            return;
        }
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.delete(key).await {
                warn!("Failed to remove resolved draft {} from the ledger: {}", key, e);
                self.options.apply_error_callback(&e, Some(draft), None);
            }
        }
    }

    // ── Targets ──────────────────────────────────────────────────

    /// Fetches the current resources matching the drafts' keys, in chunks.
    /// Keys whose chunk failed are returned with the error.
    async fn fetch_targets(&self, drafts: &[D]) -> (HashMap<String, R>, HashMap<String, SyncError>) {
        let keys: Vec<String> = drafts.iter().filter_map(|d| d.key()).map(str::to_string).collect();
        let mut targets = HashMap::new();
        let mut failures = HashMap::new();
        if keys.is_empty() {
            return (targets, failures);
        }

        let chunk_size = self.options.lookup.keys_per_chunk.max(1);
        let requests = keys.chunks(chunk_size).map(|chunk| async move {
            let result = self
                .client
                .execute(CtpRequest::FetchByKeys {
                    family: self.family,
                    keys: chunk.to_vec(),
                })
                .await
                .and_then(CtpResponse::into_resources);
            (chunk, result)
        });

        for (chunk, result) in join_all(requests).await {
            match result {
                Ok(resources) => {
                    for resource in resources {
                        let key = resource.get("key").and_then(Value::as_str).map(str::to_string);
                        match (key, serde_json::from_value::<R>(resource)) {
                            (Some(key), Ok(target)) => {
                                targets.insert(key, target);
                            }
                            (Some(key), Err(e)) => {
                                failures.insert(key, SyncError::Serialization(e));
                            }
                            (None, _) => debug!("Ignoring {} without key", self.family),
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch {} {} targets: {}", chunk.len(), self.family, e);
                    for key in chunk {
                        failures.insert(
                            key.clone(),
                            SyncError::RemoteCall(format!("failed to fetch {} '{}': {}", self.family, key, e)),
                        );
                    }
                }
            }
        }

        if let Some(resolver) = &self.target_resolver {
            if !targets.is_empty() {
                let outcome = resolver.resolve(targets.into_values().collect()).await;
                if !outcome.unresolved.is_empty() {
                    debug!("{} {} targets keep id-references", outcome.unresolved.len(), self.family);
                }
                targets = outcome
                    .resolved
                    .into_iter()
                    .chain(outcome.unresolved.into_iter().map(|gap| gap.draft))
                    .filter_map(|target| target.key().map(str::to_string).map(|key| (key, target)))
                    .collect();
            }
        }
        (targets, failures)
    }

    // ── Create / update ──────────────────────────────────────────

    async fn sync_one(&self, draft: D, target: Option<R>) -> Outcome {
        match target {
            None => self.create(draft).await,
            Some(target) => self.update(draft, target).await,
        }
    }

    async fn create(&self, draft: D) -> Outcome {
        let Some(draft) = self.options.apply_before_create(draft) else {
            return Outcome::Unchanged;
        };
        let payload = match serde_json::to_value(&draft) {
            Ok(payload) => payload,
            Err(e) => {
                self.report_error(&SyncError::Serialization(e), Some(&draft), None);
                return Outcome::Failed;
            }
        };

        let created = self
            .client
            .execute(CtpRequest::Create {
                family: self.family,
                draft: payload,
            })
            .await
            .and_then(CtpResponse::into_resource);
        match created {
            Ok(Some(_)) => {
                debug!("Created {} {}", self.family, draft.key().unwrap_or_default());
                Outcome::Created
            }
            Ok(None) => {
                let error = SyncError::Protocol("create returned no resource".into());
                self.report_error(&error, Some(&draft), None);
                Outcome::Failed
            }
            Err(e) => {
                self.report_error(&e, Some(&draft), None);
                Outcome::Failed
            }
        }
    }

    async fn update(&self, draft: D, target: R) -> Outcome {
        let context = match self.metadata.context_for(&draft).await {
            Ok(context) => context,
            Err(e) => {
                self.report_error(&e, Some(&draft), Some(&target));
                return Outcome::Failed;
            }
        };
        let actions = match self.synthesizer.synthesize(&target, &draft, &context) {
            Ok(actions) => actions,
            Err(e) => {
                self.report_error(&SyncError::Synthesis(e), Some(&draft), Some(&target));
                return Outcome::Failed;
            }
        };
        let actions = self.options.apply_before_update(actions, &draft, &target);
        if actions.is_empty() {
            return Outcome::Unchanged;
        }

        let report = self
            .executor
            .apply(self.family, ResourceHandle::of(&target), actions)
            .await;
        match report.failure {
            Some(e) => {
                self.report_error(&e, Some(&draft), Some(&target));
                Outcome::Failed
            }
            None => {
                debug!(
                    "Updated {} {} with {} actions in {} requests",
                    self.family,
                    report.handle.id,
                    report.actions_applied,
                    report.chunks_applied
                );
                Outcome::Updated
            }
        }
    }

    fn report_error(&self, error: &SyncError, draft: Option<&D>, resource: Option<&R>) {
        let key = draft.and_then(|d| d.key()).unwrap_or("<blank>");
        warn!("Failed to sync {} {}: {}", self.family, key, error);
        self.options.apply_error_callback(error, draft, resource);
    }
}
