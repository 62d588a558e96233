//! Batched id → key lookups.
//!
//! Ids missing from the cache are split into size-bounded chunks, one remote
//! query each. Results feed the [`IdentifierCache`]. Concurrent callers asking
//! for an id whose chunk is already in flight await that chunk instead of
//! issuing their own query.

use crate::cache::{CacheEntry, IdentifierCache};
use crate::error::SyncResult;
use crate::lock;
use crate::query::ResourceKeyIdQuery;
use crate::transport::{CtpClient, CtpRequest, ResourceKeyId};
use ctsync_types::{ReferenceFamily, ResourceId};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Configuration for batched lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupConfig {
    /// Maximum ids per id → key query.
    pub ids_per_chunk: usize,
    /// Maximum keys per key → resource query.
    pub keys_per_chunk: usize,
    /// Maximum bytes of the `in (...)` clause of one query.
    pub max_query_bytes: usize,
    /// Send the n-th chunk of every family as one multi-query.
    pub combine_families: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            ids_per_chunk: 300,
            keys_per_chunk: 60,
            max_query_bytes: 10_000,
            combine_families: false,
        }
    }
}

/// Outcome of a lookup, per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupReport {
    /// Ids with a key.
    pub resolved: HashMap<ResourceId, String>,
    /// Ids the remote has no key for.
    pub absent: HashSet<ResourceId>,
    /// Ids whose chunk failed. They are not cached and will be asked again by
    /// the next lookup.
    pub failed: HashSet<ResourceId>,
}

impl LookupReport {
    /// Whether every id was answered, with or without a key.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, id: ResourceId, entry: CacheEntry) {
        match entry {
            CacheEntry::Resolved(key) => {
                self.resolved.insert(id, key);
            }
            CacheEntry::Absent => {
                self.absent.insert(id);
            }
        }
    }
}

type InFlightKey = (ReferenceFamily, ResourceId);
type ChunkResult = Result<Arc<HashMap<InFlightKey, String>>, String>;
type SharedChunk = Shared<BoxFuture<'static, ChunkResult>>;
type InFlight = Arc<Mutex<HashMap<InFlightKey, SharedChunk>>>;

/// Resolves ids to keys through the cache, querying the remote for misses.
pub struct BatchedLookupClient {
    client: Arc<dyn CtpClient>,
    cache: Arc<IdentifierCache>,
    config: LookupConfig,
    in_flight: InFlight,
}

impl BatchedLookupClient {
    pub fn new(client: Arc<dyn CtpClient>, cache: Arc<IdentifierCache>, config: LookupConfig) -> Self {
        Self {
            client,
            cache,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &Arc<IdentifierCache> {
        &self.cache
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Looks up the keys of `ids` in one family.
    pub async fn fetch(&self, family: ReferenceFamily, ids: impl IntoIterator<Item = ResourceId>) -> LookupReport {
        self.fetch_many(HashMap::from([(family, ids.into_iter().collect())]))
            .await
    }

    /// Looks up the keys of ids in several families at once. Chunks of
    /// different families run in parallel.
    pub async fn fetch_many(&self, requests: HashMap<ReferenceFamily, HashSet<ResourceId>>) -> LookupReport {
        let mut report = LookupReport::default();
        let mut wanted: BTreeMap<ReferenceFamily, Vec<ResourceId>> = BTreeMap::new();

        for (family, ids) in requests {
            let ids: Vec<ResourceId> = ids.into_iter().filter(|id| !id.is_blank()).collect();
            if !ids.is_empty() {
                wanted.entry(family).or_default().extend(ids);
            }
        }
        if wanted.is_empty() {
            return report;
        }

        let waits = self.register(wanted, &mut report);
        let outcomes = join_all(waits.into_iter().map(|(keys, chunk)| async move { (keys, chunk.await) })).await;

        for (keys, outcome) in outcomes {
            match outcome {
                Ok(found) => {
                    for key in keys {
                        if let Some(resource_key) = found.get(&key) {
                            report.resolved.insert(key.1, resource_key.clone());
                        } else {
                            report.absent.insert(key.1);
                        }
                    }
                }
                Err(_) => report.failed.extend(keys.into_iter().map(|(_, id)| id)),
            }
        }
        report
    }

    /// Answers ids from the cache and attaches the rest to an in-flight
    /// chunk, starting new chunks for ids nobody is fetching yet.
    ///
    /// The cache is read under the in-flight lock. A chunk fills the cache
    /// before it leaves the in-flight map, so every id is either cached or
    /// still in flight here.
    fn register(
        &self,
        wanted: BTreeMap<ReferenceFamily, Vec<ResourceId>>,
        report: &mut LookupReport,
    ) -> Vec<(Vec<InFlightKey>, SharedChunk)> {
        let mut waits = Vec::new();
        let mut in_flight = lock(&self.in_flight);

        let mut fresh: Vec<(ReferenceFamily, Vec<Vec<ResourceId>>)> = Vec::new();
        for (family, mut ids) in wanted {
            ids.sort();
            ids.dedup();
            let mut unclaimed = Vec::new();
            for id in ids {
                if let Some(entry) = self.cache.entry(id.as_str()) {
                    report.record(id, entry);
                    continue;
                }
                match in_flight.get(&(family, id.clone())) {
                    Some(pending) => waits.push((vec![(family, id)], pending.clone())),
                    None => unclaimed.push(id),
                }
            }
            if !unclaimed.is_empty() {
                let chunks = chunk_ids(&unclaimed, self.config.ids_per_chunk, self.config.max_query_bytes);
                fresh.push((family, chunks));
            }
        }

        for batch in self.plan_batches(fresh) {
            let keys: Vec<InFlightKey> = batch
                .iter()
                .flat_map(|(family, ids)| ids.iter().map(move |id| (*family, id.clone())))
                .collect();
            let chunk = run_batch(
                self.client.clone(),
                self.cache.clone(),
                self.in_flight.clone(),
                batch,
            )
            .boxed()
            .shared();
            for key in &keys {
                in_flight.insert(key.clone(), chunk.clone());
            }
            waits.push((keys, chunk));
        }
        waits
    }

    /// Groups chunks into requests: one chunk per request, or the n-th chunk
    /// of every family together when families are combined.
    fn plan_batches(
        &self,
        fresh: Vec<(ReferenceFamily, Vec<Vec<ResourceId>>)>,
    ) -> Vec<Vec<(ReferenceFamily, Vec<ResourceId>)>> {
        if !self.config.combine_families {
            return fresh
                .into_iter()
                .flat_map(|(family, chunks)| chunks.into_iter().map(move |chunk| vec![(family, chunk)]))
                .collect();
        }

        let rounds = fresh.iter().map(|(_, chunks)| chunks.len()).max().unwrap_or(0);
        let mut batches: Vec<Vec<(ReferenceFamily, Vec<ResourceId>)>> = vec![Vec::new(); rounds];
        for (family, chunks) in fresh {
            for (round, chunk) in chunks.into_iter().enumerate() {
                batches[round].push((family, chunk));
            }
        }
        batches
    }
}

/// Splits `ids` into chunks of at most `max_count` ids whose quoted,
/// comma-separated form fits in `max_bytes`. A single id longer than
/// `max_bytes` still gets a chunk of its own.
pub fn chunk_ids(ids: &[ResourceId], max_count: usize, max_bytes: usize) -> Vec<Vec<ResourceId>> {
    let max_count = max_count.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<ResourceId> = Vec::new();
    let mut current_bytes = 0;

    for id in ids {
        // "id", plus the separating ", "
        let cost = id.as_str().len() + 4;
        if !current.is_empty() && (current.len() == max_count || current_bytes + cost > max_bytes) {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += cost;
        current.push(id.clone());
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

async fn run_batch(
    client: Arc<dyn CtpClient>,
    cache: Arc<IdentifierCache>,
    in_flight: InFlight,
    batch: Vec<(ReferenceFamily, Vec<ResourceId>)>,
) -> ChunkResult {
    let outcome = execute_batch(client.as_ref(), &batch).await;

    let result = match outcome {
        Ok(results) => {
            let mut found = HashMap::new();
            for ((family, ids), resources) in batch.iter().zip(results) {
                for resource in resources {
                    if let Some(key) = resource.key.filter(|k| !k.trim().is_empty()) {
                        cache.put(resource.id.clone(), key.clone());
                        found.insert((*family, resource.id), key);
                    }
                }
                for id in ids {
                    if !found.contains_key(&(*family, id.clone())) {
                        cache.put_absent(id.clone());
                    }
                }
                debug!("Resolved keys for {} {} ids", ids.len(), family);
            }
            Ok(Arc::new(found))
        }
        Err(e) => {
            let count: usize = batch.iter().map(|(_, ids)| ids.len()).sum();
            warn!("Failed to fetch keys for {} ids: {}", count, e);
            Err(e.to_string())
        }
    };

    let mut in_flight = lock(&in_flight);
    for (family, ids) in &batch {
        for id in ids {
            in_flight.remove(&(*family, id.clone()));
        }
    }
    result
}

async fn execute_batch(
    client: &dyn CtpClient,
    batch: &[(ReferenceFamily, Vec<ResourceId>)],
) -> SyncResult<Vec<Vec<ResourceKeyId>>> {
    let queries: Vec<ResourceKeyIdQuery> = batch
        .iter()
        .map(|(family, ids)| ResourceKeyIdQuery::by_ids(*family, ids))
        .collect();

    if let [query] = queries.as_slice() {
        let results = client
            .execute(CtpRequest::KeyLookup(query.clone()))
            .await?
            .into_key_ids()?;
        return Ok(vec![results]);
    }
    client
        .execute(CtpRequest::BatchedKeyLookup(queries))
        .await?
        .into_batched_key_ids()
}
