//! Remote transport abstraction.
//!
//! Defines the one trait every remote backend implements, allowing the sync
//! layer to run against the commerce platform API or an in-memory double.
//! Timeouts and retry policy belong to the implementation; a returned error is
//! terminal for the request that produced it.

use crate::document_store::StoredDocument;
use crate::error::{SyncError, SyncResult};
use crate::query::ResourceKeyIdQuery;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ctsync_types::{ReferenceFamily, ResourceId, UpdateAction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `id` and `key` of one remote resource, as returned by a lookup query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceKeyId {
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A request to the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum CtpRequest {
    /// One id/key lookup query.
    KeyLookup(ResourceKeyIdQuery),
    /// Several lookup queries in a single round trip.
    BatchedKeyLookup(Vec<ResourceKeyIdQuery>),
    /// Fetches one resource by key.
    FetchByKey { family: ReferenceFamily, key: String },
    /// Fetches every resource whose key is in the set.
    FetchByKeys { family: ReferenceFamily, keys: Vec<String> },
    /// Creates a resource from a draft payload.
    Create { family: ReferenceFamily, draft: Value },
    /// Applies actions to a resource at the given version.
    Update {
        family: ReferenceFamily,
        id: ResourceId,
        version: u64,
        actions: Vec<UpdateAction>,
    },
    /// Deletes a resource at the given version.
    Delete {
        family: ReferenceFamily,
        id: ResourceId,
        version: u64,
    },
    /// Creates or replaces a custom object.
    UpsertDocument {
        container: String,
        key: String,
        value: Value,
    },
    /// Fetches custom objects by key.
    FetchDocuments { container: String, keys: Vec<String> },
    /// Deletes a custom object.
    DeleteDocument { container: String, key: String },
    /// Lists custom objects last modified before `cutoff`, oldest first.
    QueryDocuments {
        container: String,
        cutoff: DateTime<Utc>,
        limit: usize,
    },
}

impl CtpRequest {
    /// Short name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeyLookup(_) => "key-lookup",
            Self::BatchedKeyLookup(_) => "batched-key-lookup",
            Self::FetchByKey { .. } => "fetch-by-key",
            Self::FetchByKeys { .. } => "fetch-by-keys",
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::UpsertDocument { .. } => "upsert-document",
            Self::FetchDocuments { .. } => "fetch-documents",
            Self::DeleteDocument { .. } => "delete-document",
            Self::QueryDocuments { .. } => "query-documents",
        }
    }
}

/// A response from the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum CtpResponse {
    /// Results of a [`CtpRequest::KeyLookup`].
    KeyIds(Vec<ResourceKeyId>),
    /// Results of a [`CtpRequest::BatchedKeyLookup`], one list per query in
    /// request order.
    BatchedKeyIds(Vec<Vec<ResourceKeyId>>),
    /// A single resource; `None` when it does not exist.
    Resource(Option<Value>),
    /// A list of resources.
    Resources(Vec<Value>),
    /// A single custom object; `None` when it does not exist.
    Document(Option<StoredDocument>),
    /// A list of custom objects.
    Documents(Vec<StoredDocument>),
}

impl CtpResponse {
    fn unexpected(&self, expected: &str) -> SyncError {
        SyncError::Protocol(format!("expected {expected} response, got {self:?}"))
    }

    pub fn into_key_ids(self) -> SyncResult<Vec<ResourceKeyId>> {
        match self {
            Self::KeyIds(results) => Ok(results),
            other => Err(other.unexpected("key-id")),
        }
    }

    pub fn into_batched_key_ids(self) -> SyncResult<Vec<Vec<ResourceKeyId>>> {
        match self {
            Self::BatchedKeyIds(results) => Ok(results),
            other => Err(other.unexpected("batched key-id")),
        }
    }

    pub fn into_resource(self) -> SyncResult<Option<Value>> {
        match self {
            Self::Resource(resource) => Ok(resource),
            other => Err(other.unexpected("resource")),
        }
    }

    pub fn into_resources(self) -> SyncResult<Vec<Value>> {
        match self {
            Self::Resources(resources) => Ok(resources),
            other => Err(other.unexpected("resource list")),
        }
    }

    pub fn into_document(self) -> SyncResult<Option<StoredDocument>> {
        match self {
            Self::Document(document) => Ok(document),
            other => Err(other.unexpected("document")),
        }
    }

    pub fn into_documents(self) -> SyncResult<Vec<StoredDocument>> {
        match self {
            Self::Documents(documents) => Ok(documents),
            other => Err(other.unexpected("document list")),
        }
    }
}

/// A client of the remote commerce platform.
#[async_trait]
pub trait CtpClient: Send + Sync {
    /// Executes one request and waits for its response.
    async fn execute(&self, request: CtpRequest) -> SyncResult<CtpResponse>;
}

/// An in-memory remote store for testing.
pub mod mock {
    use super::*;
    use crate::lock;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;
    use std::time::Duration;

    type FailurePredicate = Box<dyn Fn(&CtpRequest) -> bool + Send + Sync>;

    /// An in-memory commerce platform.
    ///
    /// Resources are JSON objects with at least an `id`; `version` starts at
    /// 1 and increases by one per accepted update. Every request is recorded
    /// before it is answered, including failed ones.
    #[derive(Default)]
    pub struct MockCtpClient {
        resources: Mutex<HashMap<ReferenceFamily, Vec<Value>>>,
        documents: Mutex<BTreeMap<(String, String), StoredDocument>>,
        requests: Mutex<Vec<CtpRequest>>,
        failures: Mutex<Vec<FailurePredicate>>,
        latency: Option<Duration>,
    }

    impl MockCtpClient {
        /// Creates an empty remote.
        pub fn new() -> Self {
            Self::default()
        }

        /// Delays every response by `latency`.
        #[must_use]
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Stores a resource as-is. A missing `version` is set to 1.
        pub fn insert(&self, family: ReferenceFamily, mut resource: Value) {
            if resource.get("version").is_none() {
                resource["version"] = Value::from(1u64);
            }
            lock(&self.resources).entry(family).or_default().push(resource);
        }

        /// Stores a minimal resource with the given id and optional key.
        pub fn insert_key(&self, family: ReferenceFamily, id: &str, key: Option<&str>) {
            let mut resource = serde_json::json!({ "id": id, "version": 1 });
            if let Some(key) = key {
                resource["key"] = Value::from(key);
            }
            self.insert(family, resource);
        }

        /// Every stored resource of a family.
        pub fn resources(&self, family: ReferenceFamily) -> Vec<Value> {
            lock(&self.resources).get(&family).cloned().unwrap_or_default()
        }

        /// Stores a custom object with an explicit modification time.
        pub fn insert_document(&self, document: StoredDocument) {
            lock(&self.documents).insert((document.container.clone(), document.key.clone()), document);
        }

        /// Every custom object in a container.
        pub fn documents(&self, container: &str) -> Vec<StoredDocument> {
            lock(&self.documents)
                .values()
                .filter(|d| d.container == container)
                .cloned()
                .collect()
        }

        /// Every request received so far, in arrival order.
        pub fn requests(&self) -> Vec<CtpRequest> {
            lock(&self.requests).clone()
        }

        /// Number of requests received so far.
        pub fn request_count(&self) -> usize {
            lock(&self.requests).len()
        }

        /// Number of requests of the given [`CtpRequest::kind`].
        pub fn count_of(&self, kind: &str) -> usize {
            lock(&self.requests).iter().filter(|r| r.kind() == kind).count()
        }

        /// Forgets the recorded requests.
        pub fn clear_requests(&self) {
            lock(&self.requests).clear();
        }

        /// Fails every future request matching `predicate`.
        pub fn fail_when(&self, predicate: impl Fn(&CtpRequest) -> bool + Send + Sync + 'static) {
            lock(&self.failures).push(Box::new(predicate));
        }

        /// Removes every failure injected with [`Self::fail_when`].
        pub fn clear_failures(&self) {
            lock(&self.failures).clear();
        }

        fn should_fail(&self, request: &CtpRequest) -> bool {
            lock(&self.failures).iter().any(|predicate| predicate(request))
        }

        fn lookup(&self, query: &ResourceKeyIdQuery) -> Vec<ResourceKeyId> {
            let resources = lock(&self.resources);
            let Some(stored) = resources.get(&query.family()) else {
                return Vec::new();
            };
            let field = query.field().as_str();
            stored
                .iter()
                .filter(|r| {
                    r.get(field)
                        .and_then(Value::as_str)
                        .is_some_and(|v| query.values().iter().any(|q| q == v))
                })
                .take(query.limit())
                .map(|r| ResourceKeyId {
                    id: ResourceId::new(r.get("id").and_then(Value::as_str).unwrap_or_default()),
                    key: r.get("key").and_then(Value::as_str).map(str::to_string),
                })
                .collect()
        }

        fn fetch_by_keys(&self, family: ReferenceFamily, keys: &[String]) -> Vec<Value> {
            lock(&self.resources)
                .get(&family)
                .map(|stored| {
                    stored
                        .iter()
                        .filter(|r| {
                            r.get("key")
                                .and_then(Value::as_str)
                                .is_some_and(|k| keys.iter().any(|key| key == k))
                        })
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        }

        fn create(&self, family: ReferenceFamily, draft: Value) -> SyncResult<Value> {
            let Value::Object(mut fields) = draft else {
                return Err(SyncError::RemoteCall("draft must be a JSON object".into()));
            };
            fields.insert("id".into(), Value::from(ResourceId::generate().into_string()));
            fields.insert("version".into(), Value::from(1u64));
            let resource = Value::Object(fields);
            lock(&self.resources).entry(family).or_default().push(resource.clone());
            Ok(resource)
        }

        fn update(
            &self,
            family: ReferenceFamily,
            id: &ResourceId,
            version: u64,
            actions: &[UpdateAction],
        ) -> SyncResult<Value> {
            let mut resources = lock(&self.resources);
            let resource = resources
                .get_mut(&family)
                .and_then(|stored| {
                    stored
                        .iter_mut()
                        .find(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
                })
                .ok_or_else(|| SyncError::RemoteCall(format!("{family} with id '{id}' not found")))?;

            let current = resource.get("version").and_then(Value::as_u64).unwrap_or(1);
            if current != version {
                return Err(SyncError::RemoteCall(format!(
                    "version conflict on {family} '{id}': expected {current}, got {version}"
                )));
            }
            resource["version"] = Value::from(current + 1);
            let applied = resource
                .get("appliedActions")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            resource["appliedActions"] = Value::from(applied + actions.len() as u64);
            Ok(resource.clone())
        }

        fn delete(&self, family: ReferenceFamily, id: &ResourceId, version: u64) -> SyncResult<Option<Value>> {
            let mut resources = lock(&self.resources);
            let Some(stored) = resources.get_mut(&family) else {
                return Ok(None);
            };
            let Some(position) = stored
                .iter()
                .position(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
            else {
                return Ok(None);
            };
            let current = stored[position].get("version").and_then(Value::as_u64).unwrap_or(1);
            if current != version {
                return Err(SyncError::RemoteCall(format!(
                    "version conflict on {family} '{id}': expected {current}, got {version}"
                )));
            }
            Ok(Some(stored.remove(position)))
        }

        fn answer(&self, request: CtpRequest) -> SyncResult<CtpResponse> {
            let response = match request {
                CtpRequest::KeyLookup(query) => CtpResponse::KeyIds(self.lookup(&query)),
                CtpRequest::BatchedKeyLookup(queries) => {
                    CtpResponse::BatchedKeyIds(queries.iter().map(|q| self.lookup(q)).collect())
                }
                CtpRequest::FetchByKey { family, key } => CtpResponse::Resource(
                    self.fetch_by_keys(family, std::slice::from_ref(&key)).into_iter().next(),
                ),
                CtpRequest::FetchByKeys { family, keys } => {
                    CtpResponse::Resources(self.fetch_by_keys(family, &keys))
                }
                CtpRequest::Create { family, draft } => CtpResponse::Resource(Some(self.create(family, draft)?)),
                CtpRequest::Update {
                    family,
                    id,
                    version,
                    actions,
                } => CtpResponse::Resource(Some(self.update(family, &id, version, &actions)?)),
                CtpRequest::Delete { family, id, version } => {
                    CtpResponse::Resource(self.delete(family, &id, version)?)
                }
                CtpRequest::UpsertDocument { container, key, value } => {
                    let document = StoredDocument {
                        container: container.clone(),
                        key: key.clone(),
                        value,
                        last_modified_at: Utc::now(),
                    };
                    lock(&self.documents).insert((container, key), document.clone());
                    CtpResponse::Document(Some(document))
                }
                CtpRequest::FetchDocuments { container, keys } => {
                    let documents = lock(&self.documents);
                    CtpResponse::Documents(
                        keys.into_iter()
                            .filter_map(|key| documents.get(&(container.clone(), key)).cloned())
                            .collect(),
                    )
                }
                CtpRequest::DeleteDocument { container, key } => {
                    CtpResponse::Document(lock(&self.documents).remove(&(container, key)))
                }
                CtpRequest::QueryDocuments {
                    container,
                    cutoff,
                    limit,
                } => {
                    let mut matching: Vec<StoredDocument> = lock(&self.documents)
                        .values()
                        .filter(|d| d.container == container && d.last_modified_at < cutoff)
                        .cloned()
                        .collect();
                    matching.sort_by_key(|d| d.last_modified_at);
                    matching.truncate(limit);
                    CtpResponse::Documents(matching)
                }
            };
            Ok(response)
        }
    }

    #[async_trait]
    impl CtpClient for MockCtpClient {
        async fn execute(&self, request: CtpRequest) -> SyncResult<CtpResponse> {
            lock(&self.requests).push(request.clone());
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if self.should_fail(&request) {
                return Err(SyncError::RemoteCall(format!("injected failure for {}", request.kind())));
            }
            self.answer(request)
        }
    }
}
