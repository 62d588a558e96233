//! The two sides of a sync: desired-state drafts and persisted resources.

use crate::ids::ResourceId;
use serde::{Deserialize, Serialize};

/// Desired state of a resource, matched to its target by natural key.
pub trait SyncDraft {
    /// The natural key. Drafts without one cannot be matched or created.
    fn key(&self) -> Option<&str>;
}

/// A resource as currently persisted in the target store.
pub trait SyncResource {
    fn id(&self) -> &ResourceId;

    fn key(&self) -> Option<&str>;

    /// Version used for optimistic concurrency on updates.
    fn version(&self) -> u64;
}

/// The minimum needed to address a resource for an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub version: u64,
}

impl ResourceHandle {
    #[must_use]
    pub fn new(id: impl Into<ResourceId>, key: Option<String>, version: u64) -> Self {
        Self {
            id: id.into(),
            key,
            version,
        }
    }

    /// Captures the handle of any persisted resource.
    #[must_use]
    pub fn of<R: SyncResource + ?Sized>(resource: &R) -> Self {
        Self {
            id: resource.id().clone(),
            key: resource.key().map(str::to_string),
            version: resource.version(),
        }
    }

    /// The same resource at a newer version.
    #[must_use]
    pub fn at_version(&self, version: u64) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }
}

impl SyncResource for ResourceHandle {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn version(&self) -> u64 {
        self.version
    }
}
