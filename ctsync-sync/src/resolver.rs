//! Reference resolution: rewriting id-references to key-references.
//!
//! A [`ReferenceResolver`] walks every reference of a batch of drafts, looks
//! up the ids it cannot answer from the cache, and rewrites what it can.
//! Drafts left with an unresolved id are set aside, not failed.

use crate::cache::IdentifierCache;
use crate::lookup::BatchedLookupClient;
use ctsync_types::{is_uuid, Reference, ReferenceFamily, ResourceId};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Returns every reference of a draft, mutably, so it can be rewritten.
pub type ReferenceExtractor<D> = Arc<dyn Fn(&mut D) -> Vec<&mut Reference> + Send + Sync>;

/// Returns the reference objects a draft holds in JSON form, e.g. inside
/// attribute values.
pub type NestedExtractor<D> = Arc<dyn Fn(&mut D) -> Vec<&mut Value> + Send + Sync>;

/// Receives the id → key mappings applied to a draft, for fields keyed by id.
pub type KeyRewriter<D> = Arc<dyn Fn(&mut D, &HashMap<ResourceId, String>) + Send + Sync>;

/// A draft that still holds unresolved id-references.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionGap<D> {
    pub draft: D,
    /// The id-references that could not be resolved.
    pub references: Vec<Reference>,
}

impl<D> ResolutionGap<D> {
    /// The ids of the unresolved references.
    pub fn missing_ids(&self) -> Vec<String> {
        self.references.iter().map(|r| r.target().to_string()).collect()
    }
}

/// Result of resolving a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome<D> {
    /// Drafts whose every reference is a key-reference or deliberately kept.
    pub resolved: Vec<D>,
    /// Drafts with at least one unresolved reference.
    pub unresolved: Vec<ResolutionGap<D>>,
    /// Non-fatal findings, such as keys that look like UUIDs.
    pub warnings: Vec<String>,
}

impl<D> Default for ResolutionOutcome<D> {
    fn default() -> Self {
        Self {
            resolved: Vec::new(),
            unresolved: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Rewrites the references of drafts of type `D`.
pub struct ReferenceResolver<D> {
    lookup: Arc<BatchedLookupClient>,
    extractor: ReferenceExtractor<D>,
    nested: Option<NestedExtractor<D>>,
    keep_unexpanded: HashSet<ReferenceFamily>,
    key_rewriter: Option<KeyRewriter<D>>,
    allow_uuid_keys: bool,
}

impl<D> ReferenceResolver<D> {
    /// Creates a resolver using `extractor` to find the references of a draft.
    pub fn new<F>(lookup: Arc<BatchedLookupClient>, extractor: F) -> Self
    where
        F: Fn(&mut D) -> Vec<&mut Reference> + Send + Sync + 'static,
    {
        Self {
            lookup,
            extractor: Arc::new(extractor),
            nested: None,
            keep_unexpanded: HashSet::new(),
            key_rewriter: None,
            allow_uuid_keys: false,
        }
    }

    /// Leaves never-expanded id-references of `family` as they are unless the
    /// cache already knows their key. They point at resources expected to
    /// exist in the target already, and are never looked up.
    #[must_use]
    pub fn keep_unexpanded(mut self, family: ReferenceFamily) -> Self {
        self.keep_unexpanded.insert(family);
        self
    }

    /// Also resolves the JSON reference objects `nested` returns. A resolved
    /// object is rewritten to its `{"typeId", "key"}` form.
    #[must_use]
    pub fn with_nested_references<F>(mut self, nested: F) -> Self
    where
        F: Fn(&mut D) -> Vec<&mut Value> + Send + Sync + 'static,
    {
        self.nested = Some(Arc::new(nested));
        self
    }

    /// Sets the hook that rekeys id-keyed fields after resolution.
    #[must_use]
    pub fn with_key_rewriter<F>(mut self, rewriter: F) -> Self
    where
        F: Fn(&mut D, &HashMap<ResourceId, String>) + Send + Sync + 'static,
    {
        self.key_rewriter = Some(Arc::new(rewriter));
        self
    }

    /// Whether keys shaped like UUIDs pass silently.
    #[must_use]
    pub fn allow_uuid_keys(mut self, allow: bool) -> Self {
        self.allow_uuid_keys = allow;
        self
    }

    pub fn cache(&self) -> &Arc<IdentifierCache> {
        self.lookup.cache()
    }

    fn is_kept(&self, reference: &Reference) -> bool {
        !reference.is_expanded() && self.keep_unexpanded.contains(&reference.family())
    }

    fn nested_of<'d>(&self, draft: &'d mut D) -> Vec<&'d mut Value> {
        match &self.nested {
            Some(nested) => nested(draft),
            None => Vec::new(),
        }
    }

    /// Resolves every reference of `drafts`.
    ///
    /// Ids of all families are looked up together. A draft is resolved when
    /// each of its id-references either resolved or is kept by policy.
    pub async fn resolve(&self, mut drafts: Vec<D>) -> ResolutionOutcome<D> {
        let cache = self.lookup.cache();
        let mut needed: HashMap<ReferenceFamily, HashSet<ResourceId>> = HashMap::new();

        for draft in &mut drafts {
            for reference in (self.extractor)(draft) {
                self.collect(reference, cache, &mut needed);
            }
            for value in self.nested_of(draft) {
                if let Some(reference) = Reference::from_json(value) {
                    self.collect(&reference, cache, &mut needed);
                }
            }
        }

        // Keys fetched this pass come from the report; the cache may have
        // evicted them already.
        let mut fetched = HashMap::new();
        if !needed.is_empty() {
            let report = self.lookup.fetch_many(needed).await;
            if !report.is_complete() {
                debug!("{} ids could not be looked up this pass", report.failed.len());
            }
            fetched = report.resolved;
        }

        let mut outcome = ResolutionOutcome::default();
        for mut draft in drafts {
            let mut applied: HashMap<ResourceId, String> = HashMap::new();
            let mut gaps = Vec::new();

            for reference in (self.extractor)(&mut draft) {
                if !self.settle(reference, &fetched, cache, &mut applied, &mut outcome.warnings) {
                    gaps.push(reference.clone());
                }
            }
            for value in self.nested_of(&mut draft) {
                let Some(mut reference) = Reference::from_json(value) else {
                    continue;
                };
                let by_id = !reference.is_key();
                if !self.settle(&mut reference, &fetched, cache, &mut applied, &mut outcome.warnings) {
                    gaps.push(reference);
                } else if by_id && reference.is_key() {
                    *value = reference.to_json();
                }
            }

            if !applied.is_empty() {
                if let Some(rewriter) = &self.key_rewriter {
                    rewriter(&mut draft, &applied);
                }
            }

            if gaps.is_empty() {
                outcome.resolved.push(draft);
            } else {
                outcome.unresolved.push(ResolutionGap {
                    draft,
                    references: gaps,
                });
            }
        }
        outcome
    }

    /// Seeds the cache from an expanded reference, or notes its id for lookup.
    fn collect(
        &self,
        reference: &Reference,
        cache: &IdentifierCache,
        needed: &mut HashMap<ReferenceFamily, HashSet<ResourceId>>,
    ) {
        let Some(id) = reference.id() else {
            return;
        };
        if let Some(key) = reference.expanded_key() {
            cache.put(id.clone(), key);
        } else if !self.is_kept(reference) {
            needed.entry(reference.family()).or_default().insert(id.clone());
        }
    }

    /// Rewrites `reference` to its key when one is known. Returns false when
    /// the reference stays an id-reference that policy does not keep.
    fn settle(
        &self,
        reference: &mut Reference,
        fetched: &HashMap<ResourceId, String>,
        cache: &IdentifierCache,
        applied: &mut HashMap<ResourceId, String>,
        warnings: &mut Vec<String>,
    ) -> bool {
        let Some(id) = reference.id().cloned() else {
            return true;
        };
        let key = reference
            .expanded_key()
            .map(str::to_string)
            .or_else(|| fetched.get(&id).cloned())
            .or_else(|| cache.get(id.as_str()));
        let Some(key) = key else {
            return self.is_kept(reference);
        };

        if !self.allow_uuid_keys && is_uuid(&key) {
            let message = format!("{} key '{}' of id '{}' looks like a UUID", reference.family(), key, id);
            warn!("{}", message);
            warnings.push(message);
        }
        reference.resolve_to(key.clone());
        applied.insert(id, key);
        true
    }
}
