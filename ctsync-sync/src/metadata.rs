//! Per-draft synthesis metadata.

use crate::error::SyncResult;
use crate::lock;
use crate::transport::{CtpClient, CtpRequest};
use async_trait::async_trait;
use ctsync_diff::{AttributeMetaDataMap, SynthesisContext};
use ctsync_types::{AttributeMetaData, ProductDraft, ReferenceFamily};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Supplies the [`SynthesisContext`] a draft needs before it can be diffed.
#[async_trait]
pub trait MetadataProvider<D>: Send + Sync {
    async fn context_for(&self, draft: &D) -> SyncResult<SynthesisContext>;
}

/// Provides an empty context. For resource kinds whose comparators need no
/// metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

#[async_trait]
impl<D: Sync> MetadataProvider<D> for NoMetadata {
    async fn context_for(&self, _draft: &D) -> SyncResult<SynthesisContext> {
        Ok(SynthesisContext::empty())
    }
}

/// Attribute definitions of product types, fetched once per product type key.
pub struct ProductTypeAttributes {
    client: Arc<dyn CtpClient>,
    cached: Mutex<HashMap<String, Arc<AttributeMetaDataMap>>>,
}

impl ProductTypeAttributes {
    pub fn new(client: Arc<dyn CtpClient>) -> Self {
        Self {
            client,
            cached: Mutex::new(HashMap::new()),
        }
    }

    async fn load(&self, product_type: &str) -> SyncResult<Arc<AttributeMetaDataMap>> {
        if let Some(known) = lock(&self.cached).get(product_type) {
            return Ok(known.clone());
        }

        let response = self
            .client
            .execute(CtpRequest::FetchByKey {
                family: ReferenceFamily::ProductType,
                key: product_type.to_string(),
            })
            .await?
            .into_resource()?;

        let attributes: Vec<AttributeMetaData> = match response {
            Some(mut resource) => match resource.get_mut("attributes").map(Value::take) {
                Some(attributes) => serde_json::from_value(attributes)?,
                None => Vec::new(),
            },
            None => {
                warn!("Failed to find product type {}: no attribute metadata", product_type);
                Vec::new()
            }
        };
        debug!("Loaded {} attribute definitions for product type {}", attributes.len(), product_type);

        let map: Arc<AttributeMetaDataMap> =
            Arc::new(attributes.into_iter().map(|a| (a.name.clone(), a)).collect());
        lock(&self.cached).insert(product_type.to_string(), map.clone());
        Ok(map)
    }
}

#[async_trait]
impl MetadataProvider<ProductDraft> for ProductTypeAttributes {
    async fn context_for(&self, draft: &ProductDraft) -> SyncResult<SynthesisContext> {
        let attributes = self.load(draft.product_type.target()).await?;
        Ok(SynthesisContext::with_attributes(attributes))
    }
}
