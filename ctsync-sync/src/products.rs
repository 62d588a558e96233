//! Ready-made engine for products.

use crate::cache::IdentifierCache;
use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::lookup::BatchedLookupClient;
use crate::metadata::ProductTypeAttributes;
use crate::options::SyncOptions;
use crate::resolver::ReferenceResolver;
use crate::transport::CtpClient;
use ctsync_diff::product_synthesizer;
use ctsync_types::{Product, ProductDraft, ReferenceFamily};
use std::sync::Arc;

/// Builds a product engine reading references from `source` and writing to
/// `target`.
///
/// Draft references are resolved against `source`. Fetched products are
/// resolved against `target` so both sides of each diff carry keys.
/// Reference objects inside attribute and custom-field values are resolved
/// too. Attribute constraints come from the target's product types.
pub fn product_engine(
    source: Arc<dyn CtpClient>,
    target: Arc<dyn CtpClient>,
    options: SyncOptions<ProductDraft, Product>,
) -> SyncResult<SyncEngine<ProductDraft, Product>> {
    let source_lookup = Arc::new(BatchedLookupClient::new(
        source,
        Arc::new(IdentifierCache::new(options.cache)),
        options.lookup.clone(),
    ));
    let resolver = ReferenceResolver::new(source_lookup, ProductDraft::references_mut)
        .with_nested_references(ProductDraft::nested_references_mut)
        .with_key_rewriter(ProductDraft::rekey_order_hints)
        .allow_uuid_keys(options.allow_uuid_keys);

    let target_lookup = Arc::new(BatchedLookupClient::new(
        target.clone(),
        Arc::new(IdentifierCache::new(options.cache)),
        options.lookup.clone(),
    ));
    let target_resolver = ReferenceResolver::new(target_lookup, Product::references_mut)
        .with_nested_references(Product::nested_references_mut)
        .with_key_rewriter(Product::rekey_order_hints)
        .allow_uuid_keys(true);

    let metadata = ProductTypeAttributes::new(target.clone());
    let engine = SyncEngine::new(ReferenceFamily::Product, target, resolver, product_synthesizer(), options)?
        .with_target_resolver(target_resolver)
        .with_metadata(metadata);
    Ok(engine)
}
