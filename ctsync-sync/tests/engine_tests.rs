use ctsync_sync::transport::mock::MockCtpClient;
use ctsync_sync::{
    product_engine, CtpRequest, DocumentStore, LookupConfig, SqliteDocumentStore, SyncEngine, SyncError,
    SyncOptions, SyncStatistics,
};
use ctsync_types::{
    localized, Attribute, Product, ProductDraft, ProductVariant, ProductVariantDraft, Reference, ReferenceFamily,
    ResourceId, UpdateAction,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type Engine = SyncEngine<ProductDraft, Product>;

/// Source project: where drafts were exported from, holding the ids drafts
/// refer to.
fn make_source() -> Arc<MockCtpClient> {
    let source = MockCtpClient::new();
    source.insert_key(ReferenceFamily::ProductType, "pt-s", Some("shirt"));
    source.insert_key(ReferenceFamily::Category, "sc-1", Some("shoes"));
    source.insert_key(ReferenceFamily::Category, "sc-2", Some("sale"));
    Arc::new(source)
}

/// Target project: one existing product "tee" in category "shoes".
fn make_target() -> Arc<MockCtpClient> {
    let target = MockCtpClient::new();
    target.insert_key(ReferenceFamily::ProductType, "pt-t", Some("shirt"));
    target.insert_key(ReferenceFamily::Category, "tc-1", Some("shoes"));
    target.insert(ReferenceFamily::Product, serde_json::to_value(make_product("p-1", "tee")).unwrap());
    Arc::new(target)
}

fn make_product(id: &str, key: &str) -> Product {
    Product {
        id: ResourceId::new(id),
        key: Some(key.into()),
        version: 1,
        product_type: Reference::by_id(ReferenceFamily::ProductType, "pt-t"),
        name: localized("en", "Tee"),
        slug: localized("en", "Tee"),
        description: None,
        categories: vec![Reference::by_id(ReferenceFamily::Category, "tc-1")],
        category_order_hints: BTreeMap::new(),
        tax_category: None,
        state: None,
        master_variant: ProductVariant {
            id: 1,
            key: Some("a".into()),
            sku: Some("sku-a".into()),
            prices: vec![],
            attributes: vec![],
            images: vec![],
            assets: vec![],
        },
        variants: vec![],
        published: false,
    }
}

/// A draft matching `make_product`, with source-side ids.
fn make_draft(key: &str) -> ProductDraft {
    let mut draft = ProductDraft::new(
        key,
        Reference::by_id(ReferenceFamily::ProductType, "pt-s"),
        localized("en", "Tee"),
    );
    draft.categories = vec![Reference::by_id(ReferenceFamily::Category, "sc-1")];
    draft.master_variant = Some(ProductVariantDraft::new("a", "sku-a"));
    draft
}

fn make_engine(source: &Arc<MockCtpClient>, target: &Arc<MockCtpClient>) -> Engine {
    make_engine_with(source, target, SyncOptions::default())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn make_engine_with(
    source: &Arc<MockCtpClient>,
    target: &Arc<MockCtpClient>,
    options: SyncOptions<ProductDraft, Product>,
) -> Engine {
    init_tracing();
    product_engine(source.clone(), target.clone(), options).unwrap()
}

fn update_actions(target: &MockCtpClient) -> Vec<UpdateAction> {
    target
        .requests()
        .into_iter()
        .flat_map(|request| match request {
            CtpRequest::Update { actions, .. } => actions,
            _ => Vec::new(),
        })
        .collect()
}

type Recorded = Arc<Mutex<Vec<String>>>;

fn recording_options() -> (SyncOptions<ProductDraft, Product>, Recorded, Recorded) {
    let errors: Recorded = Arc::default();
    let warnings: Recorded = Arc::default();
    let error_sink = errors.clone();
    let warning_sink = warnings.clone();
    let options = SyncOptions::<ProductDraft, Product>::default()
        .with_error_callback(move |error, draft, _| {
            let key = draft.and_then(|d| d.key.clone()).unwrap_or_default();
            error_sink.lock().unwrap().push(format!("{key}: {error}"));
        })
        .with_warning_callback(move |message| warning_sink.lock().unwrap().push(message.to_string()));
    (options, errors, warnings)
}

// ── Create & update ──────────────────────────────────────────────

#[tokio::test]
async fn creates_missing_and_updates_existing() {
    let (source, target) = (make_source(), make_target());
    let engine = make_engine(&source, &target);

    let mut existing = make_draft("tee");
    existing.categories.push(Reference::by_id(ReferenceFamily::Category, "sc-2"));
    let stats = engine.sync(vec![existing, make_draft("polo")]).await;

    assert_eq!(
        stats,
        SyncStatistics {
            processed: 2,
            created: 1,
            updated: 1,
            failed: 0,
            unresolved: 0,
        }
    );
    assert_eq!(
        update_actions(&target),
        vec![UpdateAction::AddToCategory {
            category: Reference::by_key(ReferenceFamily::Category, "sale"),
        }]
    );
    assert_eq!(target.count_of("create"), 1);
    let products = target.resources(ReferenceFamily::Product);
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["version"], json!(2));
    assert_eq!(products[1]["key"], json!("polo"));
}

#[tokio::test]
async fn matching_draft_sends_no_update() {
    let (source, target) = (make_source(), make_target());
    let engine = make_engine(&source, &target);

    let stats = engine.sync(vec![make_draft("tee")]).await;

    assert_eq!(stats.processed, 1);
    assert_eq!(stats.updated, 0);
    assert_eq!(stats.created, 0);
    assert_eq!(target.count_of("update"), 0);
}

#[tokio::test]
async fn statistics_accumulate_across_runs() {
    let (source, target) = (make_source(), make_target());
    let engine = make_engine(&source, &target);

    engine.sync(vec![make_draft("a")]).await;
    let stats = engine.sync(vec![make_draft("b")]).await;

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.created, 2);
    assert_eq!(engine.statistics().await, stats);
    assert!(stats.report_message().starts_with("Summary: 2 drafts were processed in total (2 created"));
}

#[tokio::test]
async fn small_batches_process_everything() {
    let (source, target) = (make_source(), make_target());
    let mut options = SyncOptions::default();
    options.batch_size = 1;
    let engine = make_engine_with(&source, &target, options);

    let stats = engine.sync(vec![make_draft("a"), make_draft("b"), make_draft("c")]).await;

    assert_eq!(stats.created, 3);
    assert_eq!(target.count_of("fetch-by-keys"), 3);
}

#[test]
fn zero_batch_size_is_rejected() {
    let mut options = SyncOptions::default();
    options.batch_size = 0;
    let result = product_engine(make_source(), make_target(), options);
    assert!(matches!(result, Err(SyncError::Config(_))));
}

// ── Validation ───────────────────────────────────────────────────

#[tokio::test]
async fn blank_and_duplicate_keys_are_rejected() {
    let (source, target) = (make_source(), make_target());
    let (options, errors, _) = recording_options();
    let engine = make_engine_with(&source, &target, options);

    let mut blank = make_draft("x");
    blank.key = None;
    let stats = engine.sync(vec![blank, make_draft("polo"), make_draft("polo")]).await;

    assert_eq!(stats.processed, 3);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.created, 1);
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.contains("polo")));
}

// ── Failure isolation ────────────────────────────────────────────

#[tokio::test]
async fn failed_target_fetch_fails_only_its_chunk() {
    let (source, target) = (make_source(), make_target());
    target.fail_when(|request| {
        matches!(request, CtpRequest::FetchByKeys { keys, .. } if keys.iter().any(|k| k == "b"))
    });
    let mut options = SyncOptions::default();
    options.lookup = LookupConfig {
        keys_per_chunk: 1,
        ..LookupConfig::default()
    };
    let engine = make_engine_with(&source, &target, options);

    let stats = engine.sync(vec![make_draft("a"), make_draft("b"), make_draft("c")]).await;

    assert_eq!(stats.created, 2);
    assert_eq!(stats.failed, 1);
    let created: Vec<_> = target
        .resources(ReferenceFamily::Product)
        .iter()
        .filter_map(|p| p["key"].as_str().map(str::to_string))
        .collect();
    assert!(!created.contains(&"b".to_string()));
}

#[tokio::test]
async fn synthesis_error_is_isolated() {
    let (source, target) = (make_source(), make_target());
    target.insert(ReferenceFamily::Product, serde_json::to_value(make_product("p-2", "polo")).unwrap());
    let (options, errors, _) = recording_options();
    let engine = make_engine_with(&source, &target, options);

    // no attribute metadata exists for "size"
    let mut broken = make_draft("tee");
    if let Some(master) = broken.master_variant.as_mut() {
        master.attributes.push(Attribute::new("size", json!("M")));
    }
    let mut fine = make_draft("polo");
    fine.name = localized("en", "Polo");

    let stats = engine.sync(vec![broken, fine]).await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(target.count_of("update"), 1);
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("tee: "), "{}", errors[0]);
}

#[tokio::test]
async fn failed_update_is_reported_with_the_resource() {
    let (source, target) = (make_source(), make_target());
    target.fail_when(|request| request.kind() == "update");
    let seen_resource = Arc::new(Mutex::new(None));
    let sink = seen_resource.clone();
    let options = SyncOptions::<ProductDraft, Product>::default().with_error_callback(move |error, _, resource| {
        assert!(matches!(error, SyncError::RemoteCall(_)));
        *sink.lock().unwrap() = resource.map(|r| r.id.clone());
    });
    let engine = make_engine_with(&source, &target, options);

    let mut draft = make_draft("tee");
    draft.name = localized("en", "Tee v2");
    let stats = engine.sync(vec![draft]).await;

    assert_eq!(stats.failed, 1);
    assert_eq!(*seen_resource.lock().unwrap(), Some(ResourceId::new("p-1")));
}

// ── Callbacks ────────────────────────────────────────────────────

#[tokio::test]
async fn before_create_can_skip() {
    let (source, target) = (make_source(), make_target());
    let options = SyncOptions::<ProductDraft, Product>::default().with_before_create(|draft| {
        (draft.key.as_deref() != Some("skip")).then_some(draft)
    });
    let engine = make_engine_with(&source, &target, options);

    let stats = engine.sync(vec![make_draft("skip"), make_draft("keep")]).await;

    assert_eq!(stats.created, 1);
    assert_eq!(target.count_of("create"), 1);
}

#[tokio::test]
async fn before_update_can_filter_actions() {
    let (source, target) = (make_source(), make_target());
    let options = SyncOptions::<ProductDraft, Product>::default().with_before_update(|actions, _, _| {
        actions
            .into_iter()
            .filter(|a| !matches!(a, UpdateAction::AddToCategory { .. }))
            .collect()
    });
    let engine = make_engine_with(&source, &target, options);

    let mut draft = make_draft("tee");
    draft.categories.push(Reference::by_id(ReferenceFamily::Category, "sc-2"));
    draft.description = Some(localized("en", "Cotton"));
    let stats = engine.sync(vec![draft]).await;

    assert_eq!(stats.updated, 1);
    let actions = update_actions(&target);
    assert_eq!(actions.len(), 1);
    assert!(!matches!(actions[0], UpdateAction::AddToCategory { .. }));
}

// ── Lazy resolution ──────────────────────────────────────────────

fn make_ledger_store() -> Arc<dyn DocumentStore> {
    Arc::new(SqliteDocumentStore::open_in_memory().unwrap())
}

fn make_waiting_draft() -> ProductDraft {
    let mut draft = make_draft("hoodie");
    draft.categories.push(Reference::by_id(ReferenceFamily::Category, "sc-9"));
    draft
}

#[tokio::test]
async fn unresolved_draft_is_parked() {
    let (source, target) = (make_source(), make_target());
    let (options, _, warnings) = recording_options();
    let engine = make_engine_with(&source, &target, options).with_ledger(make_ledger_store());

    let stats = engine.sync(vec![make_waiting_draft(), make_draft("polo")]).await;

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.unresolved, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(engine.parked_keys(), vec!["hoodie".to_string()]);
    let warnings = warnings.lock().unwrap();
    assert!(warnings.iter().any(|w| w.contains("hoodie") && w.contains("sc-9")));

    let ledger = engine.ledger().unwrap();
    let parked = ledger.fetch(["hoodie"]).await.unwrap();
    assert_eq!(parked.len(), 1);
    assert!(parked[0].missing_reference_ids.contains("sc-9"));
}

#[tokio::test]
async fn parked_draft_is_retried_once_resolvable() {
    let (source, target) = (make_source(), make_target());
    let engine = make_engine(&source, &target).with_ledger(make_ledger_store());

    engine.sync(vec![make_waiting_draft()]).await;
    let still_missing = engine.retry_parked().await;
    assert_eq!(still_missing.unresolved, 1);
    assert_eq!(still_missing.created, 0);

    source.insert_key(ReferenceFamily::Category, "sc-9", Some("bags"));
    let stats = engine.retry_parked().await;

    assert_eq!(stats.processed, 1);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.unresolved, 0);
    assert!(engine.parked_keys().is_empty());
    assert!(engine.ledger().unwrap().fetch(["hoodie"]).await.unwrap().is_empty());

    let created = target.resources(ReferenceFamily::Product);
    let hoodie = created.iter().find(|p| p["key"] == json!("hoodie")).unwrap();
    let categories: Vec<Reference> = serde_json::from_value(hoodie["categories"].clone()).unwrap();
    assert!(categories.contains(&Reference::by_key(ReferenceFamily::Category, "bags")));
}

fn make_draft_relating_to(key: &str, product_id: &str) -> ProductDraft {
    let mut draft = make_draft(key);
    draft.master_variant = Some(
        ProductVariantDraft::new("a", "sku-a")
            .with_attribute("related", json!({ "typeId": "product", "id": product_id })),
    );
    draft
}

fn created_attribute(target: &MockCtpClient, key: &str, name: &str) -> serde_json::Value {
    let created = target.resources(ReferenceFamily::Product);
    let product = created.iter().find(|p| p["key"] == json!(key)).unwrap();
    let attributes: Vec<Attribute> = serde_json::from_value(product["masterVariant"]["attributes"].clone()).unwrap();
    attributes.into_iter().find(|a| a.name == name).unwrap().value
}

#[tokio::test]
async fn attribute_reference_is_created_in_key_form() {
    let (source, target) = (make_source(), make_target());
    source.insert_key(ReferenceFamily::Product, "sp-2", Some("polo"));
    let engine = make_engine(&source, &target);

    let stats = engine.sync(vec![make_draft_relating_to("hoodie", "sp-2")]).await;

    assert_eq!(stats.created, 1);
    assert_eq!(stats.unresolved, 0);
    assert_eq!(
        created_attribute(&target, "hoodie", "related"),
        json!({ "typeId": "product", "key": "polo" })
    );
}

#[tokio::test]
async fn absent_attribute_reference_parks_until_it_exists() {
    let (source, target) = (make_source(), make_target());
    let engine = make_engine(&source, &target).with_ledger(make_ledger_store());

    let stats = engine.sync(vec![make_draft_relating_to("hoodie", "sp-404")]).await;

    assert_eq!(stats.created, 0);
    assert_eq!(stats.unresolved, 1);
    let parked = engine.ledger().unwrap().fetch(["hoodie"]).await.unwrap();
    assert!(parked[0].missing_reference_ids.contains("sp-404"));

    source.insert_key(ReferenceFamily::Product, "sp-404", Some("polo"));
    let stats = engine.retry_parked().await;

    assert_eq!(stats.created, 1);
    assert_eq!(stats.unresolved, 0);
    assert_eq!(
        created_attribute(&target, "hoodie", "related"),
        json!({ "typeId": "product", "key": "polo" })
    );
}

#[tokio::test]
async fn fresh_copy_of_parked_draft_unparks_it() {
    let (source, target) = (make_source(), make_target());
    let engine = make_engine(&source, &target).with_ledger(make_ledger_store());

    engine.sync(vec![make_waiting_draft()]).await;
    let mut fixed = make_waiting_draft();
    fixed.categories.pop();
    let stats = engine.sync(vec![fixed]).await;

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.unresolved, 0);
    assert!(engine.ledger().unwrap().fetch(["hoodie"]).await.unwrap().is_empty());
}

#[tokio::test]
async fn ledger_failure_counts_as_failed() {
    let (source, target) = (make_source(), make_target());
    let ledger_remote = Arc::new(MockCtpClient::new());
    ledger_remote.fail_when(|request| request.kind() == "upsert-document");
    let store = Arc::new(ctsync_sync::RemoteDocumentStore::new(ledger_remote));
    let engine = make_engine(&source, &target).with_ledger(store);

    let stats = engine.sync(vec![make_waiting_draft()]).await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.unresolved, 0);
    assert!(engine.parked_keys().is_empty());
}

#[tokio::test]
async fn retry_without_ledger_does_nothing() {
    let (source, target) = (make_source(), make_target());
    let engine = make_engine(&source, &target);

    engine.sync(vec![make_waiting_draft()]).await;
    source.clear_requests();
    let stats = engine.retry_parked().await;

    assert_eq!(stats.unresolved, 1);
    assert_eq!(source.request_count(), 0);
}
