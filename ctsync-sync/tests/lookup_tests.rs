use ctsync_sync::transport::mock::MockCtpClient;
use ctsync_sync::{
    chunk_ids, BatchedLookupClient, CacheEntry, CtpRequest, IdentifierCache, LookupConfig, LookupReport,
};
use ctsync_types::{ReferenceFamily, ResourceId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

fn ids(values: &[&str]) -> Vec<ResourceId> {
    values.iter().map(|v| ResourceId::new(*v)).collect()
}

fn make_lookup(client: Arc<MockCtpClient>, config: LookupConfig) -> BatchedLookupClient {
    BatchedLookupClient::new(client, Arc::new(IdentifierCache::default()), config)
}

fn make_client() -> Arc<MockCtpClient> {
    let client = MockCtpClient::new();
    for (id, key) in [("a", "ka"), ("b", "kb"), ("c", "kc"), ("d", "kd")] {
        client.insert_key(ReferenceFamily::Category, id, Some(key));
    }
    client.insert_key(ReferenceFamily::Channel, "x", Some("web"));
    Arc::new(client)
}

/// Every id sent in lookup requests, in request order.
fn requested_ids(client: &MockCtpClient) -> Vec<String> {
    client
        .requests()
        .into_iter()
        .flat_map(|request| match request {
            CtpRequest::KeyLookup(query) => query.values().to_vec(),
            CtpRequest::BatchedKeyLookup(queries) => {
                queries.iter().flat_map(|q| q.values().to_vec()).collect()
            }
            _ => Vec::new(),
        })
        .collect()
}

// ── Resolution through the cache ─────────────────────────────────

#[tokio::test]
async fn resolves_and_caches_keys() {
    let client = make_client();
    let lookup = make_lookup(client.clone(), LookupConfig::default());

    let report = lookup.fetch(ReferenceFamily::Category, ids(&["a", "b"])).await;

    assert!(report.is_complete());
    assert_eq!(report.resolved.get("a"), Some(&"ka".to_string()));
    assert_eq!(report.resolved.get("b"), Some(&"kb".to_string()));
    assert_eq!(lookup.cache().get("a"), Some("ka".to_string()));
    assert_eq!(client.count_of("key-lookup"), 1);

    let again = lookup.fetch(ReferenceFamily::Category, ids(&["a", "b"])).await;
    assert_eq!(again.resolved.len(), 2);
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn missing_id_is_cached_as_absent() {
    let client = make_client();
    let lookup = make_lookup(client.clone(), LookupConfig::default());

    let report = lookup.fetch(ReferenceFamily::Category, ids(&["r1"])).await;
    assert!(report.absent.contains("r1"));
    assert!(report.resolved.is_empty());
    assert_eq!(lookup.cache().entry("r1"), Some(CacheEntry::Absent));
    assert_eq!(lookup.cache().get("r1"), None);

    let again = lookup.fetch(ReferenceFamily::Category, ids(&["r1"])).await;
    assert!(again.absent.contains("r1"));
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn resource_without_key_is_absent() {
    let client = make_client();
    client.insert_key(ReferenceFamily::Category, "nokey", None);
    let lookup = make_lookup(client, LookupConfig::default());

    let report = lookup.fetch(ReferenceFamily::Category, ids(&["nokey"])).await;
    assert!(report.absent.contains("nokey"));
}

#[tokio::test]
async fn blank_ids_are_skipped() {
    let client = make_client();
    let lookup = make_lookup(client.clone(), LookupConfig::default());

    let report = lookup.fetch(ReferenceFamily::Category, ids(&["", "  "])).await;
    assert_eq!(report, LookupReport::default());
    assert_eq!(client.request_count(), 0);
}

// ── Chunking ─────────────────────────────────────────────────────

#[tokio::test]
async fn ids_are_split_into_chunks() {
    let client = make_client();
    let config = LookupConfig {
        ids_per_chunk: 2,
        ..LookupConfig::default()
    };
    let lookup = make_lookup(client.clone(), config);

    let report = lookup.fetch(ReferenceFamily::Category, ids(&["a", "b", "c", "d", "e"])).await;

    assert_eq!(client.count_of("key-lookup"), 3);
    assert_eq!(report.resolved.len(), 4);
    assert!(report.absent.contains("e"));
}

#[tokio::test]
async fn failed_chunk_is_isolated_and_not_cached() {
    let client = make_client();
    client.fail_when(|request| {
        matches!(request, CtpRequest::KeyLookup(query) if query.values().iter().any(|v| v == "c"))
    });
    let config = LookupConfig {
        ids_per_chunk: 2,
        ..LookupConfig::default()
    };
    let lookup = make_lookup(client.clone(), config);

    let report = lookup.fetch(ReferenceFamily::Category, ids(&["a", "b", "c", "d"])).await;

    assert!(!report.is_complete());
    assert_eq!(report.failed, HashSet::from([ResourceId::new("c"), ResourceId::new("d")]));
    assert_eq!(report.resolved.len(), 2);
    assert_eq!(lookup.cache().entry("c"), None);
    assert_eq!(lookup.cache().entry("d"), None);

    client.clear_failures();
    client.clear_requests();
    let retry = lookup.fetch(ReferenceFamily::Category, ids(&["a", "b", "c", "d"])).await;
    assert!(retry.is_complete());
    assert_eq!(retry.resolved.len(), 4);
    assert_eq!(requested_ids(&client), vec!["c".to_string(), "d".to_string()]);
}

#[test]
fn chunk_ids_respects_count() {
    let chunks = chunk_ids(&ids(&["a", "b", "c", "d", "e"]), 2, 10_000);
    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[test]
fn chunk_ids_respects_bytes() {
    // each six-byte id costs ten bytes
    let chunks = chunk_ids(&ids(&["aaaaaa", "bbbbbb", "cccccc"]), 100, 25);
    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 1]);
}

#[test]
fn oversized_id_gets_its_own_chunk() {
    let long = "x".repeat(50);
    let chunks = chunk_ids(&ids(&["a", long.as_str(), "b"]), 100, 20);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[1], ids(&[long.as_str()]));
}

#[test]
fn chunk_ids_of_nothing() {
    assert!(chunk_ids(&[], 10, 100).is_empty());
}

// ── Families ─────────────────────────────────────────────────────

#[tokio::test]
async fn families_are_looked_up_together() {
    let client = make_client();
    let lookup = make_lookup(client.clone(), LookupConfig::default());

    let report = lookup
        .fetch_many(HashMap::from([
            (ReferenceFamily::Category, HashSet::from([ResourceId::new("a")])),
            (ReferenceFamily::Channel, HashSet::from([ResourceId::new("x")])),
        ]))
        .await;

    assert_eq!(report.resolved.len(), 2);
    assert_eq!(report.resolved.get("x"), Some(&"web".to_string()));
    assert_eq!(client.count_of("key-lookup"), 2);
}

#[tokio::test]
async fn combined_families_share_requests() {
    let client = make_client();
    let config = LookupConfig {
        ids_per_chunk: 2,
        combine_families: true,
        ..LookupConfig::default()
    };
    let lookup = make_lookup(client.clone(), config);

    let report = lookup
        .fetch_many(HashMap::from([
            (
                ReferenceFamily::Category,
                ids(&["a", "b", "c"]).into_iter().collect(),
            ),
            (ReferenceFamily::Channel, HashSet::from([ResourceId::new("x")])),
        ]))
        .await;

    assert_eq!(report.resolved.len(), 4);
    // first round: categories [a, b] with channels [x]; second round: [c]
    assert_eq!(client.count_of("batched-key-lookup"), 1);
    assert_eq!(client.count_of("key-lookup"), 1);
}

// ── In-flight de-duplication ─────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_one_lookup() {
    let client = Arc::new(MockCtpClient::new().with_latency(Duration::from_millis(50)));
    client.insert_key(ReferenceFamily::Category, "a", Some("ka"));
    let lookup = make_lookup(client.clone(), LookupConfig::default());

    let (first, second) = tokio::join!(
        lookup.fetch(ReferenceFamily::Category, ids(&["a"])),
        lookup.fetch(ReferenceFamily::Category, ids(&["a"])),
    );

    assert_eq!(first.resolved.get("a"), Some(&"ka".to_string()));
    assert_eq!(second.resolved.get("a"), Some(&"ka".to_string()));
    assert_eq!(client.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_requests_ask_each_id_once() {
    let client = Arc::new(MockCtpClient::new().with_latency(Duration::from_millis(50)));
    for (id, key) in [("a", "ka"), ("b", "kb"), ("c", "kc")] {
        client.insert_key(ReferenceFamily::Category, id, Some(key));
    }
    let lookup = make_lookup(client.clone(), LookupConfig::default());

    let (first, second) = tokio::join!(
        lookup.fetch(ReferenceFamily::Category, ids(&["a", "b"])),
        lookup.fetch(ReferenceFamily::Category, ids(&["b", "c"])),
    );

    assert_eq!(first.resolved.len(), 2);
    assert_eq!(second.resolved.len(), 2);
    let mut asked = requested_ids(&client);
    asked.sort();
    assert_eq!(asked, vec!["a", "b", "c"]);
    assert_eq!(client.request_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn staggered_callers_on_many_threads_ask_once() {
    let client = Arc::new(MockCtpClient::new().with_latency(Duration::from_millis(2)));
    client.insert_key(ReferenceFamily::Category, "a", Some("ka"));
    let lookup = Arc::new(make_lookup(client.clone(), LookupConfig::default()));

    let mut handles = Vec::new();
    for delay in 0..64u64 {
        let lookup = lookup.clone();
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_micros(delay * 50)).await;
            lookup.fetch(ReferenceFamily::Category, ids(&["a"])).await
        }));
    }
    for handle in handles {
        let report = handle.await.unwrap();
        assert_eq!(report.resolved.get("a"), Some(&"ka".to_string()));
    }

    // callers arriving after the chunk finished are answered by the cache
    assert_eq!(client.request_count(), 1);
}
