use ctsync_sync::transport::mock::MockCtpClient;
use ctsync_sync::{BatchExecutor, CtpRequest, ExecutorConfig, SyncError};
use ctsync_types::{ReferenceFamily, ResourceHandle, UpdateAction};
use serde_json::{json, Value};
use std::sync::Arc;

fn make_actions(count: usize) -> Vec<UpdateAction> {
    (0..count)
        .map(|i| UpdateAction::set_field("setDescription", Some(json!(format!("v{i}")))))
        .collect()
}

fn make_client() -> Arc<MockCtpClient> {
    let client = MockCtpClient::new();
    client.insert(ReferenceFamily::Product, json!({ "id": "p-1", "key": "tee", "version": 7 }));
    Arc::new(client)
}

fn make_executor(client: Arc<MockCtpClient>, max_actions_per_request: usize) -> BatchExecutor {
    BatchExecutor::new(client, ExecutorConfig { max_actions_per_request }).unwrap()
}

fn handle() -> ResourceHandle {
    ResourceHandle::new("p-1", Some("tee".into()), 7)
}

/// (version, action count) of every update request, in order.
fn update_requests(client: &MockCtpClient) -> Vec<(u64, usize)> {
    client
        .requests()
        .into_iter()
        .filter_map(|request| match request {
            CtpRequest::Update { version, actions, .. } => Some((version, actions.len())),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn splits_under_the_ceiling() {
    let client = make_client();
    let executor = make_executor(client.clone(), 500);

    let report = executor.apply(ReferenceFamily::Product, handle(), make_actions(1200)).await;

    assert!(report.is_complete());
    assert_eq!(update_requests(&client), vec![(7, 500), (8, 500), (9, 200)]);
    assert_eq!(report.chunks_applied, 3);
    assert_eq!(report.actions_applied, 1200);
    assert_eq!(report.handle.version, 10);
    let resource = report.resource.unwrap();
    assert_eq!(resource["appliedActions"], json!(1200));
}

#[tokio::test]
async fn small_list_is_one_request() {
    let client = make_client();
    let executor = make_executor(client.clone(), 500);

    let report = executor.apply(ReferenceFamily::Product, handle(), make_actions(3)).await;

    assert_eq!(update_requests(&client), vec![(7, 3)]);
    assert_eq!(report.handle.version, 8);
}

#[tokio::test]
async fn empty_list_sends_nothing() {
    let client = make_client();
    let executor = make_executor(client.clone(), 500);

    let report = executor.apply(ReferenceFamily::Product, handle(), Vec::new()).await;

    assert!(report.is_complete());
    assert_eq!(client.request_count(), 0);
    assert_eq!(report.handle, handle());
    assert!(report.resource.is_none());
}

#[test]
fn zero_ceiling_is_rejected() {
    let result = BatchExecutor::new(make_client(), ExecutorConfig { max_actions_per_request: 0 });
    assert!(matches!(result, Err(SyncError::Config(_))));
}

#[tokio::test]
async fn failed_chunk_stops_execution() {
    let client = make_client();
    client.fail_when(|request| matches!(request, CtpRequest::Update { version: 8, .. }));
    let executor = make_executor(client.clone(), 2);

    let report = executor.apply(ReferenceFamily::Product, handle(), make_actions(6)).await;

    assert!(!report.is_complete());
    assert!(matches!(report.failure, Some(SyncError::RemoteCall(_))));
    // the second chunk failed, the third was never sent
    assert_eq!(update_requests(&client), vec![(7, 2), (8, 2)]);
    assert_eq!(report.chunks_applied, 1);
    assert_eq!(report.actions_applied, 2);
    assert_eq!(report.handle.version, 8);

    let stored = client.resources(ReferenceFamily::Product);
    assert_eq!(stored[0]["version"], json!(8));
    assert_eq!(stored[0]["appliedActions"], json!(2));
}

#[tokio::test]
async fn stale_version_is_rejected() {
    let client = make_client();
    let executor = make_executor(client.clone(), 500);
    let stale = ResourceHandle::new("p-1", None, 3);

    let report = executor.apply(ReferenceFamily::Product, stale, make_actions(1)).await;

    assert!(report.failure.is_some());
    assert_eq!(report.chunks_applied, 0);
    assert_eq!(client.resources(ReferenceFamily::Product)[0]["version"], json!(7));
}

#[tokio::test]
async fn resources_are_updated_independently() {
    let client = make_client();
    client.insert(ReferenceFamily::Product, json!({ "id": "p-2", "version": 1 }));
    client.fail_when(|request| {
        matches!(request, CtpRequest::Update { id, .. } if id.as_str() == "p-1")
    });
    let executor = make_executor(client.clone(), 500);

    let (first, second) = tokio::join!(
        executor.apply(ReferenceFamily::Product, handle(), make_actions(2)),
        executor.apply(ReferenceFamily::Product, ResourceHandle::new("p-2", None, 1), make_actions(2)),
    );

    assert!(first.failure.is_some());
    assert!(second.is_complete());
    assert_eq!(second.handle.version, 2);
    let versions: Vec<Value> = client
        .resources(ReferenceFamily::Product)
        .iter()
        .map(|r| r["version"].clone())
        .collect();
    assert_eq!(versions, vec![json!(7), json!(2)]);
}
