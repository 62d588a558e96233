//! Batched execution of update actions.
//!
//! The remote accepts a bounded number of actions per update request and
//! rejects requests carrying a stale version. [`BatchExecutor`] splits an
//! action list into chunks and applies them one after another, feeding the
//! version returned by each chunk into the next request.

use crate::error::{SyncError, SyncResult};
use crate::transport::{CtpClient, CtpRequest};
use ctsync_types::{ReferenceFamily, ResourceHandle, UpdateAction};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for the batch executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of actions in one update request.
    pub max_actions_per_request: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_actions_per_request: 500,
        }
    }
}

/// What happened to one action list.
#[derive(Debug)]
pub struct ExecutionReport {
    /// The resource at the last version observed.
    pub handle: ResourceHandle,
    /// The resource payload returned by the last successful chunk.
    pub resource: Option<Value>,
    pub chunks_applied: usize,
    pub actions_applied: usize,
    /// The error that stopped execution. Chunks before it stay applied.
    pub failure: Option<SyncError>,
}

impl ExecutionReport {
    /// Whether every chunk was applied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Applies action lists under the per-request ceiling.
pub struct BatchExecutor {
    client: Arc<dyn CtpClient>,
    config: ExecutorConfig,
}

impl BatchExecutor {
    /// Creates an executor. A ceiling of zero is rejected.
    pub fn new(client: Arc<dyn CtpClient>, config: ExecutorConfig) -> SyncResult<Self> {
        if config.max_actions_per_request == 0 {
            return Err(SyncError::Config(
                "max_actions_per_request must be at least 1".into(),
            ));
        }
        Ok(Self { client, config })
    }

    pub fn max_actions_per_request(&self) -> usize {
        self.config.max_actions_per_request
    }

    /// Applies `actions` to the resource behind `handle`.
    ///
    /// Chunks are strictly sequential. The first failing chunk stops
    /// execution; later chunks are not attempted. An empty list sends nothing.
    pub async fn apply(
        &self,
        family: ReferenceFamily,
        handle: ResourceHandle,
        actions: Vec<UpdateAction>,
    ) -> ExecutionReport {
        let mut report = ExecutionReport {
            handle,
            resource: None,
            chunks_applied: 0,
            actions_applied: 0,
            failure: None,
        };
        let total_chunks = actions.len().div_ceil(self.config.max_actions_per_request);

        for chunk in actions.chunks(self.config.max_actions_per_request) {
            let request = CtpRequest::Update {
                family,
                id: report.handle.id.clone(),
                version: report.handle.version,
                actions: chunk.to_vec(),
            };

            match self.send(request).await {
                Ok((version, resource)) => {
                    report.handle = report.handle.at_version(version);
                    report.resource = Some(resource);
                    report.chunks_applied += 1;
                    report.actions_applied += chunk.len();
                    debug!(
                        "Applied chunk {}/{} to {} {} (now version {})",
                        report.chunks_applied, total_chunks, family, report.handle.id, version
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to apply chunk {}/{} to {} {}: {}",
                        report.chunks_applied + 1,
                        total_chunks,
                        family,
                        report.handle.id,
                        e
                    );
                    report.failure = Some(e);
                    break;
                }
            }
        }
        report
    }

    async fn send(&self, request: CtpRequest) -> SyncResult<(u64, Value)> {
        let resource = self
            .client
            .execute(request)
            .await?
            .into_resource()?
            .ok_or_else(|| SyncError::RemoteCall("updated resource no longer exists".into()))?;
        let version = resource
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| SyncError::Protocol("update response carries no version".into()))?;
        Ok((version, resource))
    }
}
