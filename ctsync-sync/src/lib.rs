//! Sync layer for ctsync.
//!
//! Takes drafts exported from a source project and makes a target project
//! match them:
//!
//! - **Resolution**: id-references in drafts are rewritten to key-references
//!   through a shared [`IdentifierCache`] and batched remote lookups
//! - **Synthesis**: each draft is diffed against its current resource by the
//!   `ctsync-diff` synthesizers
//! - **Execution**: the resulting update actions are split into requests that
//!   respect the per-request ceiling, threading the version through
//! - **Lazy resolution**: drafts whose references are not there yet are parked
//!   in a persistent ledger and retried once they are
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ctsync_sync::{product_engine, transport::mock::MockCtpClient, SyncOptions};
//!
//! let source = Arc::new(MockCtpClient::new());
//! let target = Arc::new(MockCtpClient::new());
//! let engine = product_engine(source, target, SyncOptions::default()).unwrap();
//! assert!(engine.parked_keys().is_empty());
//! ```

pub mod cache;
pub mod document_store;
mod engine;
mod error;
pub mod executor;
pub mod ledger;
pub mod lookup;
pub mod metadata;
pub mod options;
mod products;
pub mod query;
pub mod resolver;
mod statistics;
pub mod transport;
pub mod validator;

pub use cache::{CacheConfig, CacheEntry, IdentifierCache};
pub use document_store::{DocumentStore, RemoteDocumentStore, SqliteDocumentStore, StoredDocument};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use executor::{BatchExecutor, ExecutionReport, ExecutorConfig};
pub use ledger::{ledger_key, CleanupStatistics, UnresolvedReferenceLedger, WaitingToBeResolved};
pub use lookup::{chunk_ids, BatchedLookupClient, LookupConfig, LookupReport};
pub use metadata::{MetadataProvider, NoMetadata, ProductTypeAttributes};
pub use options::{SyncOptions, SyncSettings};
pub use products::product_engine;
pub use query::{QueryField, ResourceKeyIdQuery, DEFAULT_QUERY_LIMIT};
pub use resolver::{ReferenceResolver, ResolutionGap, ResolutionOutcome};
pub use statistics::SyncStatistics;
pub use transport::{CtpClient, CtpRequest, CtpResponse, ResourceKeyId};
pub use validator::{validate_batch, ValidationOutcome};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
