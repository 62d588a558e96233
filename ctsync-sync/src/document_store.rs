//! Key/value document storage.
//!
//! The unresolved-reference ledger persists through this trait. Two backends
//! exist: [`RemoteDocumentStore`] keeps documents as custom objects in the
//! remote store, [`SqliteDocumentStore`] keeps them in a local SQLite file.

use crate::error::{SyncError, SyncResult};
use crate::lock;
use crate::transport::{CtpClient, CtpRequest};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub container: String,
    pub key: String,
    pub value: Value,
    pub last_modified_at: DateTime<Utc>,
}

/// Documents addressed by `(container, key)`. Writes are upserts.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates or replaces a document.
    async fn upsert(&self, container: &str, key: &str, value: Value) -> SyncResult<StoredDocument>;

    /// Fetches the documents that exist among `keys`.
    async fn fetch(&self, container: &str, keys: &[String]) -> SyncResult<Vec<StoredDocument>>;

    /// Deletes a document, returning it if it existed.
    async fn delete(&self, container: &str, key: &str) -> SyncResult<Option<StoredDocument>>;

    /// Up to `limit` documents last modified before `cutoff`, oldest first.
    async fn query_older_than(
        &self,
        container: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<StoredDocument>>;
}

// ── Remote ───────────────────────────────────────────────────────

/// Stores documents as custom objects in the remote store.
pub struct RemoteDocumentStore {
    client: Arc<dyn CtpClient>,
}

impl RemoteDocumentStore {
    pub fn new(client: Arc<dyn CtpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentStore for RemoteDocumentStore {
    async fn upsert(&self, container: &str, key: &str, value: Value) -> SyncResult<StoredDocument> {
        self.client
            .execute(CtpRequest::UpsertDocument {
                container: container.to_string(),
                key: key.to_string(),
                value,
            })
            .await?
            .into_document()?
            .ok_or_else(|| SyncError::Protocol(format!("upsert of '{container}/{key}' returned nothing")))
    }

    async fn fetch(&self, container: &str, keys: &[String]) -> SyncResult<Vec<StoredDocument>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.client
            .execute(CtpRequest::FetchDocuments {
                container: container.to_string(),
                keys: keys.to_vec(),
            })
            .await?
            .into_documents()
    }

    async fn delete(&self, container: &str, key: &str) -> SyncResult<Option<StoredDocument>> {
        self.client
            .execute(CtpRequest::DeleteDocument {
                container: container.to_string(),
                key: key.to_string(),
            })
            .await?
            .into_document()
    }

    async fn query_older_than(
        &self,
        container: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<StoredDocument>> {
        self.client
            .execute(CtpRequest::QueryDocuments {
                container: container.to_string(),
                cutoff,
                limit,
            })
            .await?
            .into_documents()
    }
}

// ── SQLite ───────────────────────────────────────────────────────

/// Persistent document store backed by SQLite.
///
/// Timestamps are stored as fixed-width RFC 3339 strings so they sort
/// lexicographically.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Opens (or creates) a document store at the given path.
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SyncError::Storage(format!("failed to open document store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory document store (for testing).
    pub fn open_in_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::Storage(format!("failed to open in-memory document store: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> SyncResult<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                container TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                last_modified_at TEXT NOT NULL,
                PRIMARY KEY (container, key)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_modified
                ON documents (container, last_modified_at);
            ",
        )
        .map_err(|e| SyncError::Storage(format!("failed to init document schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates or replaces a document with an explicit modification time.
    pub fn upsert_at(
        &self,
        container: &str,
        key: &str,
        value: Value,
        modified_at: DateTime<Utc>,
    ) -> SyncResult<StoredDocument> {
        let document = StoredDocument {
            container: container.to_string(),
            key: key.to_string(),
            value,
            last_modified_at: modified_at,
        };
        let conn = lock(&self.conn);
        conn.execute(
            "INSERT OR REPLACE INTO documents (container, key, value, last_modified_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                document.container,
                document.key,
                serde_json::to_string(&document.value)?,
                format_timestamp(document.last_modified_at),
            ],
        )
        .map_err(|e| SyncError::Storage(format!("failed to save document: {e}")))?;
        Ok(document)
    }

    fn fetch_blocking(&self, container: &str, keys: &[String]) -> SyncResult<Vec<StoredDocument>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let conn = lock(&self.conn);
        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT container, key, value, last_modified_at FROM documents WHERE container = ? AND key IN ({placeholders}) ORDER BY key"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| SyncError::Storage(format!("failed to prepare document query: {e}")))?;
        let args = std::iter::once(container).chain(keys.iter().map(String::as_str));
        let rows = stmt
            .query_map(params_from_iter(args), read_row)
            .map_err(|e| SyncError::Storage(format!("failed to query documents: {e}")))?;
        collect_rows(rows)
    }

    fn delete_blocking(&self, container: &str, key: &str) -> SyncResult<Option<StoredDocument>> {
        let conn = lock(&self.conn);
        let existing = conn
            .query_row(
                "SELECT container, key, value, last_modified_at FROM documents WHERE container = ?1 AND key = ?2",
                params![container, key],
                read_row,
            )
            .optional()
            .map_err(|e| SyncError::Storage(format!("failed to read document: {e}")))?;
        conn.execute(
            "DELETE FROM documents WHERE container = ?1 AND key = ?2",
            params![container, key],
        )
        .map_err(|e| SyncError::Storage(format!("failed to delete document: {e}")))?;
        existing.map(decode_row).transpose()
    }

    fn query_older_than_blocking(
        &self,
        container: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<StoredDocument>> {
        let conn = lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT container, key, value, last_modified_at FROM documents
                 WHERE container = ?1 AND last_modified_at < ?2
                 ORDER BY last_modified_at LIMIT ?3",
            )
            .map_err(|e| SyncError::Storage(format!("failed to prepare cleanup query: {e}")))?;
        let rows = stmt
            .query_map(
                params![container, format_timestamp(cutoff), limit as i64],
                read_row,
            )
            .map_err(|e| SyncError::Storage(format!("failed to query documents: {e}")))?;
        collect_rows(rows)
    }

    async fn run_blocking<T, F>(&self, f: F) -> SyncResult<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteDocumentStore) -> SyncResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| SyncError::Storage(format!("document store task failed: {e}")))?
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn upsert(&self, container: &str, key: &str, value: Value) -> SyncResult<StoredDocument> {
        let (container, key) = (container.to_string(), key.to_string());
        self.run_blocking(move |store| store.upsert_at(&container, &key, value, Utc::now()))
            .await
    }

    async fn fetch(&self, container: &str, keys: &[String]) -> SyncResult<Vec<StoredDocument>> {
        let (container, keys) = (container.to_string(), keys.to_vec());
        self.run_blocking(move |store| store.fetch_blocking(&container, &keys))
            .await
    }

    async fn delete(&self, container: &str, key: &str) -> SyncResult<Option<StoredDocument>> {
        let (container, key) = (container.to_string(), key.to_string());
        self.run_blocking(move |store| store.delete_blocking(&container, &key))
            .await
    }

    async fn query_older_than(
        &self,
        container: &str,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> SyncResult<Vec<StoredDocument>> {
        let container = container.to_string();
        self.run_blocking(move |store| store.query_older_than_blocking(&container, cutoff, limit))
            .await
    }
}

type RawRow = (String, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_row((container, key, value, modified): RawRow) -> SyncResult<StoredDocument> {
    let last_modified_at = DateTime::parse_from_rfc3339(&modified)
        .map_err(|e| SyncError::Storage(format!("invalid timestamp for document '{key}': {e}")))?
        .with_timezone(&Utc);
    Ok(StoredDocument {
        container,
        key,
        value: serde_json::from_str(&value)?,
        last_modified_at,
    })
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> SyncResult<Vec<StoredDocument>> {
    rows.map(|row| {
        row.map_err(|e| SyncError::Storage(format!("failed to read document row: {e}")))
            .and_then(decode_row)
    })
    .collect()
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
