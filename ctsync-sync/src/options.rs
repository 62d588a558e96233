//! Sync options and their serializable settings mirror.

use crate::cache::CacheConfig;
use crate::error::{SyncError, SyncResult};
use crate::executor::ExecutorConfig;
use crate::ledger::DEFAULT_LEDGER_CONTAINER;
use crate::lookup::LookupConfig;
use ctsync_types::UpdateAction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Receives an error, the draft and the current resource where known.
pub type ErrorCallback<D, R> = Arc<dyn Fn(&SyncError, Option<&D>, Option<&R>) + Send + Sync>;

/// Receives a warning message.
pub type WarningCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Rewrites or drops the ordered actions of an update. An empty result means
/// no update.
pub type BeforeUpdateCallback<D, R> = Arc<dyn Fn(Vec<UpdateAction>, &D, &R) -> Vec<UpdateAction> + Send + Sync>;

/// Rewrites a draft about to be created. `None` skips the creation.
pub type BeforeCreateCallback<D> = Arc<dyn Fn(D) -> Option<D> + Send + Sync>;

/// Options for one [`crate::SyncEngine`].
pub struct SyncOptions<D, R> {
    /// Drafts processed per batch.
    pub batch_size: usize,
    /// Whether keys shaped like UUIDs pass without a warning.
    pub allow_uuid_keys: bool,
    /// Ledger container for parked drafts.
    pub ledger_container: String,
    pub cache: CacheConfig,
    pub lookup: LookupConfig,
    pub executor: ExecutorConfig,
    error_callback: Option<ErrorCallback<D, R>>,
    warning_callback: Option<WarningCallback>,
    before_update: Option<BeforeUpdateCallback<D, R>>,
    before_create: Option<BeforeCreateCallback<D>>,
}

impl<D, R> Default for SyncOptions<D, R> {
    fn default() -> Self {
        Self {
            batch_size: 30,
            allow_uuid_keys: false,
            ledger_container: DEFAULT_LEDGER_CONTAINER.to_string(),
            cache: CacheConfig::default(),
            lookup: LookupConfig::default(),
            executor: ExecutorConfig::default(),
            error_callback: None,
            warning_callback: None,
            before_update: None,
            before_create: None,
        }
    }
}

impl<D, R> SyncOptions<D, R> {
    /// Builds options from loaded settings, validating them.
    pub fn from_settings(settings: &SyncSettings) -> SyncResult<Self> {
        if settings.batch_size == 0 {
            return Err(SyncError::Config("batch_size must be at least 1".into()));
        }
        if settings.max_actions_per_request == 0 {
            return Err(SyncError::Config(
                "max_actions_per_request must be at least 1".into(),
            ));
        }
        if settings.ledger_container.trim().is_empty() {
            return Err(SyncError::Config("ledger_container must not be blank".into()));
        }
        Ok(Self {
            batch_size: settings.batch_size,
            allow_uuid_keys: settings.allow_uuid_keys,
            ledger_container: settings.ledger_container.clone(),
            cache: CacheConfig {
                capacity: settings.cache_capacity,
            },
            lookup: LookupConfig {
                ids_per_chunk: settings.ids_per_chunk,
                keys_per_chunk: settings.keys_per_chunk,
                max_query_bytes: settings.max_query_bytes,
                combine_families: settings.combine_families,
            },
            executor: ExecutorConfig {
                max_actions_per_request: settings.max_actions_per_request,
            },
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_error_callback(
        mut self,
        callback: impl Fn(&SyncError, Option<&D>, Option<&R>) + Send + Sync + 'static,
    ) -> Self {
        self.error_callback = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_warning_callback(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.warning_callback = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_before_update(
        mut self,
        callback: impl Fn(Vec<UpdateAction>, &D, &R) -> Vec<UpdateAction> + Send + Sync + 'static,
    ) -> Self {
        self.before_update = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn with_before_create(mut self, callback: impl Fn(D) -> Option<D> + Send + Sync + 'static) -> Self {
        self.before_create = Some(Arc::new(callback));
        self
    }

    pub(crate) fn apply_error_callback(&self, error: &SyncError, draft: Option<&D>, resource: Option<&R>) {
        if let Some(callback) = &self.error_callback {
            callback(error, draft, resource);
        }
    }

    pub(crate) fn apply_warning_callback(&self, message: &str) {
        if let Some(callback) = &self.warning_callback {
            callback(message);
        }
    }

    pub(crate) fn apply_before_update(&self, actions: Vec<UpdateAction>, draft: &D, resource: &R) -> Vec<UpdateAction> {
        match &self.before_update {
            Some(callback) => callback(actions, draft, resource),
            None => actions,
        }
    }

    pub(crate) fn apply_before_create(&self, draft: D) -> Option<D> {
        match &self.before_create {
            Some(callback) => callback(draft),
            None => Some(draft),
        }
    }
}

/// Serializable tunables of [`SyncOptions`], for loading from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncSettings {
    pub batch_size: usize,
    pub allow_uuid_keys: bool,
    pub ledger_container: String,
    pub cache_capacity: usize,
    pub ids_per_chunk: usize,
    pub keys_per_chunk: usize,
    pub max_query_bytes: usize,
    pub combine_families: bool,
    pub max_actions_per_request: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let lookup = LookupConfig::default();
        Self {
            batch_size: 30,
            allow_uuid_keys: false,
            ledger_container: DEFAULT_LEDGER_CONTAINER.to_string(),
            cache_capacity: CacheConfig::default().capacity,
            ids_per_chunk: lookup.ids_per_chunk,
            keys_per_chunk: lookup.keys_per_chunk,
            max_query_bytes: lookup.max_query_bytes,
            combine_families: lookup.combine_families,
            max_actions_per_request: ExecutorConfig::default().max_actions_per_request,
        }
    }
}

impl SyncSettings {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
