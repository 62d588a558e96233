//! Errors raised while synthesizing update actions.

use thiserror::Error;

/// Result type for synthesis.
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// Reasons synthesis for one resource cannot proceed.
///
/// Each of these aborts synthesis for the resource at hand only; callers keep
/// going with the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// An attribute has no definition in the supplied metadata, so it is
    /// unknown whether it must be set per variant or for all variants.
    #[error("failed to build attribute action for '{name}' of variant '{variant}': no attribute metadata")]
    MissingAttributeMetadata { name: String, variant: String },

    /// The draft has no master variant.
    #[error("new master variant is missing")]
    MissingMasterVariant,

    /// A variant draft has no key and cannot be matched.
    #[error("variant at position {position} has a blank key")]
    BlankVariantKey { position: usize },

    /// The master variant changed but the new master has no sku to address it by.
    #[error("new master variant '{key}' has a blank sku")]
    BlankMasterSku { key: String },

    /// An asset has no key and cannot be matched.
    #[error("asset at position {position} has a blank key")]
    BlankAssetKey { position: usize },

    /// Two assets in the same container share a key.
    #[error("duplicate asset key '{key}'")]
    DuplicateAssetKey { key: String },

    /// A value could not be converted into an action payload.
    #[error("failed to serialize value for {action}: {message}")]
    Serialization { action: String, message: String },
}
