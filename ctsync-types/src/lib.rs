//! Core type definitions for ctsync.
//!
//! This crate defines the types shared by the synthesis and sync layers:
//! - Platform identifiers and blank/UUID checks
//! - References between resources, tagged by family
//! - Nested catalog entities (variants, prices, images, assets, attributes)
//! - The product projection and product draft
//! - Update actions
//! - The `SyncDraft` / `SyncResource` traits every resource kind implements
//!
//! Field lists of other resource kinds belong to their orchestrators, not here.

mod action;
mod ids;
mod model;
mod product;
mod reference;
mod resource;

pub use action::UpdateAction;
pub use ids::{is_blank, is_uuid, ResourceId};
pub use model::{
    localized, Asset, AssetDraft, AssetSource, Attribute, AttributeConstraint, AttributeMetaData,
    CustomFields, Image, ImageDimensions, LocalizedString, Money, Price, PriceCompositeId,
    PriceDraft, PriceTier, ProductVariant, ProductVariantDraft,
};
pub use product::{Product, ProductDraft};
pub use reference::{nested_references, Reference, ReferenceFamily};
pub use resource::{ResourceHandle, SyncDraft, SyncResource};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown reference family: {0}")]
    UnknownFamily(String),
}

impl std::str::FromStr for ReferenceFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ReferenceFamily::ALL
            .into_iter()
            .find(|family| family.type_id() == s)
            .ok_or_else(|| Error::UnknownFamily(s.to_string()))
    }
}

/// Converts a typed resource or draft into the JSON payload carried by the
/// transport.
pub fn to_payload<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

/// Parses a transport payload back into a typed resource or draft.
pub fn from_payload<T: serde::de::DeserializeOwned>(payload: serde_json::Value) -> Result<T> {
    Ok(serde_json::from_value(payload)?)
}
