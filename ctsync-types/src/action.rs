//! Update actions: the atomic operations sent to the remote store.
//!
//! Actions are plain values. Once built they are never mutated; reordering and
//! filtering produce new lists.

use crate::model::{AssetDraft, Attribute, Image, PriceDraft};
use crate::reference::Reference;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One atomic remote mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum UpdateAction {
    /// Sets a top-level field, or unsets it when `value` is `None`.
    /// `name` is the remote action name, e.g. `setDescription`.
    SetField {
        name: String,
        value: Option<Value>,
    },
    AddToCategory {
        category: Reference,
    },
    RemoveFromCategory {
        category: Reference,
    },
    #[serde(rename_all = "camelCase")]
    SetCategoryOrderHint {
        category_id: String,
        order_hint: Option<String>,
    },
    AddVariant {
        key: Option<String>,
        sku: Option<String>,
        prices: Vec<PriceDraft>,
        images: Vec<Image>,
        attributes: Vec<Attribute>,
        assets: Vec<AssetDraft>,
    },
    RemoveVariant {
        id: u32,
    },
    ChangeMasterVariant {
        sku: String,
    },
    #[serde(rename_all = "camelCase")]
    SetSku {
        variant_id: u32,
        sku: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SetAttribute {
        variant_id: u32,
        name: String,
        value: Option<Value>,
    },
    SetAttributeInAllVariants {
        name: String,
        value: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    AddPrice {
        variant_id: u32,
        price: PriceDraft,
    },
    #[serde(rename_all = "camelCase")]
    ChangePrice {
        price_id: String,
        price: PriceDraft,
    },
    #[serde(rename_all = "camelCase")]
    RemovePrice {
        price_id: String,
    },
    #[serde(rename_all = "camelCase")]
    AddExternalImage {
        variant_id: u32,
        image: Image,
    },
    #[serde(rename_all = "camelCase")]
    RemoveImage {
        variant_id: u32,
        image_url: String,
    },
    #[serde(rename_all = "camelCase")]
    MoveImageToPosition {
        variant_id: u32,
        image_url: String,
        position: usize,
    },
    /// `variant_id` is `None` for assets owned by the resource itself.
    #[serde(rename_all = "camelCase")]
    AddAsset {
        variant_id: Option<u32>,
        asset: AssetDraft,
        position: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveAsset {
        variant_id: Option<u32>,
        asset_key: String,
    },
    /// Full order of asset ids after the change.
    #[serde(rename_all = "camelCase")]
    ChangeAssetOrder {
        variant_id: Option<u32>,
        asset_order: Vec<String>,
    },
    /// Sets one field of an asset, e.g. `changeAssetName` or `setAssetTags`.
    #[serde(rename_all = "camelCase")]
    SetAssetField {
        variant_id: Option<u32>,
        asset_key: String,
        name: String,
        value: Option<Value>,
    },
    /// Replaces the custom type and all its fields. `None` removes both.
    SetCustomType {
        #[serde(rename = "type")]
        type_ref: Option<Reference>,
        fields: BTreeMap<String, Value>,
    },
    SetCustomField {
        name: String,
        value: Option<Value>,
    },
    Publish,
    Unpublish,
    /// A caller-defined operation this crate has no special handling for.
    Custom {
        name: String,
        payload: Value,
    },
}

impl UpdateAction {
    /// Convenience constructor for [`UpdateAction::SetField`].
    #[must_use]
    pub fn set_field(name: impl Into<String>, value: Option<Value>) -> Self {
        Self::SetField {
            name: name.into(),
            value,
        }
    }

    /// The remote action name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::SetField { name, .. } | Self::Custom { name, .. } => name,
            Self::AddToCategory { .. } => "addToCategory",
            Self::RemoveFromCategory { .. } => "removeFromCategory",
            Self::SetCategoryOrderHint { .. } => "setCategoryOrderHint",
            Self::AddVariant { .. } => "addVariant",
            Self::RemoveVariant { .. } => "removeVariant",
            Self::ChangeMasterVariant { .. } => "changeMasterVariant",
            Self::SetSku { .. } => "setSku",
            Self::SetAttribute { .. } => "setAttribute",
            Self::SetAttributeInAllVariants { .. } => "setAttributeInAllVariants",
            Self::AddPrice { .. } => "addPrice",
            Self::ChangePrice { .. } => "changePrice",
            Self::RemovePrice { .. } => "removePrice",
            Self::AddExternalImage { .. } => "addExternalImage",
            Self::RemoveImage { .. } => "removeImage",
            Self::MoveImageToPosition { .. } => "moveImageToPosition",
            Self::AddAsset { .. } => "addAsset",
            Self::RemoveAsset { .. } => "removeAsset",
            Self::ChangeAssetOrder { .. } => "changeAssetOrder",
            Self::SetAssetField { name, .. } => name,
            Self::SetCustomType { .. } => "setCustomType",
            Self::SetCustomField { .. } => "setCustomField",
            Self::Publish => "publish",
            Self::Unpublish => "unpublish",
        }
    }

    /// Whether this is an attribute action that removes the value.
    #[must_use]
    pub fn is_attribute_unset(&self) -> bool {
        matches!(
            self,
            Self::SetAttribute { value: None, .. } | Self::SetAttributeInAllVariants { value: None, .. }
        )
    }

    /// Whether this is a publish or unpublish action.
    #[must_use]
    pub fn is_publish_state(&self) -> bool {
        matches!(self, Self::Publish | Self::Unpublish)
    }
}
