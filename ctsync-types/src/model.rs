//! Nested catalog entities shared by drafts and resources.
//!
//! These are the shapes the structural diffs operate on: variants, prices,
//! images, assets, attributes and custom fields. Top-level resource fields are
//! left to callers.

use crate::reference::Reference;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Locale → text. An empty map and a missing value compare equal in diffs.
pub type LocalizedString = BTreeMap<String, String>;

/// Builds a single-locale [`LocalizedString`].
#[must_use]
pub fn localized(locale: &str, text: &str) -> LocalizedString {
    BTreeMap::from([(locale.to_string(), text.to_string())])
}

// ── Custom fields ────────────────────────────────────────────────

/// A custom type reference plus its field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFields {
    #[serde(rename = "type")]
    pub type_ref: Reference,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

// ── Attributes ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
}

impl Attribute {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Constraint an attribute definition places on its values across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AttributeConstraint {
    #[default]
    None,
    Unique,
    CombinationUnique,
    SameForAll,
}

/// What the product type says about one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMetaData {
    pub name: String,
    #[serde(default)]
    pub constraint: AttributeConstraint,
    #[serde(default)]
    pub is_required: bool,
}

impl AttributeMetaData {
    #[must_use]
    pub fn new(name: impl Into<String>, constraint: AttributeConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
            is_required: false,
        }
    }

    /// Whether every variant must carry the same value for this attribute.
    #[must_use]
    pub fn is_same_for_all(&self) -> bool {
        self.constraint == AttributeConstraint::SameForAll
    }
}

// ── Images ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub dimensions: ImageDimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Image {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            dimensions: ImageDimensions::default(),
            label: None,
        }
    }
}

// ── Prices ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub currency_code: String,
    pub cent_amount: i64,
}

impl Money {
    #[must_use]
    pub fn new(currency_code: impl Into<String>, cent_amount: i64) -> Self {
        Self {
            currency_code: currency_code.into(),
            cent_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTier {
    pub minimum_quantity: u64,
    pub value: Money,
}

/// Desired price of a variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceDraft {
    pub value: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_group: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiers: Vec<PriceTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomFields>,
}

impl PriceDraft {
    #[must_use]
    pub fn new(value: Money) -> Self {
        Self {
            value,
            country: None,
            customer_group: None,
            channel: None,
            valid_from: None,
            valid_until: None,
            tiers: Vec::new(),
            custom: None,
        }
    }

    #[must_use]
    pub fn composite_id(&self) -> PriceCompositeId {
        PriceCompositeId {
            currency_code: self.value.currency_code.clone(),
            country: self.country.clone(),
            customer_group: self.customer_group.as_ref().map(|r| r.target().to_string()),
            channel: self.channel.as_ref().map(|r| r.target().to_string()),
            valid_from: self.valid_from.clone(),
            valid_until: self.valid_until.clone(),
        }
    }
}

/// A persisted price. Carries the platform price id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub id: String,
    #[serde(flatten)]
    pub draft: PriceDraft,
}

impl Price {
    #[must_use]
    pub fn composite_id(&self) -> PriceCompositeId {
        self.draft.composite_id()
    }
}

/// The fields that identify a price within a variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PriceCompositeId {
    pub currency_code: String,
    pub country: Option<String>,
    pub customer_group: Option<String>,
    pub channel: Option<String>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
}

// ── Assets ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub name: LocalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(default)]
    pub sources: Vec<AssetSource>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomFields>,
}

impl AssetDraft {
    #[must_use]
    pub fn new(key: impl Into<String>, name: LocalizedString) -> Self {
        Self {
            key: Some(key.into()),
            name,
            description: None,
            sources: Vec::new(),
            tags: BTreeSet::new(),
            custom: None,
        }
    }
}

/// A persisted asset. Carries the platform asset id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    #[serde(flatten)]
    pub draft: AssetDraft,
}

// ── Variants ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariantDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default)]
    pub prices: Vec<PriceDraft>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub assets: Vec<AssetDraft>,
}

impl ProductVariantDraft {
    #[must_use]
    pub fn new(key: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            sku: Some(sku.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    #[must_use]
    pub fn with_price(mut self, price: PriceDraft) -> Self {
        self.prices.push(price);
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: Image) -> Self {
        self.images.push(image);
        self
    }

    #[must_use]
    pub fn with_asset(mut self, asset: AssetDraft) -> Self {
        self.assets.push(asset);
        self
    }
}

/// A persisted variant, addressed remotely by its numeric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default)]
    pub prices: Vec<Price>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl ProductVariant {
    /// Looks up an attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}
