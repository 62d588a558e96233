//! Product projection and product draft.
//!
//! The product is the richest resource shape in the catalog: it owns category
//! membership, order hints and the variant tree. Other resource kinds are
//! modeled by their orchestrators.

use crate::ids::ResourceId;
use crate::model::{LocalizedString, ProductVariant, ProductVariantDraft};
use crate::reference::{nested_references, Reference};
use crate::resource::{SyncDraft, SyncResource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// The staged projection of a persisted product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub version: u64,
    pub product_type: Reference,
    pub name: LocalizedString,
    pub slug: LocalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(default)]
    pub categories: Vec<Reference>,
    /// Category key (or id before resolution) → order hint.
    #[serde(default)]
    pub category_order_hints: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_category: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Reference>,
    pub master_variant: ProductVariant,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
    #[serde(default)]
    pub published: bool,
}

impl Product {
    /// Master variant followed by the other variants.
    pub fn all_variants(&self) -> impl Iterator<Item = &ProductVariant> {
        std::iter::once(&self.master_variant).chain(self.variants.iter())
    }

    /// Every reference held by the product, for resolution of the target side.
    pub fn references_mut(&mut self) -> Vec<&mut Reference> {
        let mut refs = vec![&mut self.product_type];
        refs.extend(self.categories.iter_mut());
        refs.extend(self.tax_category.iter_mut());
        refs.extend(self.state.iter_mut());
        for variant in std::iter::once(&mut self.master_variant).chain(self.variants.iter_mut()) {
            for price in &mut variant.prices {
                refs.extend(price.draft.customer_group.iter_mut());
                refs.extend(price.draft.channel.iter_mut());
                refs.extend(price.draft.custom.iter_mut().map(|c| &mut c.type_ref));
            }
            for asset in &mut variant.assets {
                refs.extend(asset.draft.custom.iter_mut().map(|c| &mut c.type_ref));
            }
        }
        refs
    }

    /// Reference objects nested in attribute and custom-field values.
    pub fn nested_references_mut(&mut self) -> Vec<&mut Value> {
        let mut values: Vec<&mut Value> = Vec::new();
        for variant in std::iter::once(&mut self.master_variant).chain(self.variants.iter_mut()) {
            values.extend(variant.attributes.iter_mut().map(|a| &mut a.value));
            for price in &mut variant.prices {
                values.extend(price.draft.custom.iter_mut().flat_map(|c| c.fields.values_mut()));
            }
            for asset in &mut variant.assets {
                values.extend(asset.draft.custom.iter_mut().flat_map(|c| c.fields.values_mut()));
            }
        }
        values.into_iter().flat_map(nested_references).collect()
    }

    /// Replaces order-hint map keys that are resolved ids with their keys.
    pub fn rekey_order_hints(&mut self, resolved: &HashMap<ResourceId, String>) {
        rekey(&mut self.category_order_hints, resolved);
    }
}

impl SyncResource for Product {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Desired state of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub product_type: Reference,
    pub name: LocalizedString,
    pub slug: LocalizedString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedString>,
    #[serde(default)]
    pub categories: Vec<Reference>,
    #[serde(default)]
    pub category_order_hints: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_category: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_variant: Option<ProductVariantDraft>,
    #[serde(default)]
    pub variants: Vec<ProductVariantDraft>,
    #[serde(default)]
    pub publish: bool,
}

impl ProductDraft {
    /// Creates a draft with the required fields; everything else empty.
    #[must_use]
    pub fn new(key: impl Into<String>, product_type: Reference, name: LocalizedString) -> Self {
        Self {
            key: Some(key.into()),
            product_type,
            slug: name.clone(),
            name,
            description: None,
            categories: Vec::new(),
            category_order_hints: BTreeMap::new(),
            tax_category: None,
            state: None,
            master_variant: None,
            variants: Vec::new(),
            publish: false,
        }
    }

    /// Master variant (if any) followed by the other variants.
    pub fn all_variants(&self) -> impl Iterator<Item = &ProductVariantDraft> {
        self.master_variant.iter().chain(self.variants.iter())
    }

    /// Every reference held by the draft. This is the draft's extraction
    /// function for the reference resolver.
    pub fn references_mut(&mut self) -> Vec<&mut Reference> {
        let mut refs = vec![&mut self.product_type];
        refs.extend(self.categories.iter_mut());
        refs.extend(self.tax_category.iter_mut());
        refs.extend(self.state.iter_mut());
        for variant in self.master_variant.iter_mut().chain(self.variants.iter_mut()) {
            for price in &mut variant.prices {
                refs.extend(price.customer_group.iter_mut());
                refs.extend(price.channel.iter_mut());
                refs.extend(price.custom.iter_mut().map(|c| &mut c.type_ref));
            }
            for asset in &mut variant.assets {
                refs.extend(asset.custom.iter_mut().map(|c| &mut c.type_ref));
            }
        }
        refs
    }

    /// Reference objects nested in attribute and custom-field values, such as
    /// a product-reference attribute. They are JSON, not [`Reference`]s, and
    /// are resolved through [`Reference::from_json`].
    pub fn nested_references_mut(&mut self) -> Vec<&mut Value> {
        let mut values: Vec<&mut Value> = Vec::new();
        for variant in self.master_variant.iter_mut().chain(self.variants.iter_mut()) {
            values.extend(variant.attributes.iter_mut().map(|a| &mut a.value));
            for price in &mut variant.prices {
                values.extend(price.custom.iter_mut().flat_map(|c| c.fields.values_mut()));
            }
            for asset in &mut variant.assets {
                values.extend(asset.custom.iter_mut().flat_map(|c| c.fields.values_mut()));
            }
        }
        values.into_iter().flat_map(nested_references).collect()
    }

    /// Replaces order-hint map keys that are resolved ids with their keys.
    pub fn rekey_order_hints(&mut self, resolved: &HashMap<ResourceId, String>) {
        rekey(&mut self.category_order_hints, resolved);
    }
}

impl SyncDraft for ProductDraft {
    fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

fn rekey(hints: &mut BTreeMap<String, String>, resolved: &HashMap<ResourceId, String>) {
    if resolved.is_empty() {
        return;
    }
    *hints = std::mem::take(hints)
        .into_iter()
        .map(|(category, hint)| match resolved.get(category.as_str()) {
            Some(key) => (key.clone(), hint),
            None => (category, hint),
        })
        .collect();
}
