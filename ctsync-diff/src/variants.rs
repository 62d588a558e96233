//! Variant tree diffs: matching by key, per-variant recursion and master
//! variant changes.

use crate::assets::build_asset_actions;
use crate::attributes::{build_attribute_actions, dedup_same_for_all, AttributeMetaDataMap};
use crate::common::build_update_action;
use crate::error::{SynthesisError, SynthesisResult};
use crate::images::build_image_actions;
use crate::prices::build_price_actions;
use ctsync_types::{is_blank, Product, ProductDraft, ProductVariant, ProductVariantDraft, UpdateAction};
use std::collections::{HashMap, HashSet};

/// Builds every variant-level action for a product.
///
/// Old non-master variants missing from the draft are removed, matched
/// variants are diffed field by field and new ones are added. If the master
/// key changed the master moves by sku, and the old master is removed when the
/// draft no longer contains it. The result is unordered; run it through
/// [`crate::ordering::order_actions`] before execution.
pub fn build_variant_actions(
    old: &Product,
    new: &ProductDraft,
    metadata: Option<&AttributeMetaDataMap>,
) -> SynthesisResult<Vec<UpdateAction>> {
    let new_master = new.master_variant.as_ref().ok_or(SynthesisError::MissingMasterVariant)?;

    let new_variants: Vec<&ProductVariantDraft> = new.all_variants().collect();
    for (position, variant) in new_variants.iter().enumerate() {
        if is_blank(variant.key.as_deref()) {
            return Err(SynthesisError::BlankVariantKey { position });
        }
    }
    let new_keys: HashSet<&str> = new_variants.iter().filter_map(|v| v.key.as_deref()).collect();

    let old_by_key: HashMap<&str, &ProductVariant> = old
        .all_variants()
        .filter_map(|v| v.key.as_deref().map(|k| (k, v)))
        .collect();

    let mut actions = Vec::new();

    for variant in &old.variants {
        let keep = variant.key.as_deref().is_some_and(|k| new_keys.contains(k));
        if !keep {
            actions.push(UpdateAction::RemoveVariant { id: variant.id });
        }
    }

    for draft in &new_variants {
        let key = draft.key.as_deref().unwrap_or_default();
        match old_by_key.get(key) {
            Some(old_variant) => {
                actions.extend(build_matched_variant_actions(old_variant, draft, key, metadata)?);
            }
            None => actions.push(add_variant(draft)),
        }
    }

    let old_master_key = old.master_variant.key.as_deref();
    let new_master_key = new_master.key.as_deref().unwrap_or_default();
    if old_master_key != Some(new_master_key) {
        let sku = new_master
            .sku
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SynthesisError::BlankMasterSku {
                key: new_master_key.to_string(),
            })?;
        actions.push(UpdateAction::ChangeMasterVariant { sku: sku.to_string() });

        let old_master_kept = old_master_key.is_some_and(|k| new_keys.contains(k));
        if !old_master_kept {
            actions.push(UpdateAction::RemoveVariant {
                id: old.master_variant.id,
            });
        }
    }

    Ok(dedup_same_for_all(actions))
}

/// Diffs one matched variant: attributes, images, prices, assets and sku.
pub fn build_matched_variant_actions(
    old: &ProductVariant,
    new: &ProductVariantDraft,
    key: &str,
    metadata: Option<&AttributeMetaDataMap>,
) -> SynthesisResult<Vec<UpdateAction>> {
    let mut actions = build_attribute_actions(old.id, key, &old.attributes, &new.attributes, metadata)?;
    actions.extend(build_image_actions(old.id, &old.images, &new.images));
    actions.extend(build_price_actions(old.id, &old.prices, &new.prices));
    actions.extend(build_asset_actions(Some(old.id), &old.assets, &new.assets)?);
    actions.extend(build_update_action(old.sku.as_ref(), new.sku.as_ref(), || UpdateAction::SetSku {
        variant_id: old.id,
        sku: new.sku.clone().filter(|s| !s.is_empty()),
    }));
    Ok(actions)
}

fn add_variant(draft: &ProductVariantDraft) -> UpdateAction {
    UpdateAction::AddVariant {
        key: draft.key.clone(),
        sku: draft.sku.clone(),
        prices: draft.prices.clone(),
        images: draft.images.clone(),
        attributes: draft.attributes.clone(),
        assets: draft.assets.clone(),
    }
}
