//! Variant attribute diffs.

use crate::error::{SynthesisError, SynthesisResult};
use ctsync_types::{Attribute, AttributeMetaData, UpdateAction};
use std::collections::HashMap;

/// Attribute name → definition, as declared by the product type.
pub type AttributeMetaDataMap = HashMap<String, AttributeMetaData>;

/// Builds the attribute actions for one matched variant.
///
/// Removed attributes produce unsets, changed or added ones produce sets. An
/// attribute whose definition is same-for-all is written with
/// `SetAttributeInAllVariants`. Any attribute missing from `metadata` fails the
/// whole resource, since the action shape cannot be decided.
pub fn build_attribute_actions(
    variant_id: u32,
    variant_key: &str,
    old: &[Attribute],
    new: &[Attribute],
    metadata: Option<&AttributeMetaDataMap>,
) -> SynthesisResult<Vec<UpdateAction>> {
    let mut actions = Vec::new();

    for old_attribute in old {
        if new.iter().any(|a| a.name == old_attribute.name) {
            continue;
        }
        let meta = lookup(metadata, &old_attribute.name, variant_key)?;
        actions.push(attribute_action(variant_id, meta, &old_attribute.name, None));
    }

    for new_attribute in new {
        let old_value = old.iter().find(|a| a.name == new_attribute.name).map(|a| &a.value);
        if old_value == Some(&new_attribute.value) {
            continue;
        }
        let value = (!new_attribute.value.is_null()).then(|| new_attribute.value.clone());
        if value.is_none() && old_value.is_none() {
            continue;
        }
        let meta = lookup(metadata, &new_attribute.name, variant_key)?;
        actions.push(attribute_action(variant_id, meta, &new_attribute.name, value));
    }

    Ok(actions)
}

/// Collapses repeated identical `SetAttributeInAllVariants` actions; every
/// matched variant yields the same one.
pub fn dedup_same_for_all(actions: Vec<UpdateAction>) -> Vec<UpdateAction> {
    let mut seen: Vec<UpdateAction> = Vec::new();
    actions
        .into_iter()
        .filter(|action| {
            if !matches!(action, UpdateAction::SetAttributeInAllVariants { .. }) {
                return true;
            }
            if seen.contains(action) {
                return false;
            }
            seen.push(action.clone());
            true
        })
        .collect()
}

fn lookup<'a>(
    metadata: Option<&'a AttributeMetaDataMap>,
    name: &str,
    variant_key: &str,
) -> SynthesisResult<&'a AttributeMetaData> {
    metadata
        .and_then(|m| m.get(name))
        .ok_or_else(|| SynthesisError::MissingAttributeMetadata {
            name: name.to_string(),
            variant: variant_key.to_string(),
        })
}

fn attribute_action(
    variant_id: u32,
    meta: &AttributeMetaData,
    name: &str,
    value: Option<serde_json::Value>,
) -> UpdateAction {
    if meta.is_same_for_all() {
        UpdateAction::SetAttributeInAllVariants {
            name: name.to_string(),
            value,
        }
    } else {
        UpdateAction::SetAttribute {
            variant_id,
            name: name.to_string(),
            value,
        }
    }
}
