//! Asset diffs, for assets owned by a variant or by the resource itself.
//!
//! Assets are matched by key. Keys must be present and unique on both sides.

use crate::common::{build_set_field_action, to_value};
use crate::error::{SynthesisError, SynthesisResult};
use ctsync_types::{is_blank, Asset, AssetDraft, UpdateAction};
use std::collections::{HashMap, HashSet};

/// Builds asset actions: removes, then per-asset changes and reordering, then
/// adds at their target position.
pub fn build_asset_actions(
    variant_id: Option<u32>,
    old: &[Asset],
    new: &[AssetDraft],
) -> SynthesisResult<Vec<UpdateAction>> {
    let old_by_key = index_old(old)?;
    let new_keys = validate_new(new)?;

    let mut removes = Vec::new();
    let mut changes = Vec::new();
    let mut adds = Vec::new();

    for asset in old {
        let key = asset_key(&asset.draft);
        if !new_keys.contains(key) {
            removes.push(UpdateAction::RemoveAsset {
                variant_id,
                asset_key: key.to_string(),
            });
        }
    }

    for draft in new {
        let key = asset_key(draft);
        if let Some(old_asset) = old_by_key.get(key) {
            changes.extend(build_asset_field_actions(variant_id, key, &old_asset.draft, draft)?);
        }
    }

    let old_order: Vec<&str> = old
        .iter()
        .filter(|a| new_keys.contains(asset_key(&a.draft)))
        .map(|a| a.id.as_str())
        .collect();
    let new_order: Vec<&str> = new
        .iter()
        .filter_map(|d| old_by_key.get(asset_key(d)))
        .map(|a| a.id.as_str())
        .collect();
    if old_order != new_order {
        changes.push(UpdateAction::ChangeAssetOrder {
            variant_id,
            asset_order: new_order.into_iter().map(str::to_string).collect(),
        });
    }

    for (position, draft) in new.iter().enumerate() {
        if !old_by_key.contains_key(asset_key(draft)) {
            adds.push(UpdateAction::AddAsset {
                variant_id,
                asset: draft.clone(),
                position: Some(position),
            });
        }
    }

    Ok(removes.into_iter().chain(changes).chain(adds).collect())
}

fn build_asset_field_actions(
    variant_id: Option<u32>,
    key: &str,
    old: &AssetDraft,
    new: &AssetDraft,
) -> SynthesisResult<Vec<UpdateAction>> {
    let field = |name: &str, action: Option<UpdateAction>| {
        action.map(|a| match a {
            UpdateAction::SetField { value, .. } => UpdateAction::SetAssetField {
                variant_id,
                asset_key: key.to_string(),
                name: name.to_string(),
                value,
            },
            other => other,
        })
    };

    let mut actions = Vec::new();
    actions.extend(field(
        "changeAssetName",
        build_set_field_action("changeAssetName", Some(&old.name), Some(&new.name))?,
    ));
    actions.extend(field(
        "setAssetDescription",
        build_set_field_action("setAssetDescription", old.description.as_ref(), new.description.as_ref())?,
    ));
    actions.extend(field(
        "setAssetTags",
        build_set_field_action("setAssetTags", Some(&old.tags), Some(&new.tags))?,
    ));
    if old.sources != new.sources {
        actions.push(UpdateAction::SetAssetField {
            variant_id,
            asset_key: key.to_string(),
            name: "setAssetSources".to_string(),
            value: Some(to_value("setAssetSources", &new.sources)?),
        });
    }
    if old.custom != new.custom {
        let value = match &new.custom {
            Some(custom) => Some(to_value("setAssetCustomType", custom)?),
            None => None,
        };
        actions.push(UpdateAction::SetAssetField {
            variant_id,
            asset_key: key.to_string(),
            name: "setAssetCustomType".to_string(),
            value,
        });
    }
    Ok(actions)
}

fn asset_key(asset: &AssetDraft) -> &str {
    asset.key.as_deref().unwrap_or_default()
}

fn index_old(old: &[Asset]) -> SynthesisResult<HashMap<&str, &Asset>> {
    let mut by_key = HashMap::with_capacity(old.len());
    for (position, asset) in old.iter().enumerate() {
        if is_blank(asset.draft.key.as_deref()) {
            return Err(SynthesisError::BlankAssetKey { position });
        }
        if by_key.insert(asset_key(&asset.draft), asset).is_some() {
            return Err(SynthesisError::DuplicateAssetKey {
                key: asset_key(&asset.draft).to_string(),
            });
        }
    }
    Ok(by_key)
}

fn validate_new(new: &[AssetDraft]) -> SynthesisResult<HashSet<&str>> {
    let mut keys = HashSet::with_capacity(new.len());
    for (position, draft) in new.iter().enumerate() {
        if is_blank(draft.key.as_deref()) {
            return Err(SynthesisError::BlankAssetKey { position });
        }
        if !keys.insert(asset_key(draft)) {
            return Err(SynthesisError::DuplicateAssetKey {
                key: asset_key(draft).to_string(),
            });
        }
    }
    Ok(keys)
}
