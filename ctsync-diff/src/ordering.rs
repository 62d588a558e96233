//! Conflict-avoidance ordering of update actions.
//!
//! The remote store rejects transient uniqueness violations, so the order in
//! which actions reach it matters:
//!
//! 1. remove non-master variants
//! 2. set attributes in all variants
//! 3. everything else
//! 4. add variants
//! 5. change the master variant
//! 6. remove the old master variant
//! 7. publish / unpublish
//!
//! Within groups 2 and 3, actions of one kind (images, prices, assets,
//! attributes) are reordered among the slots they already occupy: removals
//! before changes before additions, and unsets before sets. Unrelated actions
//! keep their positions. All sorting is stable.

use ctsync_types::UpdateAction;

/// Orders `actions` for execution. `old_master_id` is the variant id of the
/// current master; a `RemoveVariant` for it is placed last.
pub fn order_actions(actions: Vec<UpdateAction>, old_master_id: Option<u32>) -> Vec<UpdateAction> {
    let mut ranked: Vec<(u8, UpdateAction)> = actions
        .into_iter()
        .map(|action| (rank(&action, old_master_id), action))
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);

    let mut ordered: Vec<UpdateAction> = ranked.into_iter().map(|(_, action)| action).collect();
    for kind in [Kind::Image, Kind::Price, Kind::Asset, Kind::Attribute, Kind::AttributeInAll] {
        sort_within_slots(&mut ordered, kind);
    }
    ordered
}

fn rank(action: &UpdateAction, old_master_id: Option<u32>) -> u8 {
    match action {
        UpdateAction::RemoveVariant { id } if Some(*id) == old_master_id => 5,
        UpdateAction::RemoveVariant { .. } => 0,
        UpdateAction::SetAttributeInAllVariants { .. } => 1,
        UpdateAction::AddVariant { .. } => 3,
        UpdateAction::ChangeMasterVariant { .. } => 4,
        UpdateAction::Publish | UpdateAction::Unpublish => 6,
        _ => 2,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Image,
    Price,
    Asset,
    Attribute,
    AttributeInAll,
}

/// The kind of an action and its position within that kind's sub-order.
fn sub_rank(action: &UpdateAction) -> Option<(Kind, u8)> {
    let ranked = match action {
        UpdateAction::RemoveImage { .. } => (Kind::Image, 0),
        UpdateAction::AddExternalImage { .. } => (Kind::Image, 1),
        UpdateAction::MoveImageToPosition { .. } => (Kind::Image, 2),
        UpdateAction::RemovePrice { .. } => (Kind::Price, 0),
        UpdateAction::ChangePrice { .. } => (Kind::Price, 1),
        UpdateAction::AddPrice { .. } => (Kind::Price, 2),
        UpdateAction::RemoveAsset { .. } => (Kind::Asset, 0),
        UpdateAction::SetAssetField { .. } | UpdateAction::ChangeAssetOrder { .. } => (Kind::Asset, 1),
        UpdateAction::AddAsset { .. } => (Kind::Asset, 2),
        UpdateAction::SetAttribute { value, .. } => (Kind::Attribute, u8::from(value.is_some())),
        UpdateAction::SetAttributeInAllVariants { value, .. } => {
            (Kind::AttributeInAll, u8::from(value.is_some()))
        }
        _ => return None,
    };
    Some(ranked)
}

fn sort_within_slots(actions: &mut [UpdateAction], kind: Kind) {
    let slots: Vec<usize> = actions
        .iter()
        .enumerate()
        .filter(|(_, a)| sub_rank(a).is_some_and(|(k, _)| k == kind))
        .map(|(i, _)| i)
        .collect();
    if slots.len() < 2 {
        return;
    }

    let mut members: Vec<UpdateAction> = slots.iter().map(|&i| actions[i].clone()).collect();
    members.sort_by_key(|a| sub_rank(a).map_or(0, |(_, r)| r));
    for (slot, action) in slots.into_iter().zip(members) {
        actions[slot] = action;
    }
}
