//! Category membership and category order hints.

use crate::common::diff_members;
use ctsync_types::{Reference, UpdateAction};
use std::collections::{BTreeMap, HashSet};

/// One `AddToCategory` per category in `new` but not in `old`.
pub fn build_add_to_category_actions(old: &[Reference], new: &[Reference]) -> Vec<UpdateAction> {
    let (added, _) = diff_members(old, new);
    added
        .into_iter()
        .map(|category| UpdateAction::AddToCategory {
            category: category.clone(),
        })
        .collect()
}

/// One `RemoveFromCategory` per category in `old` but not in `new`.
pub fn build_remove_from_category_actions(old: &[Reference], new: &[Reference]) -> Vec<UpdateAction> {
    let (_, removed) = diff_members(old, new);
    removed
        .into_iter()
        .map(|category| UpdateAction::RemoveFromCategory {
            category: category.clone(),
        })
        .collect()
}

/// Order-hint changes for the categories the resource will belong to.
///
/// Hint maps are keyed by category target (key after resolution). A hint is
/// set when it is new or its value changed, and only if the category is in
/// `new_categories`. A hint that disappeared is unset only if its category
/// stays assigned; leaving a category drops its hint on the remote side.
pub fn build_order_hint_actions(
    old_hints: &BTreeMap<String, String>,
    new_hints: &BTreeMap<String, String>,
    new_categories: &[Reference],
) -> Vec<UpdateAction> {
    let assigned: HashSet<&str> = new_categories.iter().map(Reference::target).collect();
    let mut actions = Vec::new();

    for (category, hint) in new_hints {
        if !assigned.contains(category.as_str()) {
            continue;
        }
        if old_hints.get(category) != Some(hint) {
            actions.push(UpdateAction::SetCategoryOrderHint {
                category_id: category.clone(),
                order_hint: Some(hint.clone()),
            });
        }
    }

    for category in old_hints.keys() {
        if !new_hints.contains_key(category) && assigned.contains(category.as_str()) {
            actions.push(UpdateAction::SetCategoryOrderHint {
                category_id: category.clone(),
                order_hint: None,
            });
        }
    }

    actions
}
