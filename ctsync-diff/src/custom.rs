//! Custom type and custom field diffs.

use ctsync_types::{CustomFields, UpdateAction};
use std::collections::BTreeMap;

/// Builds custom-field actions for a resource.
///
/// A type change replaces the whole custom block. With the same type, each
/// changed, added or removed field gets its own `SetCustomField`.
pub fn build_custom_actions(old: Option<&CustomFields>, new: Option<&CustomFields>) -> Vec<UpdateAction> {
    match (old, new) {
        (None, None) => Vec::new(),
        (Some(_), None) => vec![UpdateAction::SetCustomType {
            type_ref: None,
            fields: BTreeMap::new(),
        }],
        (None, Some(new)) => vec![set_custom_type(new)],
        (Some(old), Some(new)) if old.type_ref != new.type_ref => vec![set_custom_type(new)],
        (Some(old), Some(new)) => {
            let mut actions = Vec::new();
            for (name, value) in &new.fields {
                if old.fields.get(name) != Some(value) {
                    actions.push(UpdateAction::SetCustomField {
                        name: name.clone(),
                        value: (!value.is_null()).then(|| value.clone()),
                    });
                }
            }
            for name in old.fields.keys() {
                if !new.fields.contains_key(name) {
                    actions.push(UpdateAction::SetCustomField {
                        name: name.clone(),
                        value: None,
                    });
                }
            }
            actions
        }
    }
}

fn set_custom_type(custom: &CustomFields) -> UpdateAction {
    UpdateAction::SetCustomType {
        type_ref: Some(custom.type_ref.clone()),
        fields: custom.fields.clone(),
    }
}
