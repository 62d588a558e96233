use ctsync_diff::categories::{
    build_add_to_category_actions, build_order_hint_actions, build_remove_from_category_actions,
};
use ctsync_types::{Reference, ReferenceFamily, UpdateAction};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

fn category(key: &str) -> Reference {
    Reference::by_key(ReferenceFamily::Category, key)
}

fn hints(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ── Membership ───────────────────────────────────────────────────

#[test]
fn added_and_removed_categories() {
    let old = vec![category("A"), category("B")];
    let new = vec![category("B"), category("C")];

    let adds = build_add_to_category_actions(&old, &new);
    let removes = build_remove_from_category_actions(&old, &new);

    assert_eq!(adds, vec![UpdateAction::AddToCategory { category: category("C") }]);
    assert_eq!(removes, vec![UpdateAction::RemoveFromCategory { category: category("A") }]);
}

#[test]
fn identical_membership_produces_nothing() {
    let cats = vec![category("A"), category("B")];
    assert!(build_add_to_category_actions(&cats, &cats).is_empty());
    assert!(build_remove_from_category_actions(&cats, &cats).is_empty());
}

#[test]
fn order_of_membership_is_irrelevant() {
    let old = vec![category("A"), category("B")];
    let new = vec![category("B"), category("A")];
    assert!(build_add_to_category_actions(&old, &new).is_empty());
    assert!(build_remove_from_category_actions(&old, &new).is_empty());
}

#[test]
fn duplicates_in_draft_add_once() {
    let new = vec![category("C"), category("C")];
    assert_eq!(build_add_to_category_actions(&[], &new).len(), 1);
}

#[test]
fn empty_to_some_adds_all() {
    let new = vec![category("A"), category("B")];
    let adds = build_add_to_category_actions(&[], &new);
    assert_eq!(adds.len(), 2);
    assert!(build_remove_from_category_actions(&[], &new).is_empty());
}

// ── Order hints ──────────────────────────────────────────────────

#[test]
fn only_new_hint_is_set() {
    let old = hints(&[("A", "0.1")]);
    let new = hints(&[("A", "0.1"), ("B", "0.2")]);
    let assigned = vec![category("A"), category("B")];

    let actions = build_order_hint_actions(&old, &new, &assigned);

    assert_eq!(
        actions,
        vec![UpdateAction::SetCategoryOrderHint {
            category_id: "B".into(),
            order_hint: Some("0.2".into()),
        }]
    );
}

#[test]
fn changed_hint_is_set() {
    let old = hints(&[("A", "0.1")]);
    let new = hints(&[("A", "0.5")]);
    let actions = build_order_hint_actions(&old, &new, &[category("A")]);
    assert_eq!(
        actions,
        vec![UpdateAction::SetCategoryOrderHint {
            category_id: "A".into(),
            order_hint: Some("0.5".into()),
        }]
    );
}

#[test]
fn hint_for_unassigned_category_is_never_emitted() {
    let new = hints(&[("Z", "0.3")]);
    let actions = build_order_hint_actions(&BTreeMap::new(), &new, &[category("A")]);
    assert!(actions.is_empty());
}

#[test]
fn dropped_hint_is_unset_only_while_category_stays() {
    let old = hints(&[("A", "0.1"), ("B", "0.2")]);
    let new = BTreeMap::new();
    // B is being left entirely; only A keeps its membership.
    let actions = build_order_hint_actions(&old, &new, &[category("A")]);
    assert_eq!(
        actions,
        vec![UpdateAction::SetCategoryOrderHint {
            category_id: "A".into(),
            order_hint: None,
        }]
    );
}
