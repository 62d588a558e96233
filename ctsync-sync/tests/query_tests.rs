use ctsync_sync::{QueryField, ResourceKeyIdQuery, DEFAULT_QUERY_LIMIT};
use ctsync_types::{ReferenceFamily, ResourceId};
use pretty_assertions::assert_eq;

fn ids(values: &[&str]) -> Vec<ResourceId> {
    values.iter().map(|v| ResourceId::new(*v)).collect()
}

#[test]
fn renders_id_lookup() {
    let query = ResourceKeyIdQuery::by_ids(ReferenceFamily::Category, &ids(&["a", "b"]));

    assert_eq!(
        query.to_string(),
        r#"{categories(limit: 500, where: "id in (\"a\", \"b\")", sort: ["id asc"]) { results { id key } }}"#
    );
}

#[test]
fn renders_key_lookup() {
    let query = ResourceKeyIdQuery::by_keys(ReferenceFamily::ProductType, ["shirt"]);

    assert_eq!(query.field(), QueryField::Key);
    assert_eq!(query.where_clause(), r#"key in ("shirt")"#);
    assert!(query.render_body().starts_with("productTypes(limit: 500"));
    assert!(query.render_body().contains(r#"sort: ["key asc"]"#));
}

#[test]
fn blank_values_are_dropped() {
    let query = ResourceKeyIdQuery::by_keys(ReferenceFamily::Channel, ["", "  ", "web"]);

    assert_eq!(query.values(), &["web".to_string()]);
    assert!(!query.is_empty());
    assert!(ResourceKeyIdQuery::by_keys(ReferenceFamily::Channel, [""]).is_empty());
}

#[test]
fn limit_and_predicate_overrides() {
    let query = ResourceKeyIdQuery::by_ids(ReferenceFamily::State, &ids(&["s-1"]))
        .with_limit(20)
        .with_predicate(r#"initial = true"#);

    assert_eq!(query.limit(), 20);
    assert_eq!(query.predicate(), Some("initial = true"));
    assert_eq!(query.where_clause(), "initial = true");
    assert!(query.render_body().contains("limit: 20"));
}

#[test]
fn default_limit() {
    let query = ResourceKeyIdQuery::by_ids(ReferenceFamily::Type, &ids(&["t"]));
    assert_eq!(query.limit(), DEFAULT_QUERY_LIMIT);
    assert_eq!(query.family(), ReferenceFamily::Type);
}

#[test]
fn batch_uses_aliases() {
    let first = ResourceKeyIdQuery::by_ids(ReferenceFamily::Category, &ids(&["a"]));
    let second = ResourceKeyIdQuery::by_ids(ReferenceFamily::Channel, &ids(&["b"]));
    let rendered = ResourceKeyIdQuery::render_batch(&[first.clone(), second.clone()]);

    assert_eq!(
        rendered,
        format!("{{q0: {} q1: {}}}", first.render_body(), second.render_body())
    );
}
