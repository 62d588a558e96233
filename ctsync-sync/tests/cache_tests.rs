use ctsync_sync::{CacheConfig, CacheEntry, IdentifierCache};

fn make_cache(capacity: usize) -> IdentifierCache {
    IdentifierCache::new(CacheConfig { capacity })
}

#[test]
fn put_then_get() {
    let cache = make_cache(10);
    cache.put("c-1", "shoes");

    assert_eq!(cache.get("c-1"), Some("shoes".to_string()));
    assert!(cache.contains_resolved("c-1"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn unknown_id_has_no_entry() {
    let cache = make_cache(10);
    assert_eq!(cache.get("missing"), None);
    assert_eq!(cache.entry("missing"), None);
    assert!(cache.is_empty());
}

#[test]
fn absent_is_cached_but_not_resolved() {
    let cache = make_cache(10);
    cache.put_absent("c-2");

    assert_eq!(cache.entry("c-2"), Some(CacheEntry::Absent));
    assert_eq!(cache.get("c-2"), None);
    assert!(!cache.contains_resolved("c-2"));
}

#[test]
fn absent_never_overwrites_resolved() {
    let cache = make_cache(10);
    cache.put("c-1", "shoes");
    cache.put_absent("c-1");

    assert_eq!(cache.get("c-1"), Some("shoes".to_string()));
}

#[test]
fn resolved_overwrites_absent() {
    let cache = make_cache(10);
    cache.put_absent("c-1");
    cache.put("c-1", "shoes");

    assert_eq!(cache.entry("c-1"), Some(CacheEntry::Resolved("shoes".into())));
}

#[test]
fn forget_absent_drops_only_absent_markers() {
    let cache = make_cache(10);
    cache.put("c-1", "shoes");
    cache.put_absent("c-2");

    assert!(!cache.forget_absent("c-1"));
    assert!(cache.forget_absent("c-2"));
    assert!(!cache.forget_absent("c-2"));
    assert_eq!(cache.entry("c-2"), None);
    assert_eq!(cache.get("c-1"), Some("shoes".to_string()));
}

#[test]
fn least_recently_used_is_evicted() {
    let cache = make_cache(2);
    cache.put("a", "ka");
    cache.put("b", "kb");
    // touch "a" so "b" becomes the eviction candidate
    assert!(cache.get("a").is_some());
    cache.put("c", "kc");

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("b"), None);
    assert_eq!(cache.get("a"), Some("ka".to_string()));
    assert_eq!(cache.get("c"), Some("kc".to_string()));
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let cache = make_cache(0);
    assert_eq!(cache.capacity(), 1);
    cache.put("a", "ka");
    assert_eq!(cache.len(), 1);
}

#[test]
fn clear_empties_the_cache() {
    let cache = IdentifierCache::default();
    cache.put("a", "ka");
    cache.put_absent("b");
    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.capacity(), 10_000);
}
