// Storage integration tests over a durable backend on disk


use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_helper::{NOW, durable_backend, init_logging, storage_at};
use webstash::{DurableStorage, Expiry, INDEX_KEY, SharedBackend, StorageBackend};

#[test]
fn test_set_then_get_before_expiry() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (storage, _) = storage_at("https://example.com/app/", &backend);

    for (key, value) in [("a", "alpha"), ("b", "with spaces"), ("c", "{\"json\":1}")] {
        storage.set_item(key, value, Expiry::At(NOW + 60_000), None);
        assert_eq!(storage.get_item(key, None).as_deref(), Some(value));
    }
}

#[test]
fn test_past_expiry_reads_none_and_drops_from_index() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (storage, _) = storage_at("https://example.com/", &backend);

    storage.set_item("stale", "v", Expiry::At(NOW - 1), None);
    assert_eq!(storage.index(), vec!["stale".to_string()]);

    assert_eq!(storage.get_item("stale", None), None);
    assert!(!storage.index().contains(&"stale".to_string()));
}

#[test]
fn test_theme_scenario() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (storage, clock) = storage_at("https://example.com/", &backend);

    storage.set_item("theme", "dark", Expiry::At(NOW + 10_000), None);
    assert_eq!(storage.get_item("theme", None).as_deref(), Some("dark"));

    clock.advance(Duration::from_millis(10_001));
    assert_eq!(storage.get_item("theme", None), None);
}

#[test]
fn test_remove_after_set() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (storage, _) = storage_at("https://example.com/", &backend);

    storage.set("k", "v");
    storage.remove_item("k", None);
    assert_eq!(storage.get_item("k", None), None);
}

#[test]
fn test_clear_keeps_other_origins() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (shop, _) = storage_at("https://shop.example.com/", &backend);
    let (blog, _) = storage_at("https://blog.example.com/posts", &backend);

    shop.set("cart", "3 items");
    shop.set("currency", "EUR");
    blog.set("draft", "hello");

    assert_eq!(blog.clear(Some("shop.example.com")), 2);
    assert_eq!(shop.get_item("cart", None), None);
    assert_eq!(shop.get_item("currency", None), None);
    assert_eq!(blog.get_item("draft", None).as_deref(), Some("hello"));
}

#[test]
fn test_clear_all_empties_index() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (a, _) = storage_at("https://a.example/", &backend);
    let (b, _) = storage_at("https://b.example/", &backend);

    a.set("one", "1");
    b.set("two", "2");
    b.set_item("three", "3", Expiry::Never, Some("tab"));

    assert_eq!(a.clear_all(), 3);
    assert!(a.index().is_empty());
    assert!(b.index().is_empty());
    assert_eq!(b.get_item("three", Some("tab")), None);
}

#[test]
fn test_fragment_isolation() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (storage, _) = storage_at("https://example.com/mail#inbox", &backend);

    storage.set("scroll", "120");
    storage.set_item("scroll", "40", Expiry::Never, Some("drafts"));

    assert_eq!(storage.get_item("scroll", None).as_deref(), Some("120"));
    assert_eq!(storage.get_item("scroll", Some("drafts")).as_deref(), Some("40"));
    assert_eq!(storage.index().len(), 2);

    storage.remove_item("scroll", Some("drafts"));
    assert_eq!(storage.get_item("scroll", None).as_deref(), Some("120"));
}

#[test]
fn test_paths_are_namespaced() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (home, _) = storage_at("https://example.com/home", &backend);
    let (settings, _) = storage_at("https://example.com/settings", &backend);

    home.set("layout", "grid");
    assert_eq!(settings.get_item("layout", None), None);
    assert_eq!(home.get_item("layout", None).as_deref(), Some("grid"));
}

#[test]
fn test_values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local.json");

    {
        let backend: SharedBackend = Arc::new(DurableStorage::open(&path, None).unwrap());
        let (storage, _) = storage_at("https://example.com/", &backend);
        storage.set("persisted", "yes");
        storage.set_item("short", "lived", Expiry::At(NOW + 5), None);
    }

    let backend: SharedBackend = Arc::new(DurableStorage::open(&path, None).unwrap());
    let (storage, clock) = storage_at("https://example.com/", &backend);
    assert_eq!(storage.get_item("persisted", None).as_deref(), Some("yes"));

    clock.advance(Duration::from_millis(5));
    assert_eq!(storage.get_item("short", None), None);
}

#[test]
fn test_index_written_by_older_clients_is_read() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    backend
        .set_item(
            INDEX_KEY,
            r#"{"example.com":{"example.com/#@legacy":1.7976931348623157e308}}"#,
        )
        .unwrap();
    backend.set_item("example.com/#@legacy", "kept").unwrap();

    let (storage, _) = storage_at("https://example.com/", &backend);
    assert_eq!(storage.get_item("legacy", None).as_deref(), Some("kept"));
    assert_eq!(storage.remaining_ttl_ms("legacy", None), Some(None));
}

#[test]
fn test_malformed_index_is_replaced() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    backend.set_item(INDEX_KEY, "garbage").unwrap();

    let (storage, _) = storage_at("https://example.com/", &backend);
    assert!(storage.index().is_empty());

    storage.set("fresh", "v");
    assert_eq!(storage.index(), vec!["fresh".to_string()]);
    assert_eq!(storage.get_item("fresh", None).as_deref(), Some("v"));
}

#[test]
fn test_typed_reads() {
    let dir = TempDir::new().unwrap();
    let backend = durable_backend(&dir);
    let (storage, _) = storage_at("https://example.com/", &backend);

    storage.set("prefs", &serde_json::json!({"fontSize": 14, "dark": true}));
    storage.set("name", "Ada");

    let prefs: serde_json::Value = storage.get_json("prefs", None).unwrap();
    assert_eq!(prefs["fontSize"], 14);
    assert_eq!(storage.get_json::<_, String>("name", None).as_deref(), Some("Ada"));
    assert_eq!(storage.get_json::<_, u32>("name", None), None);
}
