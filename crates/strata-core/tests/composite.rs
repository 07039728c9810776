//! Behavior of the composite store and builder over real providers

use std::sync::{Arc, Mutex};
use strata_core::{
    ChangeEvent, ChangeKind, CompositeStore, FileProvider, KeyValueStore, MemoryProvider,
    SettingsProvider, SettingsValue, StoreBuilder, StrataError, TypedStore,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn memory(name: &str, priority: i32) -> Arc<MemoryProvider> {
    Arc::new(MemoryProvider::new().with_name(name).with_priority(priority))
}

fn composite_over(members: Vec<Arc<dyn SettingsProvider>>) -> CompositeStore {
    CompositeStore::new(members, None).unwrap()
}

#[test]
fn higher_priority_provider_wins_reads() {
    let p1 = memory("p1", 100);
    let p2 = memory("p2", 10);
    p1.set("k", &"from-p1").unwrap();
    p2.set("k", &"from-p2").unwrap();

    let composite = composite_over(vec![p1.clone(), p2.clone()]);
    assert_eq!(composite.get::<String>("k", String::new()), "from-p1");

    // Registration order must not matter, only priority.
    let swapped = composite_over(vec![p2, p1]);
    assert_eq!(swapped.get::<String>("k", String::new()), "from-p1");
}

#[test]
fn lower_priority_provider_answers_when_alone() {
    let p1 = memory("p1", 100);
    let p2 = memory("p2", 10);
    p2.set("only-in-p2", &42i64).unwrap();

    let composite = composite_over(vec![p1, p2]);
    assert_eq!(composite.get::<i64>("only-in-p2", 0), 42);
}

#[test]
fn writes_default_to_first_writable_provider() {
    let p1: Arc<dyn SettingsProvider> = Arc::new(
        MemoryProvider::new().with_name("p1").with_priority(100).read_only(),
    );
    let p2 = memory("p2", 10);

    let composite = composite_over(vec![p1, p2.clone()]);
    composite.set("k", &"v").unwrap();
    assert_eq!(p2.get::<String>("k", String::new()), "v");
    assert_eq!(composite.get::<String>("k", String::new()), "v");
}

#[test]
fn higher_priority_value_shadows_fresh_write() {
    let p1: Arc<dyn SettingsProvider> = {
        let provider = MemoryProvider::new().with_name("p1").with_priority(100);
        provider.set("shadowed", &"p1-wins").unwrap();
        Arc::new(provider.read_only())
    };
    let p2 = memory("p2", 10);

    let composite = composite_over(vec![p1, p2.clone()]);
    composite.set("shadowed", &"p2-write").unwrap();

    // The write landed in p2 but p1 still answers the read.
    assert_eq!(p2.get::<String>("shadowed", String::new()), "p2-write");
    assert_eq!(composite.get::<String>("shadowed", String::new()), "p1-wins");
}

#[test]
fn read_only_write_target_rejects_all_writes() {
    let target: Arc<dyn SettingsProvider> = Arc::new(
        MemoryProvider::new().with_name("frozen").with_priority(100).read_only(),
    );
    let writable = memory("writable", 10);

    let composite =
        CompositeStore::new(vec![target.clone(), writable], Some(target)).unwrap();

    assert!(matches!(
        composite.set("k", &1i64),
        Err(StrataError::ReadOnly { provider }) if provider == "frozen"
    ));
    assert!(matches!(composite.remove("k"), Err(StrataError::ReadOnly { .. })));
    assert!(matches!(composite.clear(), Err(StrataError::ReadOnly { .. })));
}

#[test]
fn explicit_write_target_receives_writes() {
    let high = memory("high", 100);
    let low = memory("low", 10);

    let composite = CompositeStore::new(
        vec![high.clone(), low.clone()],
        Some(low.clone() as Arc<dyn SettingsProvider>),
    )
    .unwrap();

    composite.set("k", &1i64).unwrap();
    assert!(!high.contains_key("k"));
    assert!(low.contains_key("k"));
}

#[test]
fn key_union_deduplicates_across_members() {
    let p1 = memory("p1", 100);
    let p2 = memory("p2", 10);
    p1.set("a", &1i64).unwrap();
    p1.set("b", &1i64).unwrap();
    p2.set("B", &2i64).unwrap();
    p2.set("c", &2i64).unwrap();

    let composite = composite_over(vec![p1, p2]);
    let mut keys = composite.keys();
    keys.sort_by_key(|k| k.to_lowercase());
    assert_eq!(keys.len(), 3);
    assert_eq!(
        keys.iter().map(|k| k.to_lowercase()).collect::<Vec<_>>(),
        ["a", "b", "c"]
    );
    assert_eq!(composite.len(), 3);
}

#[test]
fn contains_key_checks_every_member() {
    let p1 = memory("p1", 100);
    let p2 = memory("p2", 10);
    p2.set("deep", &1i64).unwrap();

    let composite = composite_over(vec![p1, p2]);
    assert!(composite.contains_key("deep"));
    assert!(!composite.contains_key("absent"));
}

#[test]
fn direct_member_writes_reach_composite_subscribers() {
    let p1 = memory("p1", 100);
    let p2 = memory("p2", 10);
    let composite = composite_over(vec![p1, p2.clone()]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = composite.subscribe(Arc::new(move |event: &ChangeEvent| {
        sink.lock().unwrap().push((event.kind, event.provider.clone()));
    }));

    // Bypass the composite entirely.
    p2.set("k", &1i64).unwrap();

    let events = seen.lock().unwrap();
    assert_eq!(events.as_slice(), [(ChangeKind::Added, "p2".to_string())]);
}

#[test]
fn per_key_subscription_filters_other_keys() {
    let p1 = memory("p1", 100);
    let composite = composite_over(vec![p1]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = composite.subscribe_key("Watched.Key", Arc::new(move |event: &ChangeEvent| {
        sink.lock().unwrap().push(event.kind);
    }));

    composite.set("watched.key", &1i64).unwrap();
    composite.set("other.key", &2i64).unwrap();
    composite.clear().unwrap();

    // The key match, not the other key, plus the always-delivered clear.
    assert_eq!(*seen.lock().unwrap(), vec![ChangeKind::Added, ChangeKind::Cleared]);
}

#[test]
fn empty_builder_yields_usable_store() {
    let store = StoreBuilder::new()
        .with_application("strata-empty-config-test")
        .build_provider()
        .unwrap();
    // A default provider is present and readable.
    assert_eq!(store.get::<i64>("anything", 7), 7);
    assert!(!store.name().is_empty());
}

#[test]
fn single_provider_build_returns_identity() {
    let only: Arc<dyn SettingsProvider> = memory("only", 50);
    let built = StoreBuilder::new()
        .add_provider(Arc::clone(&only))
        .build_provider()
        .unwrap();
    assert!(Arc::ptr_eq(&built, &only));
}

#[test]
fn type_mismatch_read_yields_default() {
    let p1 = memory("p1", 100);
    p1.set("k", &"definitely not an int").unwrap();

    let composite = composite_over(vec![p1]);
    assert_eq!(composite.get::<i64>("k", 42), 42);
}

#[test]
fn clear_fires_one_event_and_empties_the_target() {
    let provider = memory("m", 50);
    provider.set("a", &1i64).unwrap();
    provider.set("b", &2i64).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = provider.subscribe(Arc::new(move |event: &ChangeEvent| {
        sink.lock().unwrap().push(event.kind);
    }));

    provider.clear().unwrap();
    assert!(provider.keys().is_empty());
    assert_eq!(provider.len(), 0);
    assert_eq!(*seen.lock().unwrap(), vec![ChangeKind::Cleared]);
}

#[test]
fn flush_forwards_to_every_member() {
    let dir = TempDir::new().unwrap();
    let file = Arc::new(FileProvider::json(dir.path().join("out.json")).unwrap());
    let mem = memory("m", 100);

    file.set("persisted", &true).unwrap();
    mem.set("volatile", &true).unwrap();

    let composite = composite_over(vec![mem, file.clone()]);
    composite.flush().unwrap();
    assert!(dir.path().join("out.json").exists());
}

#[test]
fn reload_propagates_to_members() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("live.json");
    std::fs::write(&path, r#"{"k": 1}"#).unwrap();

    let file = Arc::new(FileProvider::json(&path).unwrap());
    let composite = composite_over(vec![file.clone(), memory("m", 10)]);
    assert_eq!(composite.get::<i64>("k", 0), 1);

    // Another process edits the file.
    std::fs::write(&path, r#"{"k": 2}"#).unwrap();
    composite.reload().unwrap();
    assert_eq!(composite.get::<i64>("k", 0), 2);
}

#[test]
fn get_or_insert_with_stores_through_write_resolution() {
    let ro: Arc<dyn SettingsProvider> = Arc::new(
        MemoryProvider::new().with_name("ro").with_priority(100).read_only(),
    );
    let rw = memory("rw", 10);
    let composite = composite_over(vec![ro, rw.clone()]);

    let created: i64 = composite.get_or_insert_with("counter", || 5).unwrap();
    assert_eq!(created, 5);
    assert_eq!(rw.get::<i64>("counter", 0), 5);
    let existing: i64 = composite.get_or_insert_with("counter", || 99).unwrap();
    assert_eq!(existing, 5);
}

#[tokio::test]
async fn async_surface_mirrors_sync_semantics() {
    let p1 = memory("p1", 100);
    let p2 = memory("p2", 10);
    let composite = composite_over(vec![p1, p2]);
    let cancel = CancellationToken::new();

    composite
        .set_value_async("k", SettingsValue::Int(9), &cancel)
        .await
        .unwrap();
    let value = composite.get_value_async("k", &cancel).await.unwrap();
    assert_eq!(value, Some(SettingsValue::Int(9)));

    assert!(composite.remove_async("k", &cancel).await.unwrap());
    assert!(!composite.remove_async("k", &cancel).await.unwrap());
}

#[tokio::test]
async fn cancelled_token_aborts_composite_operations() {
    let composite = composite_over(vec![memory("m", 50)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(
        composite.get_value_async("k", &cancel).await,
        Err(StrataError::Cancelled)
    ));
    assert!(matches!(
        composite.flush_async(&cancel).await,
        Err(StrataError::Cancelled)
    ));
    assert!(matches!(
        composite.reload_async(&cancel).await,
        Err(StrataError::Cancelled)
    ));
}

#[test]
fn composite_nests_inside_composite() {
    let inner_member = memory("inner", 50);
    inner_member.set("nested.key", &1i64).unwrap();
    let inner = Arc::new(composite_over(vec![inner_member]));

    let outer = composite_over(vec![inner, memory("outer", 10)]);
    assert_eq!(outer.get::<i64>("nested.key", 0), 1);
}

#[test]
fn layered_file_env_memory_store_resolves_by_priority() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.toml");
    std::fs::write(&path, "host = \"from-file\"\nport = 1000\n").unwrap();

    unsafe {
        std::env::set_var("STRATA_LAYERED_TEST_PORT", "2000");
    }

    let store = StoreBuilder::new()
        .use_toml_file(&path)
        .unwrap()
        .use_env_with_prefix("STRATA_LAYERED_TEST_")
        .use_memory()
        .build()
        .unwrap();

    // Env (priority 100) overrides the file (priority 50).
    assert_eq!(store.get::<i64>("port", 0), 2000);
    // The file answers keys the env does not hold.
    assert_eq!(store.get::<String>("host", String::new()), "from-file");
    // Writes land in the first writable provider, the memory layer (70).
    store.set("host", &"overridden").unwrap();
    assert_eq!(store.get::<String>("host", String::new()), "overridden");
}
