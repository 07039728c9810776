//! Smoke test for the facade crate surface

use std::sync::Arc;
use strata::{MemoryProvider, SettingsProvider, StoreBuilder, TypedStore};
use tempfile::TempDir;

#[test]
fn facade_builds_a_layered_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"greeting": "hello"}"#).unwrap();

    let overrides: Arc<dyn SettingsProvider> =
        Arc::new(MemoryProvider::new().with_name("overrides").with_priority(90));

    let store = StoreBuilder::new()
        .use_json_file(&path)
        .unwrap()
        .add_provider(overrides)
        .build()
        .unwrap();

    assert_eq!(store.get::<String>("greeting", String::new()), "hello");
    store.set("greeting", &"overridden").unwrap();
    assert_eq!(store.get::<String>("greeting", String::new()), "overridden");
}
