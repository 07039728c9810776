//! In-memory settings provider

use super::Entry;
use crate::error::{StrataError, StrataResult};
use crate::events::{ChangeEvent, ChangeListener, ChangeNotifier, Subscription};
use crate::provider::{normalize_key, KeyValueStore, SettingsProvider, SettingsScope};
use crate::value::SettingsValue;
use dashmap::DashMap;

/// Volatile provider over a concurrent map.
///
/// Writable and session-scoped by default; `flush` and `reload` are no-ops
/// since there is no backing medium. Useful as an override layer above
/// file-backed providers and as a test double.
#[derive(Debug)]
pub struct MemoryProvider {
    name: String,
    priority: i32,
    read_only: bool,
    scope: SettingsScope,
    entries: DashMap<String, Entry>,
    notifier: ChangeNotifier,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Default priority, between environment overrides and file stores
    pub const DEFAULT_PRIORITY: i32 = 70;

    /// Create an empty writable provider named `memory`
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            priority: Self::DEFAULT_PRIORITY,
            read_only: false,
            scope: SettingsScope::Session,
            entries: DashMap::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Set the instance name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the read-resolution priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark the provider read-only (writes fail)
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Set the storage scope
    pub fn with_scope(mut self, scope: SettingsScope) -> Self {
        self.scope = scope;
        self
    }

    fn guard_writable(&self) -> StrataResult<()> {
        if self.read_only {
            Err(StrataError::read_only(&self.name))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryProvider {
    fn get_value(&self, key: &str) -> StrataResult<Option<SettingsValue>> {
        Ok(self
            .entries
            .get(&normalize_key(key))
            .map(|entry| entry.value.clone()))
    }

    fn set_value(&self, key: &str, value: SettingsValue) -> StrataResult<()> {
        self.guard_writable()?;
        let previous = self
            .entries
            .insert(normalize_key(key), Entry::new(key, value.clone()));
        let event = match previous {
            Some(old) => ChangeEvent::modified(key, old.value, value, &self.name),
            None => ChangeEvent::added(key, value, &self.name),
        };
        self.notifier.emit(&event);
        Ok(())
    }

    fn remove(&self, key: &str) -> StrataResult<bool> {
        self.guard_writable()?;
        match self.entries.remove(&normalize_key(key)) {
            Some((_, entry)) => {
                self.notifier
                    .emit(&ChangeEvent::removed(entry.key, entry.value, &self.name));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&self) -> StrataResult<()> {
        self.guard_writable()?;
        self.entries.clear();
        self.notifier.emit(&ChangeEvent::cleared(&self.name));
        Ok(())
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize_key(key))
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key.clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn flush(&self) -> StrataResult<()> {
        Ok(())
    }
}

impl SettingsProvider for MemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn scope(&self) -> SettingsScope {
        self.scope
    }

    fn subscribe(&self, listener: ChangeListener) -> Subscription {
        self.notifier.subscribe(listener)
    }

    fn subscribe_key(&self, key: &str, listener: ChangeListener) -> Subscription {
        self.notifier.subscribe_key(key, listener)
    }

    fn reload(&self) -> StrataResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_set_get_remove() {
        let provider = MemoryProvider::new();
        provider.set_value("k", SettingsValue::Int(1)).unwrap();
        assert_eq!(provider.get_value("k").unwrap(), Some(SettingsValue::Int(1)));
        assert!(provider.remove("k").unwrap());
        assert!(!provider.remove("k").unwrap());
        assert_eq!(provider.get_value("k").unwrap(), None);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let provider = MemoryProvider::new();
        provider.set_value("Database.Host", SettingsValue::Text("a".into())).unwrap();
        provider.set_value("database.host", SettingsValue::Text("b".into())).unwrap();
        assert_eq!(provider.len(), 1);
        assert!(provider.contains_key("DATABASE.HOST"));
        assert_eq!(
            provider.get_value("database.HOST").unwrap(),
            Some(SettingsValue::Text("b".into()))
        );
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let provider = MemoryProvider::new().read_only();
        let result = provider.set_value("k", SettingsValue::Int(1));
        assert!(matches!(result, Err(StrataError::ReadOnly { .. })));
        assert!(matches!(provider.clear(), Err(StrataError::ReadOnly { .. })));
    }

    #[test]
    fn test_clear_fires_single_cleared_event() {
        let provider = MemoryProvider::new();
        provider.set_value("a", SettingsValue::Int(1)).unwrap();
        provider.set_value("b", SettingsValue::Int(2)).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = provider.subscribe(Arc::new(move |event: &ChangeEvent| {
            sink.lock().unwrap().push(event.kind);
        }));

        provider.clear().unwrap();
        assert_eq!(provider.len(), 0);
        assert!(provider.keys().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![ChangeKind::Cleared]);
    }

    #[test]
    fn test_added_then_modified_events() {
        let provider = MemoryProvider::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = provider.subscribe(Arc::new(move |event: &ChangeEvent| {
            sink.lock().unwrap().push((event.kind, event.old_value.clone()));
        }));

        provider.set_value("k", SettingsValue::Int(1)).unwrap();
        provider.set_value("k", SettingsValue::Int(2)).unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(events[0], (ChangeKind::Added, None));
        assert_eq!(events[1], (ChangeKind::Modified, Some(SettingsValue::Int(1))));
    }
}
