//! Environment variable settings provider

use super::{diff_events, Entry};
use crate::error::{StrataError, StrataResult};
use crate::events::{ChangeListener, ChangeNotifier, Subscription};
use crate::provider::{normalize_key, KeyValueStore, SettingsProvider, SettingsScope};
use crate::value::SettingsValue;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read-only provider over a snapshot of the process environment.
///
/// Values are always [`SettingsValue::Text`]; typed reads rely on the
/// coercion layer (`PORT=8080` satisfies an integer read). The snapshot is
/// taken at construction; `reload` re-reads the environment and fires
/// change events for the differences.
///
/// With a prefix configured, only variables starting with it (compared
/// case-insensitively) are visible, and the prefix is stripped from the
/// exposed key: with prefix `"APP_"`, `APP_PORT=1` appears as key `PORT`.
#[derive(Debug)]
pub struct EnvProvider {
    name: String,
    priority: i32,
    scope: SettingsScope,
    prefix: Option<String>,
    entries: RwLock<HashMap<String, Entry>>,
    notifier: ChangeNotifier,
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvProvider {
    /// Default priority; environment variables conventionally override
    /// every other source
    pub const DEFAULT_PRIORITY: i32 = 100;

    /// Snapshot the whole environment
    pub fn new() -> Self {
        Self::with_prefix_option(None)
    }

    /// Snapshot variables starting with `prefix`, stripping it from keys
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_prefix_option(Some(prefix.into()))
    }

    fn with_prefix_option(prefix: Option<String>) -> Self {
        let provider = Self {
            name: "environment".to_string(),
            priority: Self::DEFAULT_PRIORITY,
            scope: SettingsScope::Session,
            prefix,
            entries: RwLock::new(HashMap::new()),
            notifier: ChangeNotifier::new(),
        };
        *provider.entries.write() = provider.snapshot();
        provider
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

    fn snapshot(&self) -> HashMap<String, Entry> {
        let mut entries = HashMap::new();
        for (name, value) in std::env::vars() {
            let key = match &self.prefix {
                Some(prefix) => {
                    if name.is_char_boundary(prefix.len())
                        && name[..prefix.len()].eq_ignore_ascii_case(prefix)
                    {
                        name[prefix.len()..].to_string()
                    } else {
                        continue;
                    }
                }
                None => name,
            };
            if key.is_empty() {
                continue;
            }
            entries.insert(
                normalize_key(&key),
                Entry::new(key, SettingsValue::Text(value)),
            );
        }
        entries
    }
}

impl KeyValueStore for EnvProvider {
    fn get_value(&self, key: &str) -> StrataResult<Option<SettingsValue>> {
        Ok(self
            .entries
            .read()
            .get(&normalize_key(key))
            .map(|entry| entry.value.clone()))
    }

    fn set_value(&self, _key: &str, _value: SettingsValue) -> StrataResult<()> {
        Err(StrataError::read_only(&self.name))
    }

    fn remove(&self, _key: &str) -> StrataResult<bool> {
        Err(StrataError::read_only(&self.name))
    }

    fn clear(&self) -> StrataResult<()> {
        Err(StrataError::read_only(&self.name))
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(&normalize_key(key))
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.key.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn flush(&self) -> StrataResult<()> {
        Ok(())
    }
}

impl SettingsProvider for EnvProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_read_only(&self) -> bool {
        true
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
        let fresh = self.snapshot();
        let events = {
            let mut entries = self.entries.write();
            let events = diff_events(&self.name, &entries, &fresh);
            *entries = fresh;
            events
        };
        for event in &events {
            self.notifier.emit(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env mutation is process-global; keep variable names unique per test.

    #[test]
    fn test_prefix_filters_and_strips() {
        unsafe {
            std::env::set_var("STRATA_TEST_A_PORT", "8080");
            std::env::set_var("UNRELATED_TEST_VAR", "x");
        }
        let provider = EnvProvider::with_prefix("STRATA_TEST_A_");
        assert_eq!(provider.get_value("PORT").unwrap(), Some(SettingsValue::Text("8080".into())));
        assert!(!provider.contains_key("UNRELATED_TEST_VAR"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        unsafe {
            std::env::set_var("STRATA_TEST_B_HOST", "db");
        }
        let provider = EnvProvider::with_prefix("strata_test_b_");
        assert!(provider.contains_key("host"));
        assert!(provider.contains_key("HOST"));
    }

    #[test]
    fn test_writes_are_rejected() {
        let provider = EnvProvider::with_prefix("STRATA_TEST_C_");
        assert!(matches!(
            provider.set_value("k", SettingsValue::Int(1)),
            Err(StrataError::ReadOnly { .. })
        ));
        assert!(provider.is_read_only());
    }

    #[test]
    fn test_reload_picks_up_external_changes() {
        let provider = EnvProvider::with_prefix("STRATA_TEST_D_");
        assert!(!provider.contains_key("LATE"));
        unsafe {
            std::env::set_var("STRATA_TEST_D_LATE", "1");
        }
        provider.reload().unwrap();
        assert!(provider.contains_key("LATE"));
    }
}
