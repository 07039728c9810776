//! Composite resolution engine
//!
//! Binds an ordered list of providers into one logical store. Reads
//! resolve first-match in descending priority order; writes go to the
//! explicit write target or the first writable member; the key space is
//! the case-insensitive union; member change events are re-published
//! unmodified on the composite's own notifier.

use crate::error::{StrataError, StrataResult};
use crate::events::{ChangeListener, ChangeNotifier, Subscription};
use crate::provider::{guard_cancelled, KeyValueStore, SettingsProvider, SettingsScope};
use crate::value::SettingsValue;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Priority-ordered aggregate of settings providers.
///
/// The member list is sorted once at construction (stable, descending
/// priority, registration order breaks ties) and never changes. The
/// composite implements [`SettingsProvider`] itself, so it can participate
/// as a member of a larger composite.
pub struct CompositeStore {
    name: String,
    providers: Vec<Arc<dyn SettingsProvider>>,
    write_target: Option<Arc<dyn SettingsProvider>>,
    notifier: ChangeNotifier,
    // Keeps the forwarding listeners registered on every member alive;
    // dropped (and thereby detached) with the composite.
    _forwards: Vec<Subscription>,
}

impl CompositeStore {
    /// Build a composite over `providers`, optionally writing through
    /// `write_target` only.
    ///
    /// Fails when `providers` is empty. A read-only explicit target is
    /// accepted here; writes through it fail per call.
    pub fn new(
        providers: Vec<Arc<dyn SettingsProvider>>,
        write_target: Option<Arc<dyn SettingsProvider>>,
    ) -> StrataResult<Self> {
        if providers.is_empty() {
            return Err(StrataError::config(
                "a composite store needs at least one provider",
            ));
        }
        let mut providers = providers;
        providers.sort_by_key(|provider| std::cmp::Reverse(provider.priority()));

        let notifier = ChangeNotifier::new();
        let forwards = providers
            .iter()
            .map(|provider| {
                let publisher = notifier.clone();
                provider.subscribe(Arc::new(move |event| publisher.emit(event)))
            })
            .collect();

        tracing::debug!(
            "composite over [{}]",
            providers
                .iter()
                .map(|p| format!("{}({})", p.name(), p.priority()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            name: "composite".to_string(),
            providers,
            write_target,
            notifier,
            _forwards: forwards,
        })
    }

    /// Members in resolution order (highest priority first)
    pub fn providers(&self) -> &[Arc<dyn SettingsProvider>] {
        &self.providers
    }

    /// The provider all writes are routed to right now
    fn resolve_write_target(&self) -> StrataResult<&Arc<dyn SettingsProvider>> {
        if let Some(target) = &self.write_target {
            if target.is_read_only() {
                return Err(StrataError::read_only(target.name()));
            }
            return Ok(target);
        }
        self.providers
            .iter()
            .find(|provider| !provider.is_read_only())
            .ok_or(StrataError::NoWritableProvider)
    }

    /// Forward an operation to every member without early abort; the first
    /// error is surfaced after all members were attempted, later ones are
    /// logged.
    fn forward_all(
        &self,
        operation: &str,
        mut call: impl FnMut(&Arc<dyn SettingsProvider>) -> StrataResult<()>,
    ) -> StrataResult<()> {
        let mut first_error = None;
        for provider in &self.providers {
            if let Err(error) = call(provider) {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    tracing::warn!("{} of '{}' also failed: {}", operation, provider.name(), error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for CompositeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeStore")
            .field("providers", &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field(
                "write_target",
                &self.write_target.as_ref().map(|p| p.name()),
            )
            .finish()
    }
}

#[async_trait]
impl KeyValueStore for CompositeStore {
    fn get_value(&self, key: &str) -> StrataResult<Option<SettingsValue>> {
        for provider in &self.providers {
            if let Some(value) = provider.get_value(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn set_value(&self, key: &str, value: SettingsValue) -> StrataResult<()> {
        self.resolve_write_target()?.set_value(key, value)
    }

    fn remove(&self, key: &str) -> StrataResult<bool> {
        self.resolve_write_target()?.remove(key)
    }

    fn clear(&self) -> StrataResult<()> {
        self.resolve_write_target()?.clear()
    }

    fn contains_key(&self, key: &str) -> bool {
        self.providers
            .iter()
            .any(|provider| provider.contains_key(key))
    }

    fn keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for provider in &self.providers {
            for key in provider.keys() {
                if seen.insert(key.to_lowercase()) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    fn len(&self) -> usize {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            for key in provider.keys() {
                seen.insert(key.to_lowercase());
            }
        }
        seen.len()
    }

    fn flush(&self) -> StrataResult<()> {
        self.forward_all("flush", |provider| provider.flush())
    }

    async fn get_value_async(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> StrataResult<Option<SettingsValue>> {
        for provider in &self.providers {
            if let Some(value) = provider.get_value_async(key, cancel).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn set_value_async(
        &self,
        key: &str,
        value: SettingsValue,
        cancel: &CancellationToken,
    ) -> StrataResult<()> {
        self.resolve_write_target()?
            .set_value_async(key, value, cancel)
            .await
    }

    async fn remove_async(&self, key: &str, cancel: &CancellationToken) -> StrataResult<bool> {
        self.resolve_write_target()?.remove_async(key, cancel).await
    }

    async fn clear_async(&self, cancel: &CancellationToken) -> StrataResult<()> {
        self.resolve_write_target()?.clear_async(cancel).await
    }

    async fn flush_async(&self, cancel: &CancellationToken) -> StrataResult<()> {
        guard_cancelled(cancel)?;
        let mut first_error = None;
        for provider in &self.providers {
            if let Err(error) = provider.flush_async(cancel).await {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    tracing::warn!("flush of '{}' also failed: {}", provider.name(), error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SettingsProvider for CompositeStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        0
    }

    fn is_read_only(&self) -> bool {
        self.resolve_write_target().is_err()
    }

    fn scope(&self) -> SettingsScope {
        SettingsScope::Application
    }

    fn subscribe(&self, listener: ChangeListener) -> Subscription {
        self.notifier.subscribe(listener)
    }

    fn subscribe_key(&self, key: &str, listener: ChangeListener) -> Subscription {
        self.notifier.subscribe_key(key, listener)
    }

    fn reload(&self) -> StrataResult<()> {
        self.forward_all("reload", |provider| provider.reload())
    }

    async fn reload_async(&self, cancel: &CancellationToken) -> StrataResult<()> {
        guard_cancelled(cancel)?;
        let mut first_error = None;
        for provider in &self.providers {
            if let Err(error) = provider.reload_async(cancel).await {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    tracing::warn!("reload of '{}' also failed: {}", provider.name(), error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryProvider;

    fn member(name: &str, priority: i32) -> Arc<dyn SettingsProvider> {
        Arc::new(MemoryProvider::new().with_name(name).with_priority(priority))
    }

    #[test]
    fn test_requires_at_least_one_provider() {
        assert!(matches!(
            CompositeStore::new(Vec::new(), None),
            Err(StrataError::Config(_))
        ));
    }

    #[test]
    fn test_members_sorted_by_descending_priority() {
        let composite =
            CompositeStore::new(vec![member("low", 10), member("high", 100), member("mid", 50)], None)
                .unwrap();
        let order: Vec<_> = composite.providers().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(order, ["high", "mid", "low"]);
    }

    #[test]
    fn test_equal_priority_keeps_registration_order() {
        let composite =
            CompositeStore::new(vec![member("first", 50), member("second", 50)], None).unwrap();
        let order: Vec<_> = composite.providers().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(order, ["first", "second"]);
    }

    #[test]
    fn test_writes_go_to_first_writable() {
        let read_only: Arc<dyn SettingsProvider> =
            Arc::new(MemoryProvider::new().with_name("ro").with_priority(100).read_only());
        let writable = Arc::new(MemoryProvider::new().with_name("rw").with_priority(10));
        let composite = CompositeStore::new(
            vec![Arc::clone(&read_only), Arc::clone(&writable) as Arc<dyn SettingsProvider>],
            None,
        )
        .unwrap();

        composite.set_value("k", SettingsValue::Int(1)).unwrap();
        assert_eq!(writable.get_value("k").unwrap(), Some(SettingsValue::Int(1)));
    }

    #[test]
    fn test_no_writable_provider() {
        let composite = CompositeStore::new(
            vec![Arc::new(MemoryProvider::new().read_only()) as Arc<dyn SettingsProvider>],
            None,
        )
        .unwrap();
        assert!(matches!(
            composite.set_value("k", SettingsValue::Int(1)),
            Err(StrataError::NoWritableProvider)
        ));
        assert!(composite.is_read_only());
    }
}
