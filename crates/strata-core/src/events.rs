//! Change notification for settings providers
//!
//! Every provider owns a [`ChangeNotifier`] and publishes one immutable
//! [`ChangeEvent`] per mutation. Subscribers register a callback for all
//! changes or for one key; the returned [`Subscription`] detaches the
//! callback when dropped. The composite store re-publishes member events
//! unmodified through its own notifier, so one subscription observes every
//! underlying mutation.

use crate::value::SettingsValue;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// The kind of mutation a change event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A key that was previously absent was set
    Added,
    /// An existing key was overwritten
    Modified,
    /// A key was deleted
    Removed,
    /// One provider's entire contents were wiped
    Cleared,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Removed => write!(f, "removed"),
            Self::Cleared => write!(f, "cleared"),
        }
    }
}

/// An immutable record describing one mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The affected key; empty for [`ChangeKind::Cleared`]
    pub key: String,
    /// What happened
    pub kind: ChangeKind,
    /// The value before the mutation, if any
    pub old_value: Option<SettingsValue>,
    /// The value after the mutation, if any
    pub new_value: Option<SettingsValue>,
    /// Name of the provider the mutation happened in
    pub provider: String,
    /// When the mutation happened
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Create an event for a newly added key
    pub fn added(key: impl Into<String>, new_value: SettingsValue, provider: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Added,
            old_value: None,
            new_value: Some(new_value),
            provider: provider.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an event for an overwritten key
    pub fn modified(
        key: impl Into<String>,
        old_value: SettingsValue,
        new_value: SettingsValue,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Modified,
            old_value: Some(old_value),
            new_value: Some(new_value),
            provider: provider.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an event for a removed key
    pub fn removed(key: impl Into<String>, old_value: SettingsValue, provider: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ChangeKind::Removed,
            old_value: Some(old_value),
            new_value: None,
            provider: provider.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create an event for a bulk wipe of one provider
    pub fn cleared(provider: impl Into<String>) -> Self {
        Self {
            key: String::new(),
            kind: ChangeKind::Cleared,
            old_value: None,
            new_value: None,
            provider: provider.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Callback invoked for each published change event
pub type ChangeListener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    /// Lowercased key filter; `None` receives everything
    filter: Option<String>,
    listener: ChangeListener,
}

struct NotifierInner {
    listeners: RwLock<Vec<ListenerEntry>>,
    next_id: AtomicU64,
}

/// Observer list distributing change events to registered listeners
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    /// Create an empty notifier
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                listeners: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a listener for all change events
    pub fn subscribe(&self, listener: ChangeListener) -> Subscription {
        self.register(None, listener)
    }

    /// Register a listener for one key (case-insensitive). `Cleared` events
    /// are always delivered since a clear affects every key implicitly.
    pub fn subscribe_key(&self, key: &str, listener: ChangeListener) -> Subscription {
        self.register(Some(key.to_lowercase()), listener)
    }

    fn register(&self, filter: Option<String>, listener: ChangeListener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push(ListenerEntry {
            id,
            filter,
            listener,
        });
        Subscription {
            notifier: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Publish an event to every matching listener.
    ///
    /// Listeners are invoked outside the registry lock, so a callback may
    /// itself subscribe or unsubscribe.
    pub fn emit(&self, event: &ChangeEvent) {
        let matching: Vec<ChangeListener> = {
            let listeners = self.inner.listeners.read();
            listeners
                .iter()
                .filter(|entry| match &entry.filter {
                    None => true,
                    Some(_) if event.kind == ChangeKind::Cleared => true,
                    Some(key) => key == &event.key.to_lowercase(),
                })
                .map(|entry| Arc::clone(&entry.listener))
                .collect()
        };
        for listener in matching {
            listener(event);
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle returned by a subscription; dropping it detaches the listener
#[must_use = "dropping the subscription immediately detaches the listener"]
pub struct Subscription {
    notifier: Weak<NotifierInner>,
    id: u64,
}

impl Subscription {
    /// Detach the listener now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.notifier.upgrade() {
            inner.listeners.write().retain(|entry| entry.id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
