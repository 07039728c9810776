//! The provider contract
//!
//! Every backend implements the same two traits: [`KeyValueStore`] is the
//! operational surface (reads, writes, enumeration, flush) and
//! [`SettingsProvider`] adds identity, priority, scope, reload and change
//! subscription. The composite store consumes the contract and implements
//! it, so a composite can itself be a member of a larger composite.
//!
//! All synchronous operations run to completion on the calling thread. The
//! async counterparts are thin wrappers: by default they check the
//! cancellation token and delegate to the sync form; providers doing real
//! I/O override them and suspend only inside the I/O call.

use crate::error::{StrataError, StrataResult};
use crate::events::{ChangeListener, Subscription};
use crate::value::SettingsValue;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// The logical storage tier a provider's backing location corresponds to.
///
/// Informational: leaf providers use it to choose a storage location; the
/// composite's resolution logic does not consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SettingsScope {
    /// Per-user settings (e.g. under the user configuration directory)
    #[default]
    User,
    /// Machine-wide settings
    Machine,
    /// Per-application-install settings
    Application,
    /// Settings that live only for the current session
    Session,
}

impl std::fmt::Display for SettingsScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Machine => write!(f, "machine"),
            Self::Application => write!(f, "application"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Fail with [`StrataError::Cancelled`] if the token has fired
pub(crate) fn guard_cancelled(cancel: &CancellationToken) -> StrataResult<()> {
    if cancel.is_cancelled() {
        Err(StrataError::Cancelled)
    } else {
        Ok(())
    }
}

/// Normalized form used for case-insensitive key comparison
pub(crate) fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}

/// The operational surface of a settings backend
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the raw value stored under `key`, or `Ok(None)` if absent.
    ///
    /// A missing key is never an error; only backing-store failures are.
    fn get_value(&self, key: &str) -> StrataResult<Option<SettingsValue>>;

    /// Insert or overwrite `key`. Fails with [`StrataError::ReadOnly`] on a
    /// read-only store.
    fn set_value(&self, key: &str, value: SettingsValue) -> StrataResult<()>;

    /// Delete `key` if present; returns whether a deletion occurred. Fails
    /// with [`StrataError::ReadOnly`] on a read-only store.
    fn remove(&self, key: &str) -> StrataResult<bool>;

    /// Delete all keys. Fails with [`StrataError::ReadOnly`] on a read-only
    /// store.
    fn clear(&self) -> StrataResult<()>;

    /// Whether `key` is present (case-insensitive)
    fn contains_key(&self, key: &str) -> bool;

    /// All keys currently held, case-insensitive-unique, unspecified order
    fn keys(&self) -> Vec<String>;

    /// Number of distinct keys
    fn len(&self) -> usize;

    /// Whether the store holds no keys
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist buffered writes to the backing medium. No-op for
    /// write-through or ephemeral stores.
    fn flush(&self) -> StrataResult<()>;

    /// Async counterpart of [`get_value`](Self::get_value)
    async fn get_value_async(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> StrataResult<Option<SettingsValue>> {
        guard_cancelled(cancel)?;
        self.get_value(key)
    }

    /// Async counterpart of [`set_value`](Self::set_value)
    async fn set_value_async(
        &self,
        key: &str,
        value: SettingsValue,
        cancel: &CancellationToken,
    ) -> StrataResult<()> {
        guard_cancelled(cancel)?;
        self.set_value(key, value)
    }

    /// Async counterpart of [`remove`](Self::remove)
    async fn remove_async(&self, key: &str, cancel: &CancellationToken) -> StrataResult<bool> {
        guard_cancelled(cancel)?;
        self.remove(key)
    }

    /// Async counterpart of [`clear`](Self::clear)
    async fn clear_async(&self, cancel: &CancellationToken) -> StrataResult<()> {
        guard_cancelled(cancel)?;
        self.clear()
    }

    /// Async counterpart of [`flush`](Self::flush)
    async fn flush_async(&self, cancel: &CancellationToken) -> StrataResult<()> {
        guard_cancelled(cancel)?;
        self.flush()
    }
}

/// A named, prioritized, scoped settings backend
#[async_trait]
pub trait SettingsProvider: KeyValueStore {
    /// Instance name, stable for the provider's lifetime; identifies the
    /// provider in diagnostics and change events
    fn name(&self) -> &str;

    /// Read-resolution rank; higher is consulted first. Fixed after
    /// construction.
    ///
    /// Convention (not enforced): 100 and above for override sources such
    /// as environment variables, 50–99 for user-writable sources, 0–49 for
    /// defaults and fallbacks.
    fn priority(&self) -> i32;

    /// Whether writes are rejected
    fn is_read_only(&self) -> bool;

    /// The storage tier this provider's backing location belongs to
    fn scope(&self) -> SettingsScope;

    /// Subscribe to all change events of this provider
    fn subscribe(&self, listener: ChangeListener) -> Subscription;

    /// Subscribe to change events for one key (case-insensitive match).
    /// `Cleared` events are always delivered.
    fn subscribe_key(&self, key: &str, listener: ChangeListener) -> Subscription;

    /// Discard the in-memory view and re-read the backing medium, picking
    /// up external changes. May fire change events for observed
    /// differences.
    fn reload(&self) -> StrataResult<()>;

    /// Async counterpart of [`reload`](Self::reload)
    async fn reload_async(&self, cancel: &CancellationToken) -> StrataResult<()> {
        guard_cancelled(cancel)?;
        self.reload()
    }
}

/// Typed accessors over any [`KeyValueStore`].
///
/// Read-path conversion failures are deliberately swallowed: a value that
/// cannot be coerced to the requested type behaves exactly like a missing
/// key. Write errors always propagate.
#[async_trait]
pub trait TypedStore: KeyValueStore {
    /// Get `key` coerced to `T`, or `default` if absent or not coercible
    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.try_get(key).unwrap_or(default)
    }

    /// Get `key` coerced to `T`, or `T::default()` if absent or not
    /// coercible
    fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.try_get(key).unwrap_or_default()
    }

    /// Get `key` coerced to `T` if present and coercible
    fn try_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get_value(key) {
            Ok(Some(value)) => value.to_typed(),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!("read of '{}' failed: {}", key, error);
                None
            }
        }
    }

    /// Store a typed value under `key`
    fn set<T: Serialize>(&self, key: &str, value: &T) -> StrataResult<()> {
        self.set_value(key, SettingsValue::from_typed(value)?)
    }

    /// Return the existing value for `key`, or produce one with `factory`,
    /// store it, and return it.
    ///
    /// Not atomic: concurrent callers may race the factory, last write
    /// wins. Callers must not rely on exactly-once factory invocation.
    fn get_or_insert_with<T, F>(&self, key: &str, factory: F) -> StrataResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.try_get(key) {
            return Ok(existing);
        }
        let created = factory();
        self.set(key, &created)?;
        Ok(created)
    }

    /// Async counterpart of [`try_get`](Self::try_get)
    async fn try_get_async<T>(&self, key: &str, cancel: &CancellationToken) -> Option<T>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_value_async(key, cancel).await {
            Ok(Some(value)) => value.to_typed(),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!("read of '{}' failed: {}", key, error);
                None
            }
        }
    }

    /// Async counterpart of [`get`](Self::get)
    async fn get_async<T>(&self, key: &str, default: T, cancel: &CancellationToken) -> T
    where
        T: DeserializeOwned + Send,
    {
        self.try_get_async(key, cancel).await.unwrap_or(default)
    }

    /// Async counterpart of [`set`](Self::set)
    async fn set_async<T>(&self, key: &str, value: &T, cancel: &CancellationToken) -> StrataResult<()>
    where
        T: Serialize + Sync,
    {
        let value = SettingsValue::from_typed(value)?;
        self.set_value_async(key, value, cancel).await
    }

    /// Async counterpart of
    /// [`get_or_insert_with`](Self::get_or_insert_with)
    async fn get_or_insert_with_async<T, F>(
        &self,
        key: &str,
        factory: F,
        cancel: &CancellationToken,
    ) -> StrataResult<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> T + Send,
    {
        if let Some(existing) = self.try_get_async(key, cancel).await {
            return Ok(existing);
        }
        let created = factory();
        self.set_async(key, &created, cancel).await?;
        Ok(created)
    }
}

impl<S: KeyValueStore + ?Sized> TypedStore for S {}
