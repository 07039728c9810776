//! File-backed settings provider

use super::format::{self, FileFormat};
use super::{diff_events, Entry};
use crate::error::{StrataError, StrataResult};
use crate::events::{ChangeEvent, ChangeListener, ChangeNotifier, Subscription};
use crate::provider::{guard_cancelled, normalize_key, KeyValueStore, SettingsProvider, SettingsScope};
use crate::value::SettingsValue;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// Construction options for a [`FileProvider`]
#[derive(Debug, Clone)]
pub struct FileOptions {
    /// Instance name; defaults to the file name
    pub name: Option<String>,
    /// Read-resolution priority
    pub priority: i32,
    /// Reject writes
    pub read_only: bool,
    /// Storage tier of the backing location
    pub scope: SettingsScope,
    /// Persist on every mutation instead of buffering until `flush`
    pub auto_flush: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            name: None,
            priority: FileProvider::DEFAULT_PRIORITY,
            read_only: false,
            scope: SettingsScope::User,
            auto_flush: false,
        }
    }
}

/// Provider backed by a settings file in one of the [`FileFormat`]
/// encodings.
///
/// The file is read once at construction; reads are served from the
/// in-memory view. Mutations update the view and are buffered until
/// [`flush`](KeyValueStore::flush) (or every mutation with
/// `auto_flush`). A missing file loads as empty and is created on first
/// flush. Dropping the provider flushes pending writes best-effort.
#[derive(Debug)]
pub struct FileProvider {
    name: String,
    priority: i32,
    read_only: bool,
    scope: SettingsScope,
    path: PathBuf,
    format: FileFormat,
    auto_flush: bool,
    entries: RwLock<HashMap<String, Entry>>,
    dirty: AtomicBool,
    notifier: ChangeNotifier,
}

impl FileProvider {
    /// Default priority for user-writable file sources
    pub const DEFAULT_PRIORITY: i32 = 50;

    /// Open a JSON settings file
    pub fn json(path: impl Into<PathBuf>) -> StrataResult<Self> {
        Self::open(path, FileFormat::Json)
    }

    /// Open a TOML settings file
    pub fn toml(path: impl Into<PathBuf>) -> StrataResult<Self> {
        Self::open(path, FileFormat::Toml)
    }

    /// Open a YAML settings file
    pub fn yaml(path: impl Into<PathBuf>) -> StrataResult<Self> {
        Self::open(path, FileFormat::Yaml)
    }

    /// Open an INI settings file
    pub fn ini(path: impl Into<PathBuf>) -> StrataResult<Self> {
        Self::open(path, FileFormat::Ini)
    }

    /// Open an XML settings file
    pub fn xml(path: impl Into<PathBuf>) -> StrataResult<Self> {
        Self::open(path, FileFormat::Xml)
    }

    /// Open `path` with default options, reading it eagerly
    pub fn open(path: impl Into<PathBuf>, format: FileFormat) -> StrataResult<Self> {
        Self::open_with(path, format, FileOptions::default())
    }

    /// Open `path` with explicit options, reading it eagerly
    pub fn open_with(
        path: impl Into<PathBuf>,
        format: FileFormat,
        options: FileOptions,
    ) -> StrataResult<Self> {
        let path = path.into();
        let name = options.name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format.name().to_string())
        });
        let provider = Self {
            name,
            priority: options.priority,
            read_only: options.read_only,
            scope: options.scope,
            path,
            format,
            auto_flush: options.auto_flush,
            entries: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            notifier: ChangeNotifier::new(),
        };
        let initial = provider.entries_from_text(&read_file(&provider.path)?)?;
        tracing::debug!(
            "loaded {} keys from {} ({})",
            initial.len(),
            provider.path.display(),
            provider.format
        );
        *provider.entries.write() = initial;
        Ok(provider)
    }

    /// The backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The on-disk encoding
    pub fn format(&self) -> FileFormat {
        self.format
    }

    fn guard_writable(&self) -> StrataResult<()> {
        if self.read_only {
            Err(StrataError::read_only(&self.name))
        } else {
            Ok(())
        }
    }

    fn entries_from_text(&self, text: &str) -> StrataResult<HashMap<String, Entry>> {
        let mut entries = HashMap::new();
        for (key, value) in format::parse(self.format, text)? {
            entries.insert(normalize_key(&key), Entry::new(key, value));
        }
        Ok(entries)
    }

    fn render(&self) -> StrataResult<String> {
        let snapshot: BTreeMap<String, SettingsValue> = self
            .entries
            .read()
            .values()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect();
        format::serialize(self.format, &snapshot)
    }

    /// Replace the in-memory view with a freshly loaded snapshot, firing
    /// change events for the differences
    fn apply_snapshot(&self, fresh: HashMap<String, Entry>) {
        let events = {
            let mut entries = self.entries.write();
            let events = diff_events(&self.name, &entries, &fresh);
            *entries = fresh;
            events
        };
        self.dirty.store(false, Ordering::SeqCst);
        for event in &events {
            self.notifier.emit(event);
        }
    }

    fn maybe_auto_flush(&self) -> StrataResult<()> {
        if self.auto_flush {
            self.flush()
        } else {
            Ok(())
        }
    }
}

fn read_file(path: &Path) -> StrataResult<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(error) => Err(StrataError::io(format!(
            "failed to read {}: {}",
            path.display(),
            error
        ))),
    }
}

fn write_text(path: &Path, text: &str) -> StrataResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, text)?;
    Ok(())
}

async fn write_text_async(path: &Path, text: String) -> StrataResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, text).await?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileProvider {
    fn get_value(&self, key: &str) -> StrataResult<Option<SettingsValue>> {
        Ok(self
            .entries
            .read()
            .get(&normalize_key(key))
            .map(|entry| entry.value.clone()))
    }

    fn set_value(&self, key: &str, value: SettingsValue) -> StrataResult<()> {
        self.guard_writable()?;
        let event = {
            let mut entries = self.entries.write();
            let previous = entries.insert(normalize_key(key), Entry::new(key, value.clone()));
            match previous {
                Some(old) => ChangeEvent::modified(key, old.value, value, &self.name),
                None => ChangeEvent::added(key, value, &self.name),
            }
        };
        self.dirty.store(true, Ordering::SeqCst);
        self.notifier.emit(&event);
        self.maybe_auto_flush()
    }

    fn remove(&self, key: &str) -> StrataResult<bool> {
        self.guard_writable()?;
        let removed = self.entries.write().remove(&normalize_key(key));
        match removed {
            Some(entry) => {
                self.dirty.store(true, Ordering::SeqCst);
                self.notifier
                    .emit(&ChangeEvent::removed(entry.key, entry.value, &self.name));
                self.maybe_auto_flush()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&self) -> StrataResult<()> {
        self.guard_writable()?;
        self.entries.write().clear();
        self.dirty.store(true, Ordering::SeqCst);
        self.notifier.emit(&ChangeEvent::cleared(&self.name));
        self.maybe_auto_flush()
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
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let outcome = self
            .render()
            .and_then(|text| write_text(&self.path, &text));
        if outcome.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        } else {
            tracing::debug!("flushed {} keys to {}", self.len(), self.path.display());
        }
        outcome
    }

    async fn flush_async(&self, cancel: &CancellationToken) -> StrataResult<()> {
        guard_cancelled(cancel)?;
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let text = match self.render() {
            Ok(text) => text,
            Err(error) => {
                self.dirty.store(true, Ordering::SeqCst);
                return Err(error);
            }
        };
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(StrataError::Cancelled),
            result = write_text_async(&self.path, text) => result,
        };
        if outcome.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        outcome
    }
}

#[async_trait]
impl SettingsProvider for FileProvider {
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
        let fresh = self.entries_from_text(&read_file(&self.path)?)?;
        self.apply_snapshot(fresh);
        Ok(())
    }

    async fn reload_async(&self, cancel: &CancellationToken) -> StrataResult<()> {
        guard_cancelled(cancel)?;
        let text = tokio::select! {
            _ = cancel.cancelled() => return Err(StrataError::Cancelled),
            result = tokio::fs::read_to_string(&self.path) => match result {
                Ok(text) => text,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(error) => {
                    return Err(StrataError::io(format!(
                        "failed to read {}: {}",
                        self.path.display(),
                        error
                    )))
                }
            },
        };
        let fresh = self.entries_from_text(&text)?;
        self.apply_snapshot(fresh);
        Ok(())
    }
}

impl Drop for FileProvider {
    fn drop(&mut self) {
        if let Err(error) = self.flush() {
            tracing::warn!(
                "flush of '{}' to {} on drop failed: {}",
                self.name,
                self.path.display(),
                error
            );
        }
    }
}
