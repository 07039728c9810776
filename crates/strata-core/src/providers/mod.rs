//! Shipped provider implementations
//!
//! Each provider independently satisfies the contract in
//! [`crate::provider`]:
//!
//! - [`MemoryProvider`]: in-process concurrent map, no persistence
//! - [`EnvProvider`]: read-only snapshot of process environment variables
//! - [`FileProvider`]: buffered file-backed store in one of the
//!   [`FileFormat`] encodings

mod env;
mod file;
mod format;
mod memory;

pub use env::EnvProvider;
pub use file::{FileOptions, FileProvider};
pub use format::FileFormat;
pub use memory::MemoryProvider;

use crate::events::ChangeEvent;
use crate::value::SettingsValue;
use std::collections::HashMap;

/// One stored key-value pair. Maps are keyed by the normalized
/// (lowercased) key; the entry keeps the originally-written casing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    pub key: String,
    pub value: SettingsValue,
}

impl Entry {
    pub(crate) fn new(key: impl Into<String>, value: SettingsValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Change events describing the difference between two snapshots, used by
/// providers whose `reload` replaces the whole in-memory view
pub(crate) fn diff_events(
    provider: &str,
    old: &HashMap<String, Entry>,
    new: &HashMap<String, Entry>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for (normalized, entry) in new {
        match old.get(normalized) {
            None => events.push(ChangeEvent::added(
                entry.key.clone(),
                entry.value.clone(),
                provider,
            )),
            Some(previous) if previous.value != entry.value => events.push(ChangeEvent::modified(
                entry.key.clone(),
                previous.value.clone(),
                entry.value.clone(),
                provider,
            )),
            Some(_) => {}
        }
    }
    for (normalized, entry) in old {
        if !new.contains_key(normalized) {
            events.push(ChangeEvent::removed(
                entry.key.clone(),
                entry.value.clone(),
                provider,
            ));
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeKind;

    #[test]
    fn test_diff_events_cover_all_transitions() {
        let mut old = HashMap::new();
        old.insert("kept".to_string(), Entry::new("kept", SettingsValue::Int(1)));
        old.insert("changed".to_string(), Entry::new("changed", SettingsValue::Int(2)));
        old.insert("gone".to_string(), Entry::new("gone", SettingsValue::Int(3)));

        let mut new = HashMap::new();
        new.insert("kept".to_string(), Entry::new("kept", SettingsValue::Int(1)));
        new.insert("changed".to_string(), Entry::new("changed", SettingsValue::Int(20)));
        new.insert("fresh".to_string(), Entry::new("fresh", SettingsValue::Int(4)));

        let events = diff_events("p", &old, &new);
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .any(|e| e.kind == ChangeKind::Added && e.key == "fresh"));
        assert!(events
            .iter()
            .any(|e| e.kind == ChangeKind::Modified && e.key == "changed"));
        assert!(events
            .iter()
            .any(|e| e.kind == ChangeKind::Removed && e.key == "gone"));
    }
}
