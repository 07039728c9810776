//! Process-wide default store
//!
//! An explicitly-initialized global for applications that want one ambient
//! store instead of threading a handle everywhere. Assignment happens once,
//! before first use, from application start-up code; there is no implicit
//! lazy construction and no reset.

use crate::error::{StrataError, StrataResult};
use crate::provider::SettingsProvider;
use once_cell::sync::OnceCell;
use std::sync::Arc;

static DEFAULT_STORE: OnceCell<Arc<dyn SettingsProvider>> = OnceCell::new();

/// Install the process-wide default store. Fails if one was already
/// installed.
pub fn init_default_store(store: Arc<dyn SettingsProvider>) -> StrataResult<()> {
    DEFAULT_STORE
        .set(store)
        .map_err(|_| StrataError::config("default store is already initialized"))
}

/// The process-wide default store. Fails until
/// [`init_default_store`] has been called.
pub fn default_store() -> StrataResult<Arc<dyn SettingsProvider>> {
    DEFAULT_STORE
        .get()
        .cloned()
        .ok_or_else(|| StrataError::config("default store is not initialized"))
}

/// The process-wide default store, or `None` before initialization
pub fn try_default_store() -> Option<Arc<dyn SettingsProvider>> {
    DEFAULT_STORE.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryProvider;

    // The global is process-wide, so one test exercises the whole
    // lifecycle to avoid ordering dependencies between tests.
    #[test]
    fn test_single_assignment_lifecycle() {
        assert!(try_default_store().is_none());
        assert!(default_store().is_err());

        init_default_store(Arc::new(MemoryProvider::new())).unwrap();
        assert!(default_store().is_ok());

        let again = init_default_store(Arc::new(MemoryProvider::new()));
        assert!(matches!(again, Err(StrataError::Config(_))));
    }
}
