//! Strata Core Library
//!
//! This crate provides a unified key-value settings abstraction over
//! multiple physical backends (JSON, TOML, YAML, INI and XML files,
//! environment variables, in-memory), combined into one logical store with
//! priority-based read resolution and a single write target.
//!
//! # Overview
//!
//! Every backend implements the [`SettingsProvider`] contract. The
//! [`CompositeStore`] binds several providers together: reads resolve
//! first-match in descending priority order, writes go to an explicit
//! target or the first writable member, and member change events are
//! re-published on the composite. The [`StoreBuilder`] assembles either a
//! single provider or a composite from a fluent configuration.
//!
//! ```rust,no_run
//! use strata_core::{StoreBuilder, TypedStore};
//!
//! let store = StoreBuilder::new()
//!     .with_application("myapp")
//!     .use_toml_file("myapp.toml")?
//!     .use_env_with_prefix("MYAPP_")
//!     .build()?;
//!
//! let host: String = store.get("database.host", "localhost".to_string());
//! # Ok::<(), strata_core::StrataError>(())
//! ```

pub mod builder;
pub mod composite;
pub mod error;
pub mod events;
pub mod global;
pub mod provider;
pub mod providers;
pub mod value;

// Re-export commonly used types
pub use builder::{builder, StoreBuilder};
pub use composite::CompositeStore;
pub use error::{StrataError, StrataResult};
pub use events::{ChangeEvent, ChangeKind, ChangeListener, ChangeNotifier, Subscription};
pub use global::{default_store, init_default_store, try_default_store};
pub use provider::{KeyValueStore, SettingsProvider, SettingsScope, TypedStore};
pub use providers::{EnvProvider, FileFormat, FileOptions, FileProvider, MemoryProvider};
pub use value::SettingsValue;
