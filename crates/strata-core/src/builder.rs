//! Fluent store assembly
//!
//! A [`StoreBuilder`] accumulates providers in call order; relative
//! priorities decide resolution, registration order only breaks ties.
//! Building with zero providers registers a writable user-scoped JSON file
//! at the default location, so an unconfigured build is always usable.
//! Building with exactly one provider and no write-target override returns
//! that provider unwrapped.

use crate::composite::CompositeStore;
use crate::error::{StrataError, StrataResult};
use crate::provider::{KeyValueStore, SettingsProvider};
use crate::providers::{EnvProvider, FileFormat, FileOptions, FileProvider, MemoryProvider};
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for a settings store over one or more providers
///
/// # Example
///
/// ```rust,no_run
/// use strata_core::{StoreBuilder, TypedStore};
///
/// let store = StoreBuilder::new()
///     .with_application("myapp")
///     .use_json_file("settings.json")?
///     .use_env_with_prefix("MYAPP_")
///     .use_memory()
///     .build()?;
///
/// let port: i64 = store.get("server.port", 8080);
/// # Ok::<(), strata_core::StrataError>(())
/// ```
#[derive(Default)]
pub struct StoreBuilder {
    application: Option<String>,
    organization: Option<String>,
    providers: Vec<Arc<dyn SettingsProvider>>,
    write_target: Option<String>,
}

impl StoreBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name, used for default file path resolution
    pub fn with_application(mut self, name: impl Into<String>) -> Self {
        self.application = Some(name.into());
        self
    }

    /// Set the organization name, used for default file path resolution
    pub fn with_organization(mut self, name: impl Into<String>) -> Self {
        self.organization = Some(name.into());
        self
    }

    /// Register a ready provider instance
    pub fn add_provider(mut self, provider: Arc<dyn SettingsProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Register a file provider for `path`, guessing the format from the
    /// extension
    pub fn use_file(self, path: impl Into<PathBuf>) -> StrataResult<Self> {
        let path = path.into();
        let format = FileFormat::from_path(&path).ok_or_else(|| {
            StrataError::config(format!(
                "cannot infer settings format from '{}'",
                path.display()
            ))
        })?;
        self.use_file_with(path, format, |_| {})
    }

    /// Register a JSON file provider with default options
    pub fn use_json_file(self, path: impl Into<PathBuf>) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Json, |_| {})
    }

    /// Register a JSON file provider, adjusting options first
    pub fn use_json_file_with(
        self,
        path: impl Into<PathBuf>,
        configure: impl FnOnce(&mut FileOptions),
    ) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Json, configure)
    }

    /// Register a TOML file provider with default options
    pub fn use_toml_file(self, path: impl Into<PathBuf>) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Toml, |_| {})
    }

    /// Register a TOML file provider, adjusting options first
    pub fn use_toml_file_with(
        self,
        path: impl Into<PathBuf>,
        configure: impl FnOnce(&mut FileOptions),
    ) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Toml, configure)
    }

    /// Register a YAML file provider with default options
    pub fn use_yaml_file(self, path: impl Into<PathBuf>) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Yaml, |_| {})
    }

    /// Register a YAML file provider, adjusting options first
    pub fn use_yaml_file_with(
        self,
        path: impl Into<PathBuf>,
        configure: impl FnOnce(&mut FileOptions),
    ) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Yaml, configure)
    }

    /// Register an INI file provider with default options
    pub fn use_ini_file(self, path: impl Into<PathBuf>) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Ini, |_| {})
    }

    /// Register an INI file provider, adjusting options first
    pub fn use_ini_file_with(
        self,
        path: impl Into<PathBuf>,
        configure: impl FnOnce(&mut FileOptions),
    ) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Ini, configure)
    }

    /// Register an XML file provider with default options
    pub fn use_xml_file(self, path: impl Into<PathBuf>) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Xml, |_| {})
    }

    /// Register an XML file provider, adjusting options first
    pub fn use_xml_file_with(
        self,
        path: impl Into<PathBuf>,
        configure: impl FnOnce(&mut FileOptions),
    ) -> StrataResult<Self> {
        self.use_file_with(path, FileFormat::Xml, configure)
    }

    /// Register a file provider with an explicit format, adjusting options
    /// first
    pub fn use_file_with(
        mut self,
        path: impl Into<PathBuf>,
        format: FileFormat,
        configure: impl FnOnce(&mut FileOptions),
    ) -> StrataResult<Self> {
        let mut options = FileOptions::default();
        configure(&mut options);
        let provider = FileProvider::open_with(path, format, options)?;
        self.providers.push(Arc::new(provider));
        Ok(self)
    }

    /// Register a read-only provider over the whole process environment
    pub fn use_env(mut self) -> Self {
        self.providers.push(Arc::new(EnvProvider::new()));
        self
    }

    /// Register a read-only provider over environment variables starting
    /// with `prefix` (stripped from the exposed keys)
    pub fn use_env_with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.providers.push(Arc::new(EnvProvider::with_prefix(prefix)));
        self
    }

    /// Register an in-memory provider
    pub fn use_memory(mut self) -> Self {
        self.providers.push(Arc::new(MemoryProvider::new()));
        self
    }

    /// Route every write to the provider named `name` instead of the first
    /// writable member. The name must match a registered provider at build
    /// time.
    pub fn with_write_target(mut self, name: impl Into<String>) -> Self {
        self.write_target = Some(name.into());
        self
    }

    /// The default settings file used when nothing was registered:
    /// `<config dir>/<organization>/<application>/settings.json`
    fn default_store_path(&self) -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        if let Some(organization) = &self.organization {
            path.push(organization);
        }
        path.push(self.application.as_deref().unwrap_or("strata"));
        path.push("settings.json");
        path
    }

    /// Build the store, typed as the plain key-value surface
    pub fn build(self) -> StrataResult<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = self.build_provider()?;
        Ok(store)
    }

    /// Build the store, typed with the full provider surface (reload,
    /// change events, metadata)
    pub fn build_provider(mut self) -> StrataResult<Arc<dyn SettingsProvider>> {
        if self.providers.is_empty() {
            let path = self.default_store_path();
            tracing::debug!(
                "no providers registered, defaulting to {}",
                path.display()
            );
            self.providers
                .push(Arc::new(FileProvider::open(path, FileFormat::Json)?));
        }

        if self.providers.len() == 1 && self.write_target.is_none() {
            return Ok(self.providers.remove(0));
        }

        let write_target = match &self.write_target {
            Some(name) => Some(
                self.providers
                    .iter()
                    .find(|provider| provider.name() == name)
                    .cloned()
                    .ok_or_else(|| StrataError::unknown_provider(name))?,
            ),
            None => None,
        };

        Ok(Arc::new(CompositeStore::new(self.providers, write_target)?))
    }
}

impl std::fmt::Debug for StoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("application", &self.application)
            .field("organization", &self.organization)
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("write_target", &self.write_target)
            .finish()
    }
}

/// Convenience free function mirroring [`StoreBuilder::new`]
pub fn builder() -> StoreBuilder {
    StoreBuilder::new()
}
