use crate::error::StorageError;
use crate::local_fs::LocalFsStore;
use crate::memory::MemoryStore;
use crate::object_store::ObjectStore;
use model::config::StorageOptions;
use model::location::Location;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a store for a location. Receives the options blob registered for
/// the location's scheme, if the config carries one.
pub type StoreFactory = Arc<
    dyn Fn(&Location, Option<&serde_json::Value>) -> Result<Arc<dyn ObjectStore>, StorageError>
        + Send
        + Sync,
>;

/// Scheme-to-factory table. `file://` and `mem://` come built in; cloud
/// backends register their own factory and pick their settings out of the
/// per-scheme storage options.
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("file", |location, _options| {
            Ok(Arc::new(LocalFsStore::new(location.path())) as Arc<dyn ObjectStore>)
        });
        registry.register("mem", |location, _options| {
            Ok(Arc::new(MemoryStore::new(location.path())) as Arc<dyn ObjectStore>)
        });
        registry
    }

    pub fn register<F>(&mut self, scheme: impl Into<String>, factory: F)
    where
        F: Fn(&Location, Option<&serde_json::Value>) -> Result<Arc<dyn ObjectStore>, StorageError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(scheme.into(), Arc::new(factory));
    }

    pub fn knows_scheme(&self, scheme: &str) -> bool {
        self.factories.contains_key(scheme)
    }

    /// Registered schemes, sorted for stable messages.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    pub fn open(
        &self,
        location: &Location,
        options: &StorageOptions,
    ) -> Result<Arc<dyn ObjectStore>, StorageError> {
        let factory =
            self.factories
                .get(location.scheme())
                .ok_or_else(|| StorageError::UnknownScheme {
                    scheme: location.scheme().to_string(),
                    location: location.to_string(),
                })?;
        factory(location, options.for_scheme(location.scheme()))
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
