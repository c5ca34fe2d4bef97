//! ProxyRegistry - the per-process table of interface executors.
//!
//! The registry owns the profile store binding, the shared connection pool
//! and one cached `ProxyExecutor` per interface id.

use super::client::SharedPool;
use super::executor::{Collaborators, ProxyExecutor};
use crate::config::ConnectionPoolConfig;
use crate::error::ProxyError;
use crate::log::{CallLogger, NoopLogger};
use crate::mock::{MockGenerator, TemplateEngine};
use crate::store::{InterfaceCatalog, ProfileStore};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves interface ids to executors
pub struct ProxyRegistry {
    store: OnceCell<Arc<dyn ProfileStore>>,
    /// Executors by interface id
    executors: RwLock<HashMap<String, Arc<ProxyExecutor>>>,
    /// Created on the first network executor
    pool: OnceCell<Arc<SharedPool>>,
    pool_config: ConnectionPoolConfig,
    generator: Arc<dyn MockGenerator>,
    logger: Arc<dyn CallLogger>,
}

impl ProxyRegistry {
    /// Create an unconfigured registry with default collaborators
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ProxyRegistryBuilder {
        ProxyRegistryBuilder::default()
    }

    /// Registry bound to a loaded catalog, using its pool settings
    pub fn from_catalog(catalog: InterfaceCatalog) -> Self {
        Self::builder()
            .pool(catalog.config().connection_pool.clone())
            .store(Arc::new(catalog))
            .build()
    }

    /// Bind the profile store. Only one store may ever be bound.
    pub fn configure(&self, store: Arc<dyn ProfileStore>) -> Result<(), ProxyError> {
        self.store
            .set(store)
            .map_err(|_| ProxyError::AlreadyConfigured)
    }

    pub fn is_configured(&self) -> bool {
        self.store.get().is_some()
    }

    /// Cached executor for `id`, built on first use
    pub fn resolve(&self, id: &str) -> Result<Arc<ProxyExecutor>, ProxyError> {
        if let Some(executor) = self.executors.read().get(id) {
            return Ok(Arc::clone(executor));
        }

        let store = self.store.get().ok_or(ProxyError::NotConfigured)?;
        let profile = store
            .profile(id)
            .ok_or_else(|| ProxyError::UnknownInterface(id.to_string()))?;

        let mut executors = self.executors.write();
        // Another caller may have built it while we waited for the lock
        if let Some(executor) = executors.get(id) {
            return Ok(Arc::clone(executor));
        }

        let deps = Collaborators {
            store: Arc::clone(store),
            generator: Arc::clone(&self.generator),
            logger: Arc::clone(&self.logger),
        };
        let executor = Arc::new(ProxyExecutor::new(profile, deps, || self.shared_pool())?);

        debug!(
            "Executor for interface [{}] created (status: {})",
            id,
            executor.profile().status
        );
        executors.insert(id.to_string(), Arc::clone(&executor));
        Ok(executor)
    }

    /// Known ids starting with `prefix`, in store order
    pub fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<String>, ProxyError> {
        let store = self.store.get().ok_or(ProxyError::NotConfigured)?;
        Ok(store.ids_with_prefix(prefix))
    }

    /// Number of executors built so far
    pub fn cached(&self) -> usize {
        self.executors.read().len()
    }

    fn shared_pool(&self) -> Arc<SharedPool> {
        Arc::clone(
            self.pool
                .get_or_init(|| Arc::new(SharedPool::new(&self.pool_config))),
        )
    }
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProxyRegistry`
pub struct ProxyRegistryBuilder {
    store: Option<Arc<dyn ProfileStore>>,
    pool_config: ConnectionPoolConfig,
    generator: Arc<dyn MockGenerator>,
    logger: Arc<dyn CallLogger>,
}

impl Default for ProxyRegistryBuilder {
    fn default() -> Self {
        Self {
            store: None,
            pool_config: ConnectionPoolConfig::default(),
            generator: Arc::new(TemplateEngine::new()),
            logger: Arc::new(NoopLogger),
        }
    }
}

impl ProxyRegistryBuilder {
    pub fn pool(mut self, config: ConnectionPoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    pub fn generator(mut self, generator: Arc<dyn MockGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn CallLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Bind the profile store at build time
    pub fn store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> ProxyRegistry {
        let store = OnceCell::new();
        if let Some(s) = self.store {
            let _ = store.set(s);
        }

        ProxyRegistry {
            store,
            executors: RwLock::new(HashMap::new()),
            pool: OnceCell::new(),
            pool_config: self.pool_config,
            generator: self.generator,
            logger: self.logger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CatalogConfig;
    use serde_json::json;
    use std::path::Path;

    fn catalog() -> InterfaceCatalog {
        let config: CatalogConfig = serde_json::from_value(json!({
            "status": "dev",
            "interfaces": [
                {"id": "Api.list", "urls": {"dev": "http://127.0.0.1:9/list"}},
                {"id": "Api.detail", "urls": {"dev": "http://127.0.0.1:9/detail"}, "status": "mock"},
                {"id": "Api.prodOnly", "urls": {"prod": "http://127.0.0.1:9/p"}},
                {"id": "Search.query", "urls": {"dev": "http://127.0.0.1:9/q"}}
            ]
        }))
        .unwrap();
        InterfaceCatalog::from_config(config, Path::new(".")).unwrap()
    }

    #[test]
    fn test_resolve_before_configure() {
        let registry = ProxyRegistry::new();
        assert!(!registry.is_configured());
        assert!(matches!(
            registry.resolve("Api.list"),
            Err(ProxyError::NotConfigured)
        ));
        assert!(matches!(
            registry.ids_with_prefix("Api."),
            Err(ProxyError::NotConfigured)
        ));
    }

    #[test]
    fn test_configure_once() {
        let registry = ProxyRegistry::new();
        registry.configure(Arc::new(catalog())).unwrap();
        assert!(registry.is_configured());
        assert!(matches!(
            registry.configure(Arc::new(catalog())),
            Err(ProxyError::AlreadyConfigured)
        ));
    }

    #[test]
    fn test_resolve_caches_executor() {
        let registry = ProxyRegistry::from_catalog(catalog());

        let first = registry.resolve("Api.list").unwrap();
        let second = registry.resolve("Api.list").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.target_url(), Some("http://127.0.0.1:9/list"));

        let mock = registry.resolve("Api.detail").unwrap();
        assert!(mock.is_mock());
        assert_eq!(registry.cached(), 2);
    }

    #[test]
    fn test_resolve_errors() {
        let registry = ProxyRegistry::from_catalog(catalog());

        assert!(matches!(
            registry.resolve("Api.nope"),
            Err(ProxyError::UnknownInterface(id)) if id == "Api.nope"
        ));
        // Catalog status "dev" has no url for this interface
        assert!(matches!(
            registry.resolve("Api.prodOnly"),
            Err(ProxyError::MissingEnvironmentUrl { .. })
        ));
        assert_eq!(registry.cached(), 0);
    }

    #[test]
    fn test_ids_with_prefix() {
        let registry = ProxyRegistry::from_catalog(catalog());
        assert_eq!(
            registry.ids_with_prefix("Api.").unwrap(),
            vec!["Api.list", "Api.detail", "Api.prodOnly"]
        );
        assert!(registry.ids_with_prefix("").unwrap().is_empty());
    }
}
