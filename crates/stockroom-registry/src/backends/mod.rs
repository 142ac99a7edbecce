//! Storage backends
//!
//! A backend turns a [`DatabaseConfig`] into a [`RegistrySet`]: one scoped
//! factory per entity plus a handle on the underlying resources. Backends
//! are registered by connection-string scheme in a [`BackendRegistry`].

pub mod memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use stockroom_core::{ConnectionString, DatabaseConfig};

use crate::entity::EntityId;
use crate::error::{RegistryError, RegistryResult};
use crate::models::{Area, Commodity, Location, Tenant, User};
use crate::store::FactoryRef;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

/// Opens a registry set for one connection-string scheme
#[async_trait]
pub trait BackendFactory: Send + Sync {
    fn name(&self) -> &'static str;

    async fn open(&self, config: &DatabaseConfig) -> RegistryResult<RegistrySet>;
}

/// Resources held by an open registry set
#[async_trait]
pub trait BackendHandle: Send + Sync {
    async fn ping(&self) -> RegistryResult<()>;

    async fn close(&self) -> RegistryResult<()>;

    /// Child ids associated with `parent` through the named relationship
    async fn children_of(&self, relation: &str, parent: EntityId) -> RegistryResult<Vec<EntityId>>;
}

/// Per-entity factories sharing one backend's state
pub struct RegistrySet {
    backend: &'static str,
    tenants: FactoryRef<Tenant>,
    users: FactoryRef<User>,
    locations: FactoryRef<Location>,
    areas: FactoryRef<Area>,
    commodities: FactoryRef<Commodity>,
    handle: Arc<dyn BackendHandle>,
}

impl RegistrySet {
    pub fn new(
        backend: &'static str,
        tenants: FactoryRef<Tenant>,
        users: FactoryRef<User>,
        locations: FactoryRef<Location>,
        areas: FactoryRef<Area>,
        commodities: FactoryRef<Commodity>,
        handle: Arc<dyn BackendHandle>,
    ) -> Self {
        Self {
            backend,
            tenants,
            users,
            locations,
            areas,
            commodities,
            handle,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn tenants(&self) -> &FactoryRef<Tenant> {
        &self.tenants
    }

    pub fn users(&self) -> &FactoryRef<User> {
        &self.users
    }

    pub fn locations(&self) -> &FactoryRef<Location> {
        &self.locations
    }

    pub fn areas(&self) -> &FactoryRef<Area> {
        &self.areas
    }

    pub fn commodities(&self) -> &FactoryRef<Commodity> {
        &self.commodities
    }

    pub async fn ping(&self) -> RegistryResult<()> {
        self.handle.ping().await
    }

    pub async fn children_of(&self, relation: &str, parent: EntityId) -> RegistryResult<Vec<EntityId>> {
        self.handle.children_of(relation, parent).await
    }

    /// Release the backend's resources
    pub async fn close(self) -> RegistryResult<()> {
        tracing::info!(backend = self.backend, "closing registry set");
        self.handle.close().await
    }
}

impl std::fmt::Debug for RegistrySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrySet").field("backend", &self.backend).finish()
    }
}

/// Scheme-keyed backend factories.
///
/// Populated once at startup through `&mut self`, then shared read-only.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Registry with the built-in memory and PostgreSQL backends
    pub fn with_defaults() -> Self {
        let postgres: Arc<dyn BackendFactory> = Arc::new(PostgresBackend::new());
        let mut backends: HashMap<String, Arc<dyn BackendFactory>> = HashMap::new();
        backends.insert("memory".to_string(), Arc::new(MemoryBackend::new()));
        backends.insert("postgres".to_string(), postgres.clone());
        backends.insert("postgresql".to_string(), postgres);
        Self { backends }
    }

    pub fn register(&mut self, scheme: &str, factory: Arc<dyn BackendFactory>) -> RegistryResult<()> {
        let scheme = scheme.to_ascii_lowercase();
        if self.backends.contains_key(&scheme) {
            return Err(RegistryError::DuplicateRegistration(scheme));
        }
        tracing::debug!(scheme = %scheme, backend = factory.name(), "registered backend");
        self.backends.insert(scheme, factory);
        Ok(())
    }

    /// Factory for a connection string's scheme. Nothing is opened.
    pub fn resolve(&self, connection_string: &str) -> RegistryResult<Arc<dyn BackendFactory>> {
        let dsn = ConnectionString::parse(connection_string)?;
        self.factory_for(&dsn)
    }

    fn factory_for(&self, dsn: &ConnectionString) -> RegistryResult<Arc<dyn BackendFactory>> {
        self.backends
            .get(dsn.scheme())
            .cloned()
            .ok_or_else(|| RegistryError::UnknownBackend(dsn.scheme().to_string()))
    }

    pub async fn open(&self, config: &DatabaseConfig) -> RegistryResult<RegistrySet> {
        let factory = self.factory_for(&config.dsn)?;
        tracing::info!(
            backend = factory.name(),
            dsn = %config.dsn.redacted(),
            "opening registry set"
        );
        factory.open(config).await
    }

    pub fn registered_backends(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self.backends.keys().cloned().collect();
        schemes.sort();
        schemes
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
