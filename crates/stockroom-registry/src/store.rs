//! Entity store and scoped-view factory traits
//!
//! Every backend provides one [`ScopedFactory`] per entity type. Views it
//! hands out share the backend's state; only the owner filter differs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::{Entity, EntityId};
use crate::error::RegistryResult;
use crate::scope::{Principal, Scope};

/// Restricts a list to children of one parent and pages through the result.
/// Results are always ordered by primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub parent: Option<(String, EntityId)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Only records whose `foreign_key` column points at `parent_id`
    pub fn children_of(foreign_key: impl Into<String>, parent_id: EntityId) -> Self {
        Self {
            parent: Some((foreign_key.into(), parent_id)),
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub(crate) fn matches<E: Entity>(&self, entity: &E) -> bool {
        match &self.parent {
            Some((foreign_key, parent_id)) => entity.parent_ref(foreign_key) == Some(*parent_id),
            None => true,
        }
    }

    pub(crate) fn page<T>(&self, rows: impl Iterator<Item = T>) -> Vec<T> {
        let rows = rows.skip(self.offset);
        match self.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }
}

/// CRUD over one entity type, through one scoped view
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    /// Persist a new record. A missing id is generated; owner references are
    /// stamped from the view's scope.
    async fn create(&self, entity: E) -> RegistryResult<E>;

    async fn get(&self, id: EntityId) -> RegistryResult<E>;

    async fn list(&self, filter: &ListFilter) -> RegistryResult<Vec<E>>;

    /// Replace the whole record atomically
    async fn update(&self, entity: E) -> RegistryResult<E>;

    /// Fails with a cascade violation while dependent records exist
    async fn delete(&self, id: EntityId) -> RegistryResult<()>;

    async fn count(&self) -> RegistryResult<usize>;

    fn scope(&self) -> &Scope;
}

pub type StoreRef<E> = Arc<dyn EntityStore<E>>;

/// Produces scoped views over one entity type's shared state
pub trait ScopedFactory<E: Entity>: Send + Sync {
    fn create_user_registry(&self, principal: Option<&Principal>) -> RegistryResult<StoreRef<E>>;

    fn create_tenant_registry(&self, tenant_id: EntityId) -> RegistryResult<StoreRef<E>>;

    fn create_service_registry(&self) -> StoreRef<E>;
}

pub type FactoryRef<E> = Arc<dyn ScopedFactory<E>>;
