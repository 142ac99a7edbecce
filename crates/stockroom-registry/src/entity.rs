//! Entity trait
//!
//! Every record kept by the registry implements [`Entity`]: it knows its
//! table, its declared schema, its primary key and its owner references.

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use stockroom_core::TableSchema;
use uuid::Uuid;

pub type EntityId = Uuid;

/// Owner references carried by every entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    #[serde(default)]
    pub tenant_id: Option<EntityId>,
    #[serde(default)]
    pub user_id: Option<EntityId>,
}

impl Ownership {
    pub fn new(tenant_id: Option<EntityId>, user_id: Option<EntityId>) -> Self {
        Self { tenant_id, user_id }
    }
}

/// A record persisted by an entity store
pub trait Entity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Singular entity name used in errors and logs
    const ENTITY_NAME: &'static str;

    fn table_name() -> &'static str;

    /// Declared persisted shape; field names match the serialized keys
    fn table_schema() -> TableSchema;

    fn primary_key(&self) -> Option<EntityId>;

    fn set_primary_key(&mut self, id: EntityId);

    fn ownership(&self) -> &Ownership;

    fn ownership_mut(&mut self) -> &mut Ownership;

    /// Parent referenced through `foreign_key`, if this entity has one
    fn parent_ref(&self, _foreign_key: &str) -> Option<EntityId> {
        None
    }
}
