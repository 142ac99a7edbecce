use serde::{Deserialize, Serialize};
use stockroom_core::{FieldType, SchemaField, SchemaIndex, TableSchema};

use crate::entity::{Entity, EntityId, Ownership};

/// A physical place holding areas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(flatten)]
    pub ownership: Ownership,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            address: None,
            ownership: Ownership::default(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

impl Entity for Location {
    const ENTITY_NAME: &'static str = "location";

    fn table_name() -> &'static str {
        "locations"
    }

    fn table_schema() -> TableSchema {
        TableSchema::new(Self::table_name(), Self::ENTITY_NAME)
            .field(SchemaField::new("id", FieldType::Uuid).primary_key())
            .field(SchemaField::new("name", FieldType::varchar(255)))
            .field(SchemaField::new("address", FieldType::Text).nullable())
            .field(SchemaField::new("tenant_id", FieldType::Uuid).nullable())
            .field(SchemaField::new("user_id", FieldType::Uuid).nullable())
            .index(SchemaIndex::new("idx_locations_tenant", &["tenant_id"]))
            .index(SchemaIndex::new("idx_locations_user", &["user_id"]))
    }

    fn primary_key(&self) -> Option<EntityId> {
        self.id
    }

    fn set_primary_key(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    fn ownership_mut(&mut self) -> &mut Ownership {
        &mut self.ownership
    }
}
