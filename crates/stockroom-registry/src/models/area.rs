use serde::{Deserialize, Serialize};
use stockroom_core::{FieldType, ReferentialAction, SchemaField, SchemaIndex, TableSchema};

use crate::entity::{Entity, EntityId, Ownership};

/// A subdivision of a location (a shelf, a room, a drawer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub name: String,
    pub location_id: EntityId,
    #[serde(flatten)]
    pub ownership: Ownership,
}

impl Area {
    pub fn new(name: impl Into<String>, location_id: EntityId) -> Self {
        Self {
            id: None,
            name: name.into(),
            location_id,
            ownership: Ownership::default(),
        }
    }
}

impl Entity for Area {
    const ENTITY_NAME: &'static str = "area";

    fn table_name() -> &'static str {
        "areas"
    }

    fn table_schema() -> TableSchema {
        TableSchema::new(Self::table_name(), Self::ENTITY_NAME)
            .field(SchemaField::new("id", FieldType::Uuid).primary_key())
            .field(SchemaField::new("name", FieldType::varchar(255)))
            .field(
                SchemaField::new("location_id", FieldType::Uuid)
                    .references("locations", "id")
                    .on_delete(ReferentialAction::Restrict),
            )
            .field(SchemaField::new("tenant_id", FieldType::Uuid).nullable())
            .field(SchemaField::new("user_id", FieldType::Uuid).nullable())
            .index(SchemaIndex::new("idx_areas_location", &["location_id"]))
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

    fn parent_ref(&self, foreign_key: &str) -> Option<EntityId> {
        match foreign_key {
            "location_id" => Some(self.location_id),
            _ => None,
        }
    }
}
