use serde::{Deserialize, Serialize};
use stockroom_core::{FieldType, SchemaField, SchemaIndex, TableSchema};

use crate::entity::{Entity, EntityId, Ownership};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    #[default]
    Active,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub status: TenantStatus,
    #[serde(flatten)]
    pub ownership: Ownership,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            slug: slug.into(),
            status: TenantStatus::Active,
            ownership: Ownership::default(),
        }
    }
}

impl Entity for Tenant {
    const ENTITY_NAME: &'static str = "tenant";

    fn table_name() -> &'static str {
        "tenants"
    }

    fn table_schema() -> TableSchema {
        TableSchema::new(Self::table_name(), Self::ENTITY_NAME)
            .field(SchemaField::new("id", FieldType::Uuid).primary_key())
            .field(SchemaField::new("name", FieldType::varchar(255)))
            .field(SchemaField::new("slug", FieldType::varchar(100)).unique())
            .field(SchemaField::new("status", FieldType::enumeration("tenant_status")).default_value("'active'"))
            .field(SchemaField::new("tenant_id", FieldType::Uuid).nullable())
            .field(SchemaField::new("user_id", FieldType::Uuid).nullable())
            .index(SchemaIndex::new("idx_tenants_status", &["status"]))
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
