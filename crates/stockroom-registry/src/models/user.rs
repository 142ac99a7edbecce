use serde::{Deserialize, Serialize};
use stockroom_core::{FieldType, SchemaField, SchemaIndex, TableSchema};

use crate::entity::{Entity, EntityId, Ownership};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    #[default]
    User,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: UserRole,
    pub is_active: bool,
    #[serde(flatten)]
    pub ownership: Ownership,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            email: email.into(),
            name: name.into(),
            role: UserRole::User,
            is_active: true,
            ownership: Ownership::default(),
        }
    }
}

impl Entity for User {
    const ENTITY_NAME: &'static str = "user";

    fn table_name() -> &'static str {
        "users"
    }

    fn table_schema() -> TableSchema {
        TableSchema::new(Self::table_name(), Self::ENTITY_NAME)
            .field(SchemaField::new("id", FieldType::Uuid).primary_key())
            .field(SchemaField::new("email", FieldType::varchar(255)))
            .field(SchemaField::new("name", FieldType::varchar(255)))
            .field(SchemaField::new("role", FieldType::enumeration("user_role")).default_value("'user'"))
            .field(SchemaField::new("is_active", FieldType::Boolean).default_value("TRUE"))
            .field(SchemaField::new("tenant_id", FieldType::Uuid).nullable().references("tenants", "id"))
            .field(SchemaField::new("user_id", FieldType::Uuid).nullable())
            .index(SchemaIndex::new("idx_users_tenant_email", &["tenant_id", "email"]).unique())
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
