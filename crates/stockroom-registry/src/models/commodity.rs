use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use stockroom_core::{FieldType, ReferentialAction, SchemaField, SchemaIndex, TableSchema};

use crate::entity::{Entity, EntityId, Ownership};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommodityStatus {
    #[default]
    InUse,
    Sold,
    Lost,
    Disposed,
    WrittenOff,
}

impl CommodityStatus {
    pub const ALL: [&'static str; 5] = ["in_use", "sold", "lost", "disposed", "written_off"];
}

/// An inventoried item stored in an area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    pub area_id: EntityId,
    #[serde(default)]
    pub status: CommodityStatus,
    pub count: i32,
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub ownership: Ownership,
}

impl Commodity {
    pub fn new(name: impl Into<String>, area_id: EntityId) -> Self {
        Self {
            id: None,
            name: name.into(),
            short_name: None,
            area_id,
            status: CommodityStatus::InUse,
            count: 1,
            original_price: None,
            purchase_date: None,
            ownership: Ownership::default(),
        }
    }
}

impl Entity for Commodity {
    const ENTITY_NAME: &'static str = "commodity";

    fn table_name() -> &'static str {
        "commodities"
    }

    fn table_schema() -> TableSchema {
        TableSchema::new(Self::table_name(), Self::ENTITY_NAME)
            .field(SchemaField::new("id", FieldType::Uuid).primary_key())
            .field(SchemaField::new("name", FieldType::varchar(255)))
            .field(SchemaField::new("short_name", FieldType::varchar(64)).nullable())
            .field(
                SchemaField::new("area_id", FieldType::Uuid)
                    .references("areas", "id")
                    .on_delete(ReferentialAction::Restrict),
            )
            .field(SchemaField::new("status", FieldType::enumeration("commodity_status")).default_value("'in_use'"))
            .field(SchemaField::new("count", FieldType::Integer).default_value("1"))
            .field(SchemaField::new("original_price", FieldType::decimal(12, 2)).nullable())
            .field(SchemaField::new("purchase_date", FieldType::Date).nullable())
            .field(SchemaField::new("tenant_id", FieldType::Uuid).nullable())
            .field(SchemaField::new("user_id", FieldType::Uuid).nullable())
            .index(SchemaIndex::new("idx_commodities_area", &["area_id"]))
            .index(SchemaIndex::new("idx_commodities_status", &["status"]))
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
            "area_id" => Some(self.area_id),
            _ => None,
        }
    }
}
