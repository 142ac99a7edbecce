//! Inventory entities
//!
//! Tenants and users own locations; a location holds areas and an area
//! holds commodities. Parents cannot be deleted while children remain.

pub mod area;
pub mod commodity;
pub mod location;
pub mod tenant;
pub mod user;

pub use area::Area;
pub use commodity::{Commodity, CommodityStatus};
pub use location::Location;
pub use tenant::{Tenant, TenantStatus};
pub use user::{User, UserRole};

use stockroom_core::{DeclaredSchema, GlobalEnum};

use crate::entity::Entity;
use crate::relationships::{DeletePolicy, RelationDef};

pub const LOCATION_AREAS: RelationDef = RelationDef {
    name: "location_areas",
    parent_entity: Location::ENTITY_NAME,
    parent_table: "locations",
    child_entity: Area::ENTITY_NAME,
    child_table: "areas",
    foreign_key: "location_id",
    on_delete: DeletePolicy::Restrict,
};

pub const AREA_COMMODITIES: RelationDef = RelationDef {
    name: "area_commodities",
    parent_entity: Area::ENTITY_NAME,
    parent_table: "areas",
    child_entity: Commodity::ENTITY_NAME,
    child_table: "commodities",
    foreign_key: "area_id",
    on_delete: DeletePolicy::Restrict,
};

pub fn relations() -> [RelationDef; 2] {
    [LOCATION_AREAS, AREA_COMMODITIES]
}

/// Relations in which `table` is the child
pub fn parent_relations(table: &str) -> Vec<RelationDef> {
    relations().into_iter().filter(|r| r.child_table == table).collect()
}

/// Relations in which `table` is the parent
pub fn child_relations(table: &str) -> Vec<RelationDef> {
    relations().into_iter().filter(|r| r.parent_table == table).collect()
}

/// Declared schema of every inventory entity, consumed by the migrator
pub fn declared_schema() -> DeclaredSchema {
    DeclaredSchema::new()
        .with_enum(GlobalEnum::new("tenant_status", &["active", "suspended"]))
        .with_enum(GlobalEnum::new("user_role", &["admin", "user", "viewer"]))
        .with_enum(GlobalEnum::new("commodity_status", &CommodityStatus::ALL))
        .with_table(Tenant::table_schema())
        .with_table(User::table_schema())
        .with_table(Location::table_schema())
        .with_table(Area::table_schema())
        .with_table(Commodity::table_schema())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn serialized_keys<E: Entity>(entity: &E) -> BTreeSet<String> {
        match serde_json::to_value(entity).unwrap() {
            serde_json::Value::Object(map) => map.keys().cloned().collect(),
            other => panic!("expected object, got {other}"),
        }
    }

    fn columns<E: Entity>() -> BTreeSet<String> {
        E::table_schema().column_names().into_iter().map(String::from).collect()
    }

    #[test]
    fn test_serialized_shape_matches_columns() {
        let location_id = Uuid::new_v4();
        assert_eq!(serialized_keys(&Tenant::new("Acme", "acme")), columns::<Tenant>());
        assert_eq!(serialized_keys(&User::new("a@b.c", "A")), columns::<User>());
        assert_eq!(serialized_keys(&Location::new("Garage")), columns::<Location>());
        assert_eq!(serialized_keys(&Area::new("Shelf", location_id)), columns::<Area>());
        assert_eq!(
            serialized_keys(&Commodity::new("Drill", Uuid::new_v4())),
            columns::<Commodity>()
        );
    }

    #[test]
    fn test_declared_enums_cover_enum_fields() {
        let schema = declared_schema();
        for table in &schema.tables {
            for field in &table.fields {
                if let Some(name) = field.field_type.enum_name() {
                    assert!(schema.enum_def(name).is_some(), "{}.{} uses {name}", table.name, field.name);
                }
            }
        }
    }

    #[test]
    fn test_relations_match_foreign_keys() {
        let schema = declared_schema();
        for relation in relations() {
            let child = schema.table(relation.child_table).unwrap();
            let fk = child.get_field(relation.foreign_key).unwrap();
            assert_eq!(fk.references.as_ref().unwrap().table, relation.parent_table);
        }
        assert_eq!(parent_relations("areas"), vec![LOCATION_AREAS]);
        assert_eq!(child_relations("areas"), vec![AREA_COMMODITIES]);
    }

    #[test]
    fn test_commodity_status_serializes_snake_case() {
        let value = serde_json::to_value(CommodityStatus::WrittenOff).unwrap();
        assert_eq!(value, "written_off");
    }
}
