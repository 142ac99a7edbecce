use stockroom_core::{FieldType, GlobalEnum, SchemaField, TableSchema};

use super::{column_definition, render_create_table, Dialect};

/// SQLite DDL. Enum fields are stored as `TEXT`; column types and
/// nullability cannot be altered in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_type(&self, field: &SchemaField) -> String {
        if let Some(raw) = field.type_override(self.name()) {
            return raw.to_string();
        }
        let affinity = match &field.field_type {
            FieldType::Integer | FieldType::BigInt | FieldType::Boolean => "INTEGER",
            FieldType::Decimal { .. } => "NUMERIC",
            FieldType::Float => "REAL",
            FieldType::Text
            | FieldType::Varchar { .. }
            | FieldType::Timestamp
            | FieldType::Date
            | FieldType::Uuid
            | FieldType::Json
            | FieldType::Enum { .. } => "TEXT",
        };
        affinity.to_string()
    }

    fn canonical_type(&self, field: &SchemaField) -> String {
        self.column_type(field).to_lowercase()
    }

    fn supports_enums(&self) -> bool {
        false
    }

    fn create_enum(&self, _global_enum: &GlobalEnum) -> Option<String> {
        None
    }

    fn drop_enum(&self, _name: &str) -> Option<String> {
        None
    }

    fn create_table(&self, table: &TableSchema) -> String {
        render_create_table(self, table)
    }

    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {table};")
    }

    fn add_column(&self, table: &str, field: &SchemaField) -> String {
        format!("ALTER TABLE {} ADD COLUMN {};", table, column_definition(self, field))
    }

    fn drop_column(&self, table: &str, column: &str) -> String {
        format!("ALTER TABLE {table} DROP COLUMN {column};")
    }

    fn alter_column_type(&self, _table: &str, _column: &str, _column_type: &str) -> Option<String> {
        None
    }

    fn set_nullable(&self, _table: &str, _column: &str, _nullable: bool) -> Option<String> {
        None
    }
}
