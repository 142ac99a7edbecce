use stockroom_core::{FieldType, GlobalEnum, SchemaField, TableSchema};

use super::{column_definition, quote_literal, render_create_table, Dialect};

/// PostgreSQL DDL
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn column_type(&self, field: &SchemaField) -> String {
        if let Some(raw) = field.type_override(self.name()) {
            return raw.to_string();
        }
        match &field.field_type {
            FieldType::Text => "TEXT".to_string(),
            FieldType::Varchar { length } => format!("VARCHAR({length})"),
            FieldType::Integer => "INTEGER".to_string(),
            FieldType::BigInt => "BIGINT".to_string(),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Decimal { precision, scale } => format!("NUMERIC({precision},{scale})"),
            FieldType::Float => "DOUBLE PRECISION".to_string(),
            FieldType::Timestamp => "TIMESTAMPTZ".to_string(),
            FieldType::Date => "DATE".to_string(),
            FieldType::Uuid => "UUID".to_string(),
            FieldType::Json => "JSONB".to_string(),
            FieldType::Enum { name } => name.clone(),
        }
    }

    fn canonical_type(&self, field: &SchemaField) -> String {
        if let Some(raw) = field.type_override(self.name()) {
            return raw.to_lowercase();
        }
        match &field.field_type {
            FieldType::Text => "text".to_string(),
            FieldType::Varchar { length } => format!("character varying({length})"),
            FieldType::Integer => "integer".to_string(),
            FieldType::BigInt => "bigint".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Decimal { precision, scale } => format!("numeric({precision},{scale})"),
            FieldType::Float => "double precision".to_string(),
            FieldType::Timestamp => "timestamp with time zone".to_string(),
            FieldType::Date => "date".to_string(),
            FieldType::Uuid => "uuid".to_string(),
            FieldType::Json => "jsonb".to_string(),
            FieldType::Enum { name } => name.to_lowercase(),
        }
    }

    fn supports_enums(&self) -> bool {
        true
    }

    fn create_enum(&self, global_enum: &GlobalEnum) -> Option<String> {
        let values: Vec<String> = global_enum.values.iter().map(|v| quote_literal(v)).collect();
        Some(format!(
            "CREATE TYPE {} AS ENUM ({});",
            global_enum.name,
            values.join(", ")
        ))
    }

    fn drop_enum(&self, name: &str) -> Option<String> {
        Some(format!("DROP TYPE IF EXISTS {name};"))
    }

    fn create_table(&self, table: &TableSchema) -> String {
        render_create_table(self, table)
    }

    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {table};")
    }

    fn add_column(&self, table: &str, field: &SchemaField) -> String {
        let mut sql = format!("ALTER TABLE {} ADD COLUMN {}", table, column_definition(self, field));
        if let Some(fk) = &field.references {
            sql.push_str(&format!(
                " REFERENCES {} ({}) ON DELETE {}",
                fk.table,
                fk.column,
                fk.on_delete.as_sql()
            ));
        }
        sql.push(';');
        sql
    }

    fn drop_column(&self, table: &str, column: &str) -> String {
        format!("ALTER TABLE {table} DROP COLUMN IF EXISTS {column};")
    }

    fn alter_column_type(&self, table: &str, column: &str, column_type: &str) -> Option<String> {
        Some(format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {column_type} USING {column}::{column_type};"
        ))
    }

    fn set_nullable(&self, table: &str, column: &str, nullable: bool) -> Option<String> {
        let action = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        Some(format!("ALTER TABLE {table} ALTER COLUMN {column} {action};"))
    }
}
