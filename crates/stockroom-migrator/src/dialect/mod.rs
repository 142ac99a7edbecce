//! SQL dialects
//!
//! A [`Dialect`] renders schema-model declarations as backend-specific DDL
//! and knows the canonical spelling of each type as the backend's catalog
//! reports it, so declared and live columns can be compared.

mod postgres;
mod sqlite;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use stockroom_core::{GlobalEnum, SchemaField, SchemaIndex, TableSchema};

use crate::error::{MigrateError, MigrateResult};

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Column type as written in DDL, honouring per-dialect overrides
    fn column_type(&self, field: &SchemaField) -> String;

    /// Lower-case type as the catalog reports it for this field
    fn canonical_type(&self, field: &SchemaField) -> String;

    fn supports_enums(&self) -> bool;

    /// `None` when the dialect has no enum types
    fn create_enum(&self, global_enum: &GlobalEnum) -> Option<String>;

    fn drop_enum(&self, name: &str) -> Option<String>;

    fn create_table(&self, table: &TableSchema) -> String;

    fn drop_table(&self, table: &str) -> String;

    fn add_column(&self, table: &str, field: &SchemaField) -> String;

    fn drop_column(&self, table: &str, column: &str) -> String;

    /// `None` when the dialect cannot change a column's type in place
    fn alter_column_type(&self, table: &str, column: &str, column_type: &str) -> Option<String>;

    /// `None` when the dialect cannot change nullability in place
    fn set_nullable(&self, table: &str, column: &str, nullable: bool) -> Option<String>;

    fn create_index(&self, table: &str, index: &SchemaIndex) -> String {
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            if index.unique { "UNIQUE " } else { "" },
            index.name,
            table,
            index.columns.join(", ")
        )
    }

    fn drop_index(&self, index: &str) -> String {
        format!("DROP INDEX IF EXISTS {index};")
    }
}

/// Dialect for a connection-string scheme
pub fn dialect_for_scheme(scheme: &str) -> MigrateResult<Box<dyn Dialect>> {
    match scheme {
        "postgres" | "postgresql" => Ok(Box::new(PostgresDialect)),
        "sqlite" => Ok(Box::new(SqliteDialect)),
        other => Err(MigrateError::Connection(format!(
            "no migration dialect for scheme '{other}'"
        ))),
    }
}

/// `name TYPE [NOT NULL] [UNIQUE] [DEFAULT expr]`
pub(crate) fn column_definition(dialect: &dyn Dialect, field: &SchemaField) -> String {
    let mut line = format!("{} {}", field.name, dialect.column_type(field));
    if !field.nullable {
        line.push_str(" NOT NULL");
    }
    if field.unique && !field.primary_key {
        line.push_str(" UNIQUE");
    }
    if let Some(default) = &field.default {
        line.push_str(" DEFAULT ");
        line.push_str(default);
    }
    line
}

/// Shared CREATE TABLE layout: field lines, then the primary key, then
/// foreign keys
pub(crate) fn render_create_table(dialect: &dyn Dialect, table: &TableSchema) -> String {
    let mut lines: Vec<String> = table
        .fields
        .iter()
        .map(|f| column_definition(dialect, f))
        .collect();

    let primary_key = table.primary_key_columns();
    if !primary_key.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }

    for field in &table.fields {
        if let Some(fk) = &field.references {
            lines.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
                field.name,
                fk.table,
                fk.column,
                fk.on_delete.as_sql()
            ));
        }
    }

    let mut sql = format!(
        "-- entity: {}\nCREATE TABLE {} (\n    {}\n)",
        table.entity,
        table.name,
        lines.join(",\n    ")
    );
    if let Some(clause) = table.storage_clause(dialect.name()) {
        sql.push(' ');
        sql.push_str(clause);
    }
    sql.push(';');
    sql
}

pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_for_scheme() {
        assert_eq!(dialect_for_scheme("postgresql").unwrap().name(), "postgres");
        assert_eq!(dialect_for_scheme("sqlite").unwrap().name(), "sqlite");
        assert!(dialect_for_scheme("memory").is_err());
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
