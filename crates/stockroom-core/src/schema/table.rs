//! Table-level schema declarations

use serde::{Deserialize, Serialize};

use super::field::SchemaField;

/// Secondary index on a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIndex {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl SchemaIndex {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Enumeration shared by any table that references it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalEnum {
    pub name: String,
    pub values: Vec<String>,
}

impl GlobalEnum {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Table-wide directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableDirective {
    /// Composite primary key
    PrimaryKey { columns: Vec<String> },
    /// Storage clause appended to CREATE TABLE for one dialect only
    Storage { dialect: String, clause: String },
    /// Raw statement emitted after the table is created
    RawSql { sql: String },
}

/// Declared shape of one entity's table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    /// Entity the table persists, kept for traceability in generated SQL
    pub entity: String,
    pub fields: Vec<SchemaField>,
    #[serde(default)]
    pub indexes: Vec<SchemaIndex>,
    #[serde(default)]
    pub directives: Vec<TableDirective>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            fields: Vec::new(),
            indexes: Vec::new(),
            directives: Vec::new(),
        }
    }

    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn index(mut self, index: SchemaIndex) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn directive(mut self, directive: TableDirective) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Primary key columns: the composite directive if present, otherwise
    /// every field flagged as primary key
    pub fn primary_key_columns(&self) -> Vec<&str> {
        for directive in &self.directives {
            if let TableDirective::PrimaryKey { columns } = directive {
                return columns.iter().map(String::as_str).collect();
            }
        }
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Tables this table references through foreign keys, excluding itself
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = Vec::new();
        for fk in self.fields.iter().filter_map(|f| f.references.as_ref()) {
            if fk.table != self.name && !tables.contains(&fk.table.as_str()) {
                tables.push(&fk.table);
            }
        }
        tables
    }

    pub fn storage_clause(&self, dialect: &str) -> Option<&str> {
        self.directives.iter().find_map(|d| match d {
            TableDirective::Storage { dialect: target, clause } if target == dialect => Some(clause.as_str()),
            _ => None,
        })
    }

    pub fn raw_statements(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().filter_map(|d| match d {
            TableDirective::RawSql { sql } => Some(sql.as_str()),
            _ => None,
        })
    }
}

/// The complete declared schema of the application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredSchema {
    #[serde(default)]
    pub enums: Vec<GlobalEnum>,
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl DeclaredSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enum(mut self, global_enum: GlobalEnum) -> Self {
        self.enums.push(global_enum);
        self
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn enum_def(&self, name: &str) -> Option<&GlobalEnum> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty() && self.tables.is_empty()
    }
}
