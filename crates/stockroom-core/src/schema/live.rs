//! Schema read back from a connected database

use std::collections::{BTreeMap, BTreeSet};

/// A column as reported by the database catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    /// Canonical, lower-case type name as the dialect reports it
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveTable {
    pub columns: BTreeMap<String, LiveColumn>,
    pub indexes: BTreeSet<String>,
}

impl LiveTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        self.columns.insert(
            name.into(),
            LiveColumn {
                data_type: data_type.into().to_lowercase(),
                nullable,
            },
        );
        self
    }

    pub fn index(mut self, name: impl Into<String>) -> Self {
        self.indexes.insert(name.into());
        self
    }
}

/// Snapshot of the tables, indexes and enum types present in a database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSchema {
    pub tables: BTreeMap<String, LiveTable>,
    pub enums: BTreeSet<String>,
}

impl LiveSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, table: LiveTable) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    pub fn with_enum(mut self, name: impl Into<String>) -> Self {
        self.enums.insert(name.into());
        self
    }

    /// Drop a table from the snapshot (e.g. the migration history table)
    pub fn without_table(mut self, name: &str) -> Self {
        self.tables.remove(name);
        self
    }

    pub fn table(&self, name: &str) -> Option<&LiveTable> {
        self.tables.get(name)
    }

    pub fn has_enum(&self, name: &str) -> bool {
        self.enums.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.enums.is_empty()
    }
}
