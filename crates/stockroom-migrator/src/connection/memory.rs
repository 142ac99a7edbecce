//! In-process connection for tests. Interprets the DDL the dialects emit
//! well enough to track tables, columns, indexes and enum types.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use stockroom_core::{LiveColumn, LiveSchema, LiveTable};

use super::{DatabaseAdmin, MigrationConnection, MigrationTransaction};
use crate::definitions::AppliedMigration;
use crate::error::{MigrateError, MigrateResult};

#[derive(Debug, Clone, Default)]
struct State {
    schema: LiveSchema,
    history: Option<BTreeMap<i64, AppliedMigration>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    fail_on: Mutex<Option<String>>,
    mutations: Mutex<usize>,
    executed: Mutex<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryConnection {
    shared: Arc<Shared>,
}

impl MemoryConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_schema(schema: LiveSchema) -> Self {
        let connection = Self::new();
        connection.shared.state.lock().schema = schema;
        connection
    }

    /// Any statement containing `needle` fails
    pub(crate) fn fail_on(&self, needle: &str) {
        *self.shared.fail_on.lock() = Some(needle.to_string());
    }

    pub(crate) fn schema(&self) -> LiveSchema {
        self.shared.state.lock().schema.clone()
    }

    pub(crate) fn applied_versions(&self) -> Vec<i64> {
        self.shared
            .state
            .lock()
            .history
            .as_ref()
            .map(|h| h.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Committed transactions plus history-table creations
    pub(crate) fn mutations(&self) -> usize {
        *self.shared.mutations.lock()
    }

    /// Statements run, in order, including rolled-back ones
    pub(crate) fn executed(&self) -> Vec<String> {
        self.shared.executed.lock().clone()
    }
}

#[async_trait]
impl MigrationConnection for MemoryConnection {
    async fn ping(&self) -> MigrateResult<()> {
        Ok(())
    }

    async fn live_schema(&self) -> MigrateResult<LiveSchema> {
        Ok(self.schema())
    }

    async fn ensure_history_table(&self, table: &str) -> MigrateResult<()> {
        let mut state = self.shared.state.lock();
        if state.history.is_none() {
            state.history = Some(BTreeMap::new());
            state.schema.tables.insert(
                table.to_string(),
                LiveTable::new()
                    .column("version", "bigint", false)
                    .column("name", "text", false)
                    .column("applied_at", "timestamp with time zone", false),
            );
            *self.shared.mutations.lock() += 1;
        }
        Ok(())
    }

    async fn applied_migrations(&self, _table: &str) -> MigrateResult<Vec<AppliedMigration>> {
        Ok(self
            .shared
            .state
            .lock()
            .history
            .as_ref()
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>> {
        let working = self.shared.state.lock().clone();
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            working,
        }))
    }

    async fn close(&self) {}
}

struct MemoryTransaction {
    shared: Arc<Shared>,
    working: State,
}

#[async_trait]
impl MigrationTransaction for MemoryTransaction {
    async fn execute(&mut self, statement: &str) -> MigrateResult<()> {
        self.shared.executed.lock().push(statement.to_string());
        if let Some(needle) = self.shared.fail_on.lock().as_deref() {
            if statement.contains(needle) {
                return Err(MigrateError::Database(format!("injected failure: {statement}")));
            }
        }
        interpret(&mut self.working.schema, statement);
        Ok(())
    }

    async fn record_applied(&mut self, _table: &str, version: i64, name: &str) -> MigrateResult<()> {
        let history = self
            .working
            .history
            .as_mut()
            .ok_or_else(|| MigrateError::Database("history table does not exist".to_string()))?;
        if history.contains_key(&version) {
            return Err(MigrateError::Database(format!("duplicate version {version}")));
        }
        history.insert(
            version,
            AppliedMigration {
                version,
                name: name.to_string(),
                applied_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn remove_applied(&mut self, _table: &str, version: i64) -> MigrateResult<()> {
        if let Some(history) = self.working.history.as_mut() {
            history.remove(&version);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        *self.shared.state.lock() = self.working;
        *self.shared.mutations.lock() += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        Ok(())
    }
}

fn word_after<'a>(statement: &'a str, prefix: &str) -> Option<&'a str> {
    statement
        .strip_prefix(prefix)
        .and_then(|rest| rest.split_whitespace().next())
        .map(|word| word.trim_end_matches(';'))
}

/// First word of a DDL type as the catalog would spell it
fn catalog_type(ddl: &str) -> String {
    let lowered = ddl.to_lowercase();
    if let Some(length) = lowered.strip_prefix("varchar") {
        return format!("character varying{length}");
    }
    match lowered.as_str() {
        "timestamptz" => "timestamp with time zone".to_string(),
        "double" => "double precision".to_string(),
        _ => lowered,
    }
}

fn interpret(schema: &mut LiveSchema, statement: &str) {
    let body: String = statement
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    let body = body.trim();

    if let Some(name) = word_after(body, "CREATE TYPE ") {
        schema.enums.insert(name.to_string());
    } else if let Some(name) = word_after(body, "DROP TYPE IF EXISTS ") {
        schema.enums.remove(name);
    } else if let Some(name) = word_after(body, "CREATE TABLE ") {
        let mut table = LiveTable::new();
        for line in body.lines().skip(1) {
            let line = line.trim().trim_end_matches(',');
            if line.starts_with(')') || line.starts_with("PRIMARY KEY") || line.starts_with("FOREIGN KEY") {
                continue;
            }
            let mut parts = line.split_whitespace();
            if let (Some(column), Some(column_type)) = (parts.next(), parts.next()) {
                table = table.column(column, catalog_type(column_type), !line.contains("NOT NULL"));
            }
        }
        schema.tables.insert(name.to_string(), table);
    } else if let Some(name) = word_after(body, "DROP TABLE IF EXISTS ") {
        schema.tables.remove(name);
    } else if body.starts_with("CREATE INDEX ") || body.starts_with("CREATE UNIQUE INDEX ") {
        let words: Vec<&str> = body.split_whitespace().collect();
        if let Some(on) = words.iter().position(|w| *w == "ON") {
            if let (Some(index), Some(table)) = (words.get(on - 1), words.get(on + 1)) {
                if let Some(live) = schema.tables.get_mut(*table) {
                    live.indexes.insert(index.to_string());
                }
            }
        }
    } else if let Some(table) = word_after(body, "ALTER TABLE ") {
        let words: Vec<&str> = body.split_whitespace().collect();
        let Some(live) = schema.tables.get_mut(table) else {
            return;
        };
        match words.get(3..) {
            Some(["ADD", "COLUMN", column, column_type, ..]) => {
                live.columns.insert(
                    column.to_string(),
                    LiveColumn {
                        data_type: catalog_type(column_type.trim_end_matches(';')),
                        nullable: !body.contains("NOT NULL"),
                    },
                );
            }
            Some(["ALTER", "COLUMN", column, "TYPE", column_type, ..]) => {
                if let Some(live_column) = live.columns.get_mut(*column) {
                    live_column.data_type = catalog_type(column_type);
                }
            }
            Some(["ALTER", "COLUMN", column, action, ..]) => {
                if let Some(live_column) = live.columns.get_mut(*column) {
                    live_column.nullable = *action == "DROP";
                }
            }
            Some(["DROP", "COLUMN", rest @ ..]) => {
                if let Some(column) = rest.last() {
                    live.columns.remove(column.trim_end_matches(';'));
                }
            }
            _ => {}
        }
    }
}

/// Records admin statements instead of running them
#[derive(Debug, Default)]
pub(crate) struct RecordingAdmin {
    pub(crate) statements: Mutex<Vec<String>>,
    pub(crate) calls: Mutex<usize>,
}

#[async_trait]
impl DatabaseAdmin for RecordingAdmin {
    async fn database_exists(&self, _name: &str) -> MigrateResult<bool> {
        *self.calls.lock() += 1;
        Ok(true)
    }

    async fn execute(&self, statement: &str) -> MigrateResult<()> {
        *self.calls.lock() += 1;
        self.statements.lock().push(statement.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interprets_generated_ddl() {
        let mut schema = LiveSchema::new();
        interpret(&mut schema, "CREATE TYPE s AS ENUM ('a');");
        interpret(
            &mut schema,
            "-- entity: area\nCREATE TABLE areas (\n    id UUID NOT NULL,\n    note TEXT,\n    PRIMARY KEY (id)\n);",
        );
        interpret(&mut schema, "CREATE INDEX idx_areas_note ON areas (note);");
        interpret(&mut schema, "ALTER TABLE areas ADD COLUMN price NUMERIC(12,2);");
        interpret(&mut schema, "ALTER TABLE areas ALTER COLUMN price SET NOT NULL;");

        assert!(schema.has_enum("s"));
        let areas = schema.table("areas").unwrap();
        assert_eq!(areas.columns["id"].data_type, "uuid");
        assert!(areas.columns["note"].nullable);
        assert_eq!(areas.columns["price"].data_type, "numeric(12,2)");
        assert_eq!(catalog_type("VARCHAR(255)"), "character varying(255)");
        assert!(!areas.columns["price"].nullable);
        assert!(areas.indexes.contains("idx_areas_note"));

        interpret(&mut schema, "DROP TABLE IF EXISTS areas;");
        assert!(schema.table("areas").is_none());
    }
}
