//! Database access used by the migrator
//!
//! The executor and planner only talk to these traits, so the same
//! migration logic runs against PostgreSQL and against in-process fakes.

#[cfg(test)]
pub(crate) mod memory;
mod postgres;

pub use postgres::{PgDatabaseAdmin, PgMigrationConnection};

use async_trait::async_trait;
use stockroom_core::LiveSchema;

use crate::definitions::AppliedMigration;
use crate::error::MigrateResult;

/// Connection to the database being migrated
#[async_trait]
pub trait MigrationConnection: Send + Sync {
    async fn ping(&self) -> MigrateResult<()>;

    /// Tables, columns, indexes and enum types as the catalog reports them
    async fn live_schema(&self) -> MigrateResult<LiveSchema>;

    async fn ensure_history_table(&self, table: &str) -> MigrateResult<()>;

    /// History rows ascending by version; empty when the table does not exist
    async fn applied_migrations(&self, table: &str) -> MigrateResult<Vec<AppliedMigration>>;

    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>>;

    async fn close(&self);
}

/// One migration's transaction. Dropping it without `commit` discards its
/// effects.
#[async_trait]
pub trait MigrationTransaction: Send {
    async fn execute(&mut self, statement: &str) -> MigrateResult<()>;

    async fn record_applied(&mut self, table: &str, version: i64, name: &str) -> MigrateResult<()>;

    async fn remove_applied(&mut self, table: &str, version: i64) -> MigrateResult<()>;

    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// Server-level operations run outside any transaction, against a
/// maintenance database
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    async fn database_exists(&self, name: &str) -> MigrateResult<bool>;

    async fn execute(&self, statement: &str) -> MigrateResult<()>;
}

/// DDL for the history table
pub fn history_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    \
            version BIGINT PRIMARY KEY,\n    \
            name TEXT NOT NULL,\n    \
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()\n\
        );",
        table
    )
}
