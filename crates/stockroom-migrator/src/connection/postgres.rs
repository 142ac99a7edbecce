use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, Postgres, Row, Transaction};
use stockroom_core::{ConnectionString, DatabaseConfig, LiveColumn, LiveSchema, LiveTable};

use super::{history_table_sql, DatabaseAdmin, MigrationConnection, MigrationTransaction};
use crate::definitions::AppliedMigration;
use crate::error::{MigrateError, MigrateResult};

const COLUMNS_QUERY: &str = "\
SELECT c.table_name::text AS table_name,
       c.column_name::text AS column_name,
       c.is_nullable::text AS is_nullable,
       c.data_type::text AS data_type,
       c.udt_name::text AS udt_name,
       c.character_maximum_length::int4 AS char_length,
       c.numeric_precision::int4 AS numeric_precision,
       c.numeric_scale::int4 AS numeric_scale
FROM information_schema.columns c
JOIN information_schema.tables t
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name
WHERE c.table_schema = current_schema() AND t.table_type = 'BASE TABLE'
ORDER BY c.table_name, c.ordinal_position";

const INDEXES_QUERY: &str = "\
SELECT tablename::text AS table_name, indexname::text AS index_name
FROM pg_indexes
WHERE schemaname = current_schema()";

const ENUMS_QUERY: &str = "\
SELECT t.typname::text AS enum_name
FROM pg_type t
JOIN pg_namespace n ON n.oid = t.typnamespace
WHERE t.typtype = 'e' AND n.nspname = current_schema()";

async fn bounded<T, F>(timeout: Duration, operation: &str, fut: F) -> MigrateResult<T>
where
    F: Future<Output = MigrateResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout = ?timeout, "migration operation timed out");
            Err(MigrateError::Connection(format!(
                "{operation} timed out after {timeout:?}"
            )))
        }
    }
}

async fn connect_pool(dsn: &ConnectionString, config: &DatabaseConfig) -> MigrateResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.operation_timeout)
        .connect(dsn.as_str())
        .await
        .map_err(|e| MigrateError::Connection(format!("failed to connect to {}: {}", dsn.redacted(), e)))
}

/// Catalog spelling of a column type, matching
/// [`Dialect::canonical_type`](crate::dialect::Dialect::canonical_type)
fn canonical_type(
    data_type: &str,
    udt_name: &str,
    char_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    match (data_type, char_length, precision, scale) {
        ("USER-DEFINED", ..) => udt_name.to_lowercase(),
        ("ARRAY", ..) => format!("{}[]", udt_name.trim_start_matches('_')),
        ("character varying", Some(length), ..) => format!("character varying({length})"),
        ("character", Some(length), ..) => format!("character({length})"),
        ("numeric", _, Some(precision), Some(scale)) => format!("numeric({precision},{scale})"),
        (other, ..) => other.to_lowercase(),
    }
}

/// PostgreSQL database being migrated
pub struct PgMigrationConnection {
    pool: PgPool,
    timeout: Duration,
}

impl PgMigrationConnection {
    pub async fn connect(config: &DatabaseConfig) -> MigrateResult<Self> {
        let connection = Self::from_pool(connect_pool(&config.dsn, config).await?, config.operation_timeout);
        if let Err(e) = connection.ping().await {
            connection.pool.close().await;
            return Err(e);
        }
        tracing::info!(dsn = %config.dsn.redacted(), "migrator connected to PostgreSQL");
        Ok(connection)
    }

    pub fn from_pool(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MigrationConnection for PgMigrationConnection {
    async fn ping(&self) -> MigrateResult<()> {
        bounded(self.timeout, "ping", async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, MigrateError>(())
        })
        .await
    }

    async fn live_schema(&self) -> MigrateResult<LiveSchema> {
        bounded(self.timeout, "read live schema", async {
            let mut schema = LiveSchema::new();

            for row in sqlx::query(COLUMNS_QUERY).fetch_all(&self.pool).await? {
                let table: String = row.try_get("table_name")?;
                let column: String = row.try_get("column_name")?;
                let is_nullable: String = row.try_get("is_nullable")?;
                let data_type: String = row.try_get("data_type")?;
                let udt_name: String = row.try_get("udt_name")?;
                let data_type = canonical_type(
                    &data_type,
                    &udt_name,
                    row.try_get("char_length")?,
                    row.try_get("numeric_precision")?,
                    row.try_get("numeric_scale")?,
                );
                schema.tables.entry(table).or_insert_with(LiveTable::new).columns.insert(
                    column,
                    LiveColumn {
                        data_type,
                        nullable: is_nullable == "YES",
                    },
                );
            }

            for row in sqlx::query(INDEXES_QUERY).fetch_all(&self.pool).await? {
                let table: String = row.try_get("table_name")?;
                let index: String = row.try_get("index_name")?;
                if let Some(live) = schema.tables.get_mut(&table) {
                    live.indexes.insert(index);
                }
            }

            for row in sqlx::query(ENUMS_QUERY).fetch_all(&self.pool).await? {
                let name: String = row.try_get("enum_name")?;
                schema.enums.insert(name);
            }

            tracing::debug!(
                tables = schema.tables.len(),
                enums = schema.enums.len(),
                "read live schema"
            );
            Ok::<_, MigrateError>(schema)
        })
        .await
    }

    async fn ensure_history_table(&self, table: &str) -> MigrateResult<()> {
        bounded(self.timeout, "create history table", async {
            sqlx::query(&history_table_sql(table)).execute(&self.pool).await?;
            Ok::<_, MigrateError>(())
        })
        .await
    }

    async fn applied_migrations(&self, table: &str) -> MigrateResult<Vec<AppliedMigration>> {
        bounded(self.timeout, "read migration history", async {
            let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
                .bind(table)
                .fetch_one(&self.pool)
                .await?;
            if !exists {
                return Ok::<_, MigrateError>(Vec::new());
            }

            let rows = sqlx::query(&format!(
                "SELECT version, name, applied_at FROM {table} ORDER BY version"
            ))
            .fetch_all(&self.pool)
            .await?;
            rows.iter()
                .map(|row| {
                    Ok(AppliedMigration {
                        version: row.try_get("version")?,
                        name: row.try_get("name")?,
                        applied_at: row.try_get("applied_at")?,
                    })
                })
                .collect::<MigrateResult<Vec<_>>>()
        })
        .await
    }

    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>> {
        let tx = bounded(self.timeout, "begin transaction", async { Ok::<_, MigrateError>(self.pool.begin().await?) }).await?;
        Ok(Box::new(PgMigrationTransaction {
            tx,
            timeout: self.timeout,
        }))
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("migrator connection closed");
    }
}

struct PgMigrationTransaction {
    tx: Transaction<'static, Postgres>,
    timeout: Duration,
}

#[async_trait]
impl MigrationTransaction for PgMigrationTransaction {
    async fn execute(&mut self, statement: &str) -> MigrateResult<()> {
        let tx = &mut self.tx;
        bounded(self.timeout, "execute migration statement", async move {
            sqlx::query(statement).execute(&mut **tx).await?;
            Ok::<_, MigrateError>(())
        })
        .await
    }

    async fn record_applied(&mut self, table: &str, version: i64, name: &str) -> MigrateResult<()> {
        let tx = &mut self.tx;
        let sql = format!("INSERT INTO {table} (version, name) VALUES ($1, $2)");
        bounded(self.timeout, "record migration", async move {
            sqlx::query(&sql).bind(version).bind(name).execute(&mut **tx).await?;
            Ok::<_, MigrateError>(())
        })
        .await
    }

    async fn remove_applied(&mut self, table: &str, version: i64) -> MigrateResult<()> {
        let tx = &mut self.tx;
        let sql = format!("DELETE FROM {table} WHERE version = $1");
        bounded(self.timeout, "remove migration record", async move {
            sqlx::query(&sql).bind(version).execute(&mut **tx).await?;
            Ok::<_, MigrateError>(())
        })
        .await
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        let timeout = self.timeout;
        bounded(timeout, "commit", async move { Ok::<_, MigrateError>(self.tx.commit().await?) }).await
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        let timeout = self.timeout;
        bounded(timeout, "rollback", async move { Ok::<_, MigrateError>(self.tx.rollback().await?) }).await
    }
}

/// Server administration through the `postgres` maintenance database
pub struct PgDatabaseAdmin {
    pool: PgPool,
    timeout: Duration,
}

impl PgDatabaseAdmin {
    pub const MAINTENANCE_DATABASE: &'static str = "postgres";

    pub async fn connect(config: &DatabaseConfig) -> MigrateResult<Self> {
        let dsn = config.dsn.with_database(Self::MAINTENANCE_DATABASE)?;
        Ok(Self {
            pool: connect_pool(&dsn, config).await?,
            timeout: config.operation_timeout,
        })
    }
}

#[async_trait]
impl DatabaseAdmin for PgDatabaseAdmin {
    async fn database_exists(&self, name: &str) -> MigrateResult<bool> {
        bounded(self.timeout, "check database", async {
            Ok::<_, MigrateError>(sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?)
        })
        .await
    }

    async fn execute(&self, statement: &str) -> MigrateResult<()> {
        // Simple protocol: DROP DATABASE refuses to run inside a transaction block
        bounded(self.timeout, "execute admin statement", async {
            self.pool.execute(statement).await?;
            Ok::<_, MigrateError>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_type_from_catalog() {
        assert_eq!(canonical_type("character varying", "varchar", Some(255), None, None), "character varying(255)");
        assert_eq!(canonical_type("numeric", "numeric", None, Some(12), Some(2)), "numeric(12,2)");
        assert_eq!(canonical_type("numeric", "numeric", None, None, None), "numeric");
        assert_eq!(canonical_type("USER-DEFINED", "commodity_status", None, None, None), "commodity_status");
        assert_eq!(canonical_type("ARRAY", "_text", None, None, None), "text[]");
        assert_eq!(
            canonical_type("timestamp with time zone", "timestamptz", None, None, None),
            "timestamp with time zone"
        );
        assert_eq!(canonical_type("integer", "int4", None, Some(32), Some(0)), "integer");
    }
}
