use std::sync::Arc;

use async_trait::async_trait;
use stockroom_core::{DatabaseConfig, LiveSchema, LiveTable};
use stockroom_migrator::{
    split_sql_statements, AppliedMigration, ApplyOptions, MigrateError, MigrateResult, MigrationConnection,
    MigrationTransaction, Migrator, PostgresDialect, SqliteDialect,
};
use stockroom_registry::models::declared_schema;

/// Read-only connection reporting a fixed live schema
struct StaticConnection {
    live: LiveSchema,
}

#[async_trait]
impl MigrationConnection for StaticConnection {
    async fn ping(&self) -> MigrateResult<()> {
        Ok(())
    }

    async fn live_schema(&self) -> MigrateResult<LiveSchema> {
        Ok(self.live.clone())
    }

    async fn ensure_history_table(&self, _table: &str) -> MigrateResult<()> {
        Ok(())
    }

    async fn applied_migrations(&self, _table: &str) -> MigrateResult<Vec<AppliedMigration>> {
        Ok(Vec::new())
    }

    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>> {
        Err(MigrateError::Connection("read-only test connection".to_string()))
    }

    async fn close(&self) {}
}

fn config(dir: &std::path::Path) -> DatabaseConfig {
    let mut config = DatabaseConfig::new("postgres://localhost/inventory").unwrap();
    config.migrations_dir = dir.to_path_buf();
    config
}

fn migrator(dir: &std::path::Path, live: LiveSchema) -> Migrator {
    Migrator::with_connection(
        config(dir),
        declared_schema(),
        Box::new(PostgresDialect),
        Arc::new(StaticConnection { live }),
    )
    .unwrap()
}

fn position(statements: &[String], needle: &str) -> usize {
    statements
        .iter()
        .position(|s| s.contains(needle))
        .unwrap_or_else(|| panic!("no statement contains {needle}"))
}

#[tokio::test]
async fn initial_migration_orders_enums_and_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    let migrator = migrator(dir.path(), LiveSchema::new());

    let set = migrator.generate_initial_migration().unwrap().unwrap();
    let up = &set.statements;

    let commodity_enum = position(up, "CREATE TYPE commodity_status");
    let commodities = position(up, "CREATE TABLE commodities");
    let areas = position(up, "CREATE TABLE areas");
    let locations = position(up, "CREATE TABLE locations");
    let tenants = position(up, "CREATE TABLE tenants");
    let users = position(up, "CREATE TABLE users");
    assert!(commodity_enum < commodities);
    assert!(locations < areas && areas < commodities);
    assert!(tenants < users);
    assert!(up[commodities].starts_with("-- entity: commodity\n"));

    let loaded = migrator.files().load().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].version, set.version);

    let reread = split_sql_statements(&loaded[0].up_sql);
    assert_eq!(reread.len(), up.len());
    let down = split_sql_statements(&loaded[0].down_sql);
    assert_eq!(down.first().map(String::as_str), Some("DROP TABLE IF EXISTS commodities;"));
    assert!(down.last().unwrap().starts_with("DROP TYPE IF EXISTS"));
}

#[tokio::test]
async fn rapid_generation_yields_increasing_versions() {
    let dir = tempfile::tempdir().unwrap();
    let migrator = migrator(dir.path(), LiveSchema::new());

    let first = migrator.generate_migration_files("first").await.unwrap().unwrap();
    let second = migrator.generate_migration_files("second").await.unwrap().unwrap();
    assert!(second.version > first.version);

    // A fresh manager over the same directory continues after what is on disk
    let other = self::migrator(dir.path(), LiveSchema::new());
    let third = other.generate_migration_files("third").await.unwrap().unwrap();
    assert!(third.version > second.version);
    assert_eq!(other.files().load().unwrap().len(), 3);
}

#[tokio::test]
async fn matching_live_schema_needs_no_migration() {
    let dir = tempfile::tempdir().unwrap();

    // Build the live schema the initial migration would produce
    let declared = declared_schema();
    let mut live = LiveSchema::new();
    for global_enum in &declared.enums {
        live = live.with_enum(global_enum.name.clone());
    }
    for table in &declared.tables {
        let mut live_table = LiveTable::new();
        for field in &table.fields {
            live_table = live_table.column(
                field.name.clone(),
                stockroom_migrator::Dialect::canonical_type(&PostgresDialect, field),
                field.nullable,
            );
        }
        for index in &table.indexes {
            live_table = live_table.index(index.name.clone());
        }
        live = live.with_table(table.name.clone(), live_table);
    }
    // Undeclared live columns and the history table are left alone
    let extra = live.table("locations").unwrap().clone().column("legacy_code", "text", true);
    live = live
        .with_table("locations", extra)
        .with_table("stockroom_migrations", LiveTable::new().column("version", "bigint", false));

    let migrator = migrator(dir.path(), live);
    assert!(migrator.generate_migration_files("noop").await.unwrap().is_none());
    assert!(migrator.files().load().unwrap().is_empty());

    let dry = migrator.apply_pending(ApplyOptions::dry_run()).await.unwrap();
    assert!(dry.planned.is_empty());
}

#[test]
fn sqlite_preview_has_no_enum_types() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.migrations_table = "history".to_string();
    let migrator = Migrator::with_connection(
        config,
        declared_schema(),
        Box::new(SqliteDialect),
        Arc::new(StaticConnection { live: LiveSchema::new() }),
    )
    .unwrap();

    let preview = migrator.preview_schema().unwrap();
    assert!(preview.iter().all(|s| !s.starts_with("CREATE TYPE")));
    let commodities = &preview[position(&preview, "CREATE TABLE commodities")];
    assert!(commodities.contains("status TEXT NOT NULL"));
    assert!(!dir.path().join("history").exists());
}
