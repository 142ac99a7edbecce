//! # stockroom-migrator
//!
//! Keeps a database in line with the schema the inventory entities
//! declare. The planner diffs the declared schema against the live one,
//! the file manager writes versioned apply/revert pairs, and the executor
//! applies pending migrations one transaction at a time.
//!
//! ```no_run
//! use stockroom_core::DatabaseConfig;
//! use stockroom_migrator::{ApplyOptions, Migrator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DatabaseConfig::from_env()?;
//! let migrator = Migrator::connect(config, stockroom_registry::models::declared_schema()).await?;
//! if let Some(files) = migrator.generate_migration_files("add commodity price").await? {
//!     println!("wrote {}", files.up_path.display());
//! }
//! migrator.apply_pending(ApplyOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod definitions;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod files;
pub mod migrator;
pub mod planner;
pub mod teardown;

pub use connection::{
    history_table_sql, DatabaseAdmin, MigrationConnection, MigrationTransaction, PgDatabaseAdmin,
    PgMigrationConnection,
};
pub use definitions::{
    AppliedMigration, ApplyOptions, ApplyReport, Migration, MigrationFileSet, MigrationState, MigrationStatus,
    MigrationStatusEntry, PlannedMigration, RevertReport,
};
pub use dialect::{dialect_for_scheme, Dialect, PostgresDialect, SqliteDialect};
pub use error::{MigrateError, MigrateResult};
pub use executor::MigrationExecutor;
pub use files::{split_sql_statements, MigrationManager, VersionClock};
pub use migrator::Migrator;
pub use planner::{plan, Change, ChangeKind, MigrationPlan};
pub use teardown::{DropOutcome, DropPlan};
