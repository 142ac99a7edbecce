use std::sync::Arc;

use stockroom_core::{DatabaseConfig, DeclaredSchema, LiveSchema, Prompter, TerminalPrompter};

use crate::connection::{DatabaseAdmin, MigrationConnection, PgDatabaseAdmin, PgMigrationConnection};
use crate::definitions::{ApplyOptions, ApplyReport, MigrationFileSet, MigrationStatusEntry, RevertReport};
use crate::dialect::{dialect_for_scheme, Dialect};
use crate::error::{MigrateError, MigrateResult};
use crate::executor::MigrationExecutor;
use crate::files::MigrationManager;
use crate::planner::{self, MigrationPlan};
use crate::teardown::{self, DropOutcome};

/// Entry point for schema previews, migration generation and execution
/// against one configured database
pub struct Migrator {
    config: DatabaseConfig,
    schema: DeclaredSchema,
    dialect: Box<dyn Dialect>,
    connection: Arc<dyn MigrationConnection>,
    admin: Option<Arc<dyn DatabaseAdmin>>,
    prompter: Arc<dyn Prompter>,
    files: MigrationManager,
}

impl Migrator {
    /// Connect to the configured database. The administrative connection
    /// used for drops is opened on demand.
    pub async fn connect(config: DatabaseConfig, schema: DeclaredSchema) -> MigrateResult<Self> {
        let dialect = dialect_for_scheme(config.dsn.scheme())?;
        let connection: Arc<dyn MigrationConnection> = match dialect.name() {
            "postgres" => Arc::new(PgMigrationConnection::connect(&config).await?),
            other => {
                return Err(MigrateError::Connection(format!(
                    "no migration connection available for the {other} dialect"
                )))
            }
        };
        Self::with_connection(config, schema, dialect, connection)
    }

    pub fn with_connection(
        config: DatabaseConfig,
        schema: DeclaredSchema,
        dialect: Box<dyn Dialect>,
        connection: Arc<dyn MigrationConnection>,
    ) -> MigrateResult<Self> {
        let files = MigrationManager::new(config.migrations_dir.clone())?;
        Ok(Self {
            config,
            schema,
            dialect,
            connection,
            admin: None,
            prompter: Arc::new(TerminalPrompter::new()),
            files,
        })
    }

    pub fn with_admin(mut self, admin: Arc<dyn DatabaseAdmin>) -> Self {
        self.admin = Some(admin);
        self
    }

    pub fn with_prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = prompter;
        self
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn files(&self) -> &MigrationManager {
        &self.files
    }

    /// DDL for the whole declared schema, without touching the database
    /// or the migrations directory
    pub fn preview_schema(&self) -> MigrateResult<Vec<String>> {
        Ok(self
            .plan_against(&LiveSchema::new())?
            .map(|plan| plan.up_statements())
            .unwrap_or_default())
    }

    /// Write a migration creating the whole declared schema; `None` when
    /// nothing is declared
    pub fn generate_initial_migration(&self) -> MigrateResult<Option<MigrationFileSet>> {
        match self.plan_against(&LiveSchema::new())? {
            Some(plan) => self.write(&plan, "initial").map(Some),
            None => {
                tracing::info!("declared schema is empty; no initial migration written");
                Ok(None)
            }
        }
    }

    /// Diff the declared schema against the live database and write the
    /// difference as a migration; `None` when they already agree
    pub async fn generate_migration_files(&self, name: &str) -> MigrateResult<Option<MigrationFileSet>> {
        let live = self
            .connection
            .live_schema()
            .await?
            .without_table(&self.config.migrations_table);
        match self.plan_against(&live)? {
            Some(plan) => self.write(&plan, name).map(Some),
            None => {
                tracing::info!(name, "live schema matches declared schema; no migration needed");
                Ok(None)
            }
        }
    }

    pub async fn apply_pending(&self, options: ApplyOptions) -> MigrateResult<ApplyReport> {
        let migrations = self.files.load()?;
        let report = self.executor().apply_pending(&migrations, options).await?;
        tracing::info!(
            applied = report.applied.len(),
            skipped = report.skipped,
            dry_run = report.dry_run,
            execution_time_ms = report.execution_time_ms as u64,
            "migration run finished"
        );
        Ok(report)
    }

    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatusEntry>> {
        let migrations = self.files.load()?;
        self.executor().status(&migrations).await
    }

    pub async fn revert_last(&self, dry_run: bool) -> MigrateResult<RevertReport> {
        let migrations = self.files.load()?;
        self.executor().revert_last(&migrations, dry_run).await
    }

    /// Drop the configured database. `dry_run` only prints the plan;
    /// `confirm` skips the interactive confirmation.
    pub async fn drop_database(&self, dry_run: bool, confirm: bool) -> MigrateResult<DropOutcome> {
        let database = self
            .config
            .dsn
            .database_name()
            .ok_or_else(|| MigrateError::NotFound(format!("database name in {}", self.config.dsn.redacted())))?
            .to_string();

        if dry_run {
            return teardown::drop_database(&database, None, self.prompter.as_ref(), true, confirm).await;
        }

        let opened;
        let admin: Option<&dyn DatabaseAdmin> = match &self.admin {
            Some(admin) => Some(admin.as_ref()),
            None if self.dialect.name() == "postgres" => {
                opened = PgDatabaseAdmin::connect(&self.config).await?;
                Some(&opened)
            }
            None => None,
        };
        teardown::drop_database(&database, admin, self.prompter.as_ref(), false, confirm).await
    }

    pub async fn close(&self) {
        self.connection.close().await;
    }

    fn executor(&self) -> MigrationExecutor<'_> {
        MigrationExecutor::new(self.connection.as_ref(), &self.config.migrations_table)
    }

    fn plan_against(&self, live: &LiveSchema) -> MigrateResult<Option<MigrationPlan>> {
        planner::plan(&self.schema, live, self.dialect.as_ref())
    }

    fn write(&self, plan: &MigrationPlan, name: &str) -> MigrateResult<MigrationFileSet> {
        self.files
            .write_migration(name, &plan.up_statements(), &plan.down_statements())
    }
}
