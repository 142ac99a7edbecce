//! Migration executor
//!
//! Applies pending migrations in ascending version order, one transaction
//! per migration. The first failure rolls that migration back and stops
//! the batch.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::connection::{MigrationConnection, MigrationTransaction};
use crate::definitions::{
    ApplyOptions, ApplyReport, Migration, MigrationState, MigrationStatus, MigrationStatusEntry,
    PlannedMigration, RevertReport,
};
use crate::error::{MigrateError, MigrateResult};
use crate::files::split_sql_statements;

pub struct MigrationExecutor<'a> {
    connection: &'a dyn MigrationConnection,
    history_table: &'a str,
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(connection: &'a dyn MigrationConnection, history_table: &'a str) -> Self {
        Self {
            connection,
            history_table,
        }
    }

    /// Apply every migration not yet recorded in the history table
    pub async fn apply_pending(&self, migrations: &[Migration], options: ApplyOptions) -> MigrateResult<ApplyReport> {
        let start_time = Instant::now();

        if !options.dry_run {
            self.connection.ensure_history_table(self.history_table).await?;
        }
        let applied = self.connection.applied_migrations(self.history_table).await?;
        let applied_versions: BTreeSet<i64> = applied.iter().map(|m| m.version).collect();

        let mut pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| !applied_versions.contains(&m.version))
            .collect();
        pending.sort_by_key(|m| m.version);

        if let (Some(first), Some(&latest_applied)) = (pending.first(), applied_versions.last()) {
            if first.version < latest_applied {
                return Err(MigrateError::VersionConflict {
                    version: first.version,
                    latest_applied,
                });
            }
        }

        let planned: Vec<PlannedMigration> = pending
            .iter()
            .map(|m| PlannedMigration {
                version: m.version,
                name: m.name.clone(),
                statements: split_sql_statements(&m.up_sql),
            })
            .collect();

        if options.dry_run {
            if planned.is_empty() {
                println!("Nothing to migrate");
            }
            for migration in &planned {
                println!("Would apply migration: {} - {}", migration.version, migration.name);
                for statement in &migration.statements {
                    println!("{statement}");
                }
            }
            return Ok(ApplyReport {
                applied: Vec::new(),
                skipped: applied_versions.len(),
                planned,
                dry_run: true,
                execution_time_ms: start_time.elapsed().as_millis(),
            });
        }

        for migration in &planned {
            tracing::debug!(version = migration.version, state = %MigrationState::Pending, "queued migration");
        }

        let mut applied_now = Vec::new();
        for migration in &planned {
            println!("Applying migration: {} - {}", migration.version, migration.name);
            tracing::info!(version = migration.version, name = %migration.name, state = %MigrationState::Applying, "applying migration");
            let started = Instant::now();

            if let Err(e) = self.apply_one(migration).await {
                tracing::error!(
                    version = migration.version,
                    name = %migration.name,
                    state = %MigrationState::Failed,
                    error = %e,
                    "migration failed; batch halted"
                );
                return Err(MigrateError::MigrationApply {
                    version: migration.version,
                    name: migration.name.clone(),
                    applied: applied_now,
                    message: e.to_string(),
                });
            }

            tracing::info!(
                version = migration.version,
                state = %MigrationState::Applied,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "migration applied"
            );
            applied_now.push(migration.version);
        }

        Ok(ApplyReport {
            applied: applied_now,
            skipped: applied_versions.len(),
            planned: Vec::new(),
            dry_run: false,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn apply_one(&self, migration: &PlannedMigration) -> MigrateResult<()> {
        let mut tx = self.connection.begin().await?;
        let outcome = run_in(
            tx.as_mut(),
            &migration.statements,
            HistoryChange::Record {
                table: self.history_table,
                version: migration.version,
                name: &migration.name,
            },
        )
        .await;
        finish(tx, outcome).await
    }

    /// Run the newest applied migration's revert script and forget it
    pub async fn revert_last(&self, migrations: &[Migration], dry_run: bool) -> MigrateResult<RevertReport> {
        let applied = self.connection.applied_migrations(self.history_table).await?;
        let Some(latest) = applied.iter().max_by_key(|m| m.version) else {
            println!("No applied migrations to revert");
            return Ok(RevertReport {
                reverted: None,
                statements: Vec::new(),
                dry_run,
            });
        };

        let migration = migrations
            .iter()
            .find(|m| m.version == latest.version)
            .ok_or_else(|| {
                MigrateError::NotFound(format!(
                    "files for applied migration {} ({})",
                    latest.version, latest.name
                ))
            })?;
        let statements = split_sql_statements(&migration.down_sql);

        if dry_run {
            println!("Would revert migration: {} - {}", migration.version, migration.name);
            for statement in &statements {
                println!("{statement}");
            }
        } else {
            println!("Reverting migration: {} - {}", migration.version, migration.name);
            let mut tx = self.connection.begin().await?;
            let outcome = run_in(
                tx.as_mut(),
                &statements,
                HistoryChange::Remove {
                    table: self.history_table,
                    version: migration.version,
                },
            )
            .await;
            finish(tx, outcome).await?;
            tracing::info!(version = migration.version, name = %migration.name, "migration reverted");
        }

        Ok(RevertReport {
            reverted: Some(migration.version),
            statements,
            dry_run,
        })
    }

    /// Every known migration, on disk or in history, with its status
    pub async fn status(&self, migrations: &[Migration]) -> MigrateResult<Vec<MigrationStatusEntry>> {
        let applied = self.connection.applied_migrations(self.history_table).await?;
        let mut entries: BTreeMap<i64, MigrationStatusEntry> = migrations
            .iter()
            .map(|m| {
                (
                    m.version,
                    MigrationStatusEntry {
                        version: m.version,
                        name: m.name.clone(),
                        status: MigrationStatus::Pending,
                    },
                )
            })
            .collect();

        for record in applied {
            let entry = entries.entry(record.version).or_insert_with(|| MigrationStatusEntry {
                version: record.version,
                name: record.name.clone(),
                status: MigrationStatus::Pending,
            });
            entry.status = MigrationStatus::Applied {
                applied_at: record.applied_at,
            };
        }

        Ok(entries.into_values().collect())
    }
}

enum HistoryChange<'a> {
    Record { table: &'a str, version: i64, name: &'a str },
    Remove { table: &'a str, version: i64 },
}

async fn run_in(
    tx: &mut dyn MigrationTransaction,
    statements: &[String],
    history: HistoryChange<'_>,
) -> MigrateResult<()> {
    for statement in statements {
        tx.execute(statement).await?;
    }
    match history {
        HistoryChange::Record { table, version, name } => tx.record_applied(table, version, name).await,
        HistoryChange::Remove { table, version } => tx.remove_applied(table, version).await,
    }
}

/// Commit on success, roll back and keep the original error on failure
async fn finish(tx: Box<dyn MigrationTransaction>, outcome: MigrateResult<()>) -> MigrateResult<()> {
    match outcome {
        Ok(()) => tx.commit().await,
        Err(e) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::warn!(error = %rollback_error, "rollback failed");
            }
            Err(e)
        }
    }
}
