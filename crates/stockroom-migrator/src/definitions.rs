//! Migration definitions
//!
//! Core types shared by the file manager, the executor and the
//! [`Migrator`](crate::Migrator) facade.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A migration loaded from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Strictly increasing version, `YYYYMMDDHHMMSS` by construction
    pub version: i64,
    /// Slug part of the file name
    pub name: String,
    pub up_sql: String,
    pub down_sql: String,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

/// A generated apply/revert file pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFileSet {
    pub version: i64,
    pub name: String,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
    /// Apply statements written to `up_path`
    pub statements: Vec<String>,
}

/// A row of the history table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Lifecycle of one migration inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Applying,
    Applied,
    /// Statements failed and the transaction was rolled back
    Failed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            MigrationState::Pending => "pending",
            MigrationState::Applying => "applying",
            MigrationState::Applied => "applied",
            MigrationState::Failed => "failed",
        };
        f.write_str(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MigrationStatus {
    Pending,
    Applied { applied_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatusEntry {
    pub version: i64,
    pub name: String,
    pub status: MigrationStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Resolve and print what would run without touching the database
    pub dry_run: bool,
}

impl ApplyOptions {
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

/// Statements a migration would execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMigration {
    pub version: i64,
    pub name: String,
    pub statements: Vec<String>,
}

/// Result of applying pending migrations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Versions committed by this call, ascending
    pub applied: Vec<i64>,
    /// Migrations found already applied
    pub skipped: usize,
    /// Pending migrations with their statements; filled for dry runs
    pub planned: Vec<PlannedMigration>,
    pub dry_run: bool,
    pub execution_time_ms: u128,
}

/// Result of reverting the newest applied migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertReport {
    /// Version reverted, or `None` when nothing was applied
    pub reverted: Option<i64>,
    pub statements: Vec<String>,
    pub dry_run: bool,
}
