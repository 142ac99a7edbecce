//! Error types for schema diffing and migration execution

use std::path::PathBuf;

use stockroom_core::{ConfigError, PromptError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrateError {
    /// Declared and live schema cannot be reconciled
    #[error("schema diff error: {0}")]
    SchemaDiff(String),

    /// A migration's statements failed; its transaction was rolled back and
    /// the batch stopped. `applied` lists versions committed before it.
    #[error("migration {version} ({name}) failed: {message}")]
    MigrationApply {
        version: i64,
        name: String,
        applied: Vec<i64>,
        message: String,
    },

    #[error("pending migration {version} is older than the latest applied migration {latest_applied}")]
    VersionConflict { version: i64, latest_applied: i64 },

    #[error("invalid migration {}: {message}", path.display())]
    InvalidMigration { path: PathBuf, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MigrateError {
    pub fn invalid_migration(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidMigration {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn schema_diff(message: impl Into<String>) -> Self {
        Self::SchemaDiff(message.into())
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                MigrateError::Connection(error.to_string())
            }
            other => MigrateError::Database(other.to_string()),
        }
    }
}

pub type MigrateResult<T> = Result<T, MigrateError>;
