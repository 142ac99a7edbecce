//! Error types for the registry
//!
//! Backend failures are wrapped with the entity type and operation they
//! happened in; nothing is swallowed.

use std::time::Duration;

use stockroom_core::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// Record absent, or hidden by the view's owner filter
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} '{id}' already exists")]
    AlreadyExists { entity: &'static str, id: String },

    /// No resolvable caller identity where one is required
    #[error("authorization error: {0}")]
    Authorization(String),

    #[error("cannot delete {entity} '{id}': {children} dependent record(s) in relationship '{relation}'")]
    CascadeViolation {
        entity: &'static str,
        id: String,
        relation: String,
        children: usize,
    },

    #[error("backend '{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("no backend registered for scheme '{0}'")]
    UnknownBackend(String),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(#[from] ConfigError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{operation} on {entity} cancelled after {timeout:?}")]
    Cancelled {
        entity: &'static str,
        operation: &'static str,
        timeout: Duration,
    },

    #[error("storage error during {operation} on {entity}: {message}")]
    Storage {
        entity: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(entity: &'static str, operation: &'static str, message: impl ToString) -> Self {
        Self::Storage {
            entity,
            operation,
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    pub fn is_cascade_violation(&self) -> bool {
        matches!(self, RegistryError::CascadeViolation { .. })
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
