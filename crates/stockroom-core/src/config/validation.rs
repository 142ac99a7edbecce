use std::time::Duration;

use thiserror::Error;

use super::dsn::ConnectionString;
use super::Environment;

/// Errors raised while resolving or checking database configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("option '{option}' is not set; {hint}")]
    Missing { option: String, hint: String },

    #[error("option '{option}' has invalid value '{value}', expected {expected}")]
    Invalid {
        option: String,
        value: String,
        expected: String,
    },

    #[error("configuration rejected: {reason}")]
    Rejected { reason: String },

    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn missing(option: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Missing {
            option: option.into(),
            hint: hint.into(),
        }
    }

    pub fn invalid(option: impl Into<String>, value: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::Invalid {
            option: option.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected { reason: reason.into() }
    }

    /// Option the error refers to, if any
    pub fn option(&self) -> Option<&str> {
        match self {
            Self::Missing { option, .. } | Self::Invalid { option, .. } => Some(option),
            _ => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub(crate) fn check_pool(max_connections: u32, operation_timeout: Duration) -> ConfigResult<()> {
    if max_connections == 0 {
        return Err(ConfigError::invalid("max_connections", "0", "at least one connection"));
    }
    if operation_timeout.is_zero() {
        return Err(ConfigError::invalid(
            "operation_timeout_secs",
            "0",
            "a timeout greater than zero",
        ));
    }
    Ok(())
}

/// The history table name is interpolated into DDL, so it must be a plain identifier
pub(crate) fn check_table_name(option: &str, name: &str) -> ConfigResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::invalid(option, name, "a SQL identifier ([A-Za-z_][A-Za-z0-9_]*)"))
    }
}

pub(crate) fn check_backend(environment: Environment, dsn: &ConnectionString) -> ConfigResult<()> {
    if environment.is_production() && dsn.scheme() == "memory" {
        return Err(ConfigError::rejected("the in-memory backend cannot be used in production"));
    }
    Ok(())
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("stockroom_migrations"));
        assert!(is_identifier("_history2"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier("drop table;"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_pool_limits() {
        assert!(check_pool(1, Duration::from_secs(1)).is_ok());
        let err = check_pool(0, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.option(), Some("max_connections"));
        let err = check_pool(4, Duration::ZERO).unwrap_err();
        assert_eq!(err.option(), Some("operation_timeout_secs"));
    }
}
