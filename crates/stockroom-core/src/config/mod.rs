//! Database configuration
//!
//! `DatabaseConfig` is the only configuration the registry and migrator
//! consume. Values are resolved from a declarative option table: each option
//! has a typed default, an optional YAML file value and an environment
//! override, applied in that order.

pub mod dsn;
pub mod sources;
pub mod validation;

pub use dsn::ConnectionString;
pub use sources::ConfigSource;
pub use validation::{ConfigError, ConfigResult};

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid(
                "environment",
                s,
                "development, testing, or production",
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// One configurable option: its name, environment override and default
struct OptionSpec {
    name: &'static str,
    env: &'static str,
    default: Option<&'static str>,
}

const OPTIONS: &[OptionSpec] = &[
    OptionSpec { name: "environment", env: "STOCKROOM_ENV", default: Some("development") },
    OptionSpec { name: "dsn", env: "DATABASE_URL", default: None },
    OptionSpec { name: "max_connections", env: "DB_MAX_CONNECTIONS", default: Some("10") },
    OptionSpec { name: "operation_timeout_secs", env: "DB_OPERATION_TIMEOUT_SECS", default: Some("30") },
    OptionSpec { name: "migrations_dir", env: "MIGRATIONS_DIR", default: Some("migrations") },
    OptionSpec { name: "migrations_table", env: "MIGRATIONS_TABLE", default: Some("stockroom_migrations") },
];

/// Shape of the optional YAML configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatabaseConfigFile {
    environment: Option<String>,
    dsn: Option<String>,
    max_connections: Option<u32>,
    operation_timeout_secs: Option<u64>,
    migrations_dir: Option<String>,
    migrations_table: Option<String>,
}

impl DatabaseConfigFile {
    fn value(&self, option: &str) -> Option<String> {
        match option {
            "environment" => self.environment.clone(),
            "dsn" => self.dsn.clone(),
            "max_connections" => self.max_connections.map(|v| v.to_string()),
            "operation_timeout_secs" => self.operation_timeout_secs.map(|v| v.to_string()),
            "migrations_dir" => self.migrations_dir.clone(),
            "migrations_table" => self.migrations_table.clone(),
            _ => None,
        }
    }
}

/// Database configuration with a validated connection string
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub environment: Environment,
    pub dsn: ConnectionString,
    pub max_connections: u32,
    pub operation_timeout: Duration,
    pub migrations_dir: PathBuf,
    pub migrations_table: String,
    sources: HashMap<String, ConfigSource>,
}

impl DatabaseConfig {
    /// Configuration for `dsn` with every other option at its default
    pub fn new(dsn: &str) -> ConfigResult<Self> {
        let config = Self::resolve(&DatabaseConfigFile::default(), None, Some(dsn), |_| None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from a YAML file, with environment overrides on top
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: DatabaseConfigFile = serde_yaml::from_str(&content)?;
        let config = Self::resolve(&file, Some(path), None, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an arbitrary key lookup (environment-like)
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::resolve(&DatabaseConfigFile::default(), None, None, lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn resolve<F>(
        file: &DatabaseConfigFile,
        file_path: Option<&Path>,
        explicit_dsn: Option<&str>,
        lookup: F,
    ) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values: HashMap<&'static str, String> = HashMap::new();
        let mut sources = HashMap::new();

        for option in OPTIONS {
            let resolved = if let Some(value) = lookup(option.env) {
                Some((value, ConfigSource::Environment(option.env.to_string())))
            } else if let Some(value) = file.value(option.name) {
                let path = file_path.map(Path::to_path_buf).unwrap_or_default();
                Some((value, ConfigSource::File(path)))
            } else {
                option.default.map(|value| (value.to_string(), ConfigSource::Default))
            };

            if let Some((value, source)) = resolved {
                tracing::debug!(option = option.name, source = %source, "configuration option resolved");
                values.insert(option.name, value);
                sources.insert(option.name.to_string(), source);
            }
        }

        let environment = match values.get("environment") {
            Some(value) => value.parse()?,
            None => Environment::Development,
        };

        let dsn = match (explicit_dsn, values.get("dsn")) {
            (Some(raw), _) => {
                sources.insert("dsn".to_string(), ConfigSource::Explicit);
                ConnectionString::parse(raw)?
            }
            (None, Some(value)) => ConnectionString::parse(value)?,
            (None, None) => {
                return Err(ConfigError::missing(
                    "dsn",
                    "set DATABASE_URL or the `dsn` key of the configuration file",
                ))
            }
        };

        Ok(Self {
            environment,
            dsn,
            max_connections: parse_option(&values, "max_connections", "positive integer")?,
            operation_timeout: Duration::from_secs(parse_option(
                &values,
                "operation_timeout_secs",
                "number of seconds",
            )?),
            migrations_dir: PathBuf::from(values.get("migrations_dir").cloned().unwrap_or_default()),
            migrations_table: values.get("migrations_table").cloned().unwrap_or_default(),
            sources,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validation::check_pool(self.max_connections, self.operation_timeout)?;
        validation::check_table_name("migrations_table", &self.migrations_table)?;
        validation::check_backend(self.environment, &self.dsn)
    }

    /// Where each option's value came from
    pub fn config_sources(&self) -> &HashMap<String, ConfigSource> {
        &self.sources
    }
}

fn parse_option<T: FromStr>(
    values: &HashMap<&'static str, String>,
    name: &str,
    expected: &str,
) -> ConfigResult<T> {
    let raw = values.get(name).cloned().unwrap_or_default();
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, raw, expected))
}
