use std::fmt;
use std::path::PathBuf;

/// Where a resolved option's value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Environment variable override
    Environment(String),
    /// Key of the YAML configuration file
    File(PathBuf),
    /// Built-in default
    Default,
    /// Passed directly to the constructor
    Explicit,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Environment(var) => write!(f, "env {var}"),
            ConfigSource::File(path) => write!(f, "file {}", path.display()),
            ConfigSource::Default => f.write_str("default"),
            ConfigSource::Explicit => f.write_str("explicit"),
        }
    }
}
