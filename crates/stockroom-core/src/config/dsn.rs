//! Connection string parsing
//!
//! A connection string has the shape `<scheme>://<backend-specific-rest>`.
//! The scheme selects a registry backend and a SQL dialect; the rest is
//! interpreted by the backend. Everything is validated up front so that a
//! malformed DSN is rejected before any resource is opened.

use std::fmt;
use std::str::FromStr;

use url::Url;

use super::validation::{ConfigError, ConfigResult};

const EXPECTED_SHAPE: &str = "<scheme>://<location>, e.g. postgres://user@localhost/inventory";

/// Validated `<scheme>://...` connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    raw: String,
    scheme: String,
    url: Url,
}

impl ConnectionString {
    /// Parse and validate a connection string
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let raw = raw.trim();
        let (scheme, _) = raw
            .split_once("://")
            .ok_or_else(|| ConfigError::invalid("dsn", redact_raw(raw), EXPECTED_SHAPE))?;

        if !is_valid_scheme(scheme) {
            return Err(ConfigError::invalid(
                "dsn",
                redact_raw(raw),
                "a scheme starting with a letter and containing only letters, digits, '+', '-' or '.'",
            ));
        }

        let url = Url::parse(raw).map_err(|e| {
            ConfigError::invalid("dsn", redact_raw(raw), format!("a well-formed URL ({})", e))
        })?;

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_ascii_lowercase(),
            url,
        })
    }

    /// Lower-cased scheme, the token before `://`
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The connection string exactly as supplied
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Database name taken from the first path segment, if any
    pub fn database_name(&self) -> Option<&str> {
        self.url
            .path()
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|name| !name.is_empty())
    }

    /// Same location pointing at another database on the same server
    pub fn with_database(&self, database: &str) -> ConfigResult<Self> {
        let mut url = self.url.clone();
        url.set_path(&format!("/{}", database));
        Self::parse(url.as_str())
    }

    /// Connection string with the password masked, safe for logs
    pub fn redacted(&self) -> String {
        if self.url.password().is_none() {
            return self.raw.clone();
        }
        let mut url = self.url.clone();
        if url.set_password(Some("***")).is_err() {
            return format!("{}://***", self.scheme);
        }
        url.to_string()
    }
}

impl FromStr for ConnectionString {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// Errors may echo the input, so never include what looks like credentials.
fn redact_raw(raw: &str) -> String {
    match (raw.split_once("://"), raw.rfind('@')) {
        (Some((scheme, _)), Some(_)) => format!("{}://***", scheme),
        _ => raw.to_string(),
    }
}
