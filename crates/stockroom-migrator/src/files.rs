//! Migration files
//!
//! Writes and loads `<version>_<slug>.up.sql` / `<version>_<slug>.down.sql`
//! pairs and splits their contents into executable statements.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use parking_lot::Mutex;
use regex::Regex;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

use crate::definitions::{Migration, MigrationFileSet};
use crate::error::{MigrateError, MigrateResult};

/// Compiled file-name and slug patterns
#[derive(Debug)]
struct Patterns {
    file: Regex,
    slug_separator: Regex,
}

impl Patterns {
    fn compile() -> MigrateResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                MigrateError::invalid_migration(PathBuf::new(), format!("invalid pattern {pattern}: {e}"))
            })
        };
        Ok(Self {
            file: compile(r"^(\d+)_([a-z0-9_]+)\.(up|down)\.sql$")?,
            slug_separator: compile(r"[^a-z0-9]+")?,
        })
    }

    /// Lower-case name with runs of other characters collapsed to `_`
    fn slugify(&self, name: &str) -> String {
        let lowered = name.to_lowercase();
        let slug = self.slug_separator.replace_all(&lowered, "_");
        let slug = slug.trim_matches('_');
        if slug.is_empty() {
            "migration".to_string()
        } else {
            slug.to_string()
        }
    }
}

/// `YYYYMMDDHHMMSS` as a number
pub fn timestamp_version(now: DateTime<Utc>) -> i64 {
    i64::from(now.year()) * 10_000_000_000
        + i64::from(now.month()) * 100_000_000
        + i64::from(now.day()) * 1_000_000
        + i64::from(now.hour()) * 10_000
        + i64::from(now.minute()) * 100
        + i64::from(now.second())
}

/// Issues strictly increasing versions even when several are generated
/// within the same second.
#[derive(Debug, Default)]
pub struct VersionClock {
    last: Mutex<Option<i64>>,
}

impl VersionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max(now, last issued + 1, newest on disk + 1)`
    pub fn next(&self, now: DateTime<Utc>, newest_on_disk: Option<i64>) -> i64 {
        let mut last = self.last.lock();
        let mut version = timestamp_version(now);
        for floor in [*last, newest_on_disk].into_iter().flatten() {
            version = version.max(floor + 1);
        }
        *last = Some(version);
        version
    }
}

/// Creates and loads migration file pairs in one directory
#[derive(Debug)]
pub struct MigrationManager {
    dir: PathBuf,
    clock: VersionClock,
    patterns: Patterns,
}

impl MigrationManager {
    pub fn new(dir: impl Into<PathBuf>) -> MigrateResult<Self> {
        Ok(Self {
            dir: dir.into(),
            clock: VersionClock::new(),
            patterns: Patterns::compile()?,
        })
    }

    pub fn slugify(&self, name: &str) -> String {
        self.patterns.slugify(name)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a new apply/revert pair and return what was written
    pub fn write_migration(
        &self,
        name: &str,
        up: &[String],
        down: &[String],
    ) -> MigrateResult<MigrationFileSet> {
        self.write_migration_at(name, up, down, Utc::now())
    }

    pub(crate) fn write_migration_at(
        &self,
        name: &str,
        up: &[String],
        down: &[String],
        now: DateTime<Utc>,
    ) -> MigrateResult<MigrationFileSet> {
        fs::create_dir_all(&self.dir)?;

        let newest_on_disk = self.scan()?.keys().next_back().copied();
        let version = self.clock.next(now, newest_on_disk);
        let slug = self.slugify(name);

        let up_path = self.dir.join(format!("{version}_{slug}.up.sql"));
        let down_path = self.dir.join(format!("{version}_{slug}.down.sql"));

        fs::write(&up_path, render_file(&slug, version, "up", now, up))?;
        fs::write(&down_path, render_file(&slug, version, "down", now, down))?;

        tracing::info!(
            version,
            name = %slug,
            statements = up.len(),
            path = %up_path.display(),
            "wrote migration files"
        );

        Ok(MigrationFileSet {
            version,
            name: slug,
            up_path,
            down_path,
            statements: up.to_vec(),
        })
    }

    /// All migrations on disk, ascending by version
    pub fn load(&self) -> MigrateResult<Vec<Migration>> {
        let mut migrations = Vec::new();
        for (version, pair) in self.scan()? {
            let (Some(up_path), Some(down_path)) = (pair.up, pair.down) else {
                let present = pair.any_path;
                return Err(MigrateError::invalid_migration(
                    present,
                    format!("migration {version} is missing its up or down file"),
                ));
            };
            migrations.push(Migration {
                version,
                name: pair.name,
                up_sql: fs::read_to_string(&up_path)?,
                down_sql: fs::read_to_string(&down_path)?,
                up_path,
                down_path,
            });
        }
        tracing::debug!(count = migrations.len(), dir = %self.dir.display(), "loaded migrations");
        Ok(migrations)
    }

    fn scan(&self) -> MigrateResult<BTreeMap<i64, FilePair>> {
        let mut pairs: BTreeMap<i64, FilePair> = BTreeMap::new();
        if !self.dir.exists() {
            return Ok(pairs);
        }

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| MigrateError::invalid_migration(&path, "file name is not valid UTF-8"))?;
            let captures = self.patterns.file.captures(file_name).ok_or_else(|| {
                MigrateError::invalid_migration(&path, "expected <version>_<name>.up.sql or .down.sql")
            })?;
            let version: i64 = captures[1]
                .parse()
                .map_err(|_| MigrateError::invalid_migration(&path, "version does not fit in 64 bits"))?;
            let name = captures[2].to_string();
            let is_up = &captures[3] == "up";

            let pair = pairs.entry(version).or_insert_with(|| FilePair {
                name: name.clone(),
                up: None,
                down: None,
                any_path: path.clone(),
            });
            if pair.name != name {
                return Err(MigrateError::invalid_migration(
                    &path,
                    format!("version {version} is also used by '{}'", pair.name),
                ));
            }
            if is_up {
                pair.up = Some(path);
            } else {
                pair.down = Some(path);
            }
        }
        Ok(pairs)
    }
}

struct FilePair {
    name: String,
    up: Option<PathBuf>,
    down: Option<PathBuf>,
    any_path: PathBuf,
}

fn render_file(name: &str, version: i64, direction: &str, now: DateTime<Utc>, statements: &[String]) -> String {
    let mut content = format!(
        "-- Migration: {}\n-- Version: {}\n-- Direction: {}\n-- Generated: {}\n\n",
        name,
        version,
        direction,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );
    content.push_str(&statements.join("\n\n"));
    content.push('\n');
    content
}

/// Split a script into statements, each terminated by `;`.
///
/// Semicolons inside literals, quoted identifiers and comments do not end a
/// statement. Fragments consisting only of comments are dropped. Falls back
/// to naive splitting when the script cannot be tokenized.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let tokens = match Tokenizer::new(&PostgreSqlDialect {}, sql)
        .with_unescape(false)
        .tokenize()
    {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("SQL tokenizing failed, using naive semicolon splitting: {}", e);
            return sql
                .split(';')
                .map(strip_comment_lines)
                .filter(|s| !s.is_empty())
                .map(|s| format!("{s};"))
                .collect();
        }
    };

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    for token in tokens {
        match &token {
            Token::SemiColon => {
                if has_code {
                    statements.push(format!("{};", current.trim()));
                }
                current.clear();
                has_code = false;
            }
            Token::Whitespace(Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_)) => {
                // Leading comments belong to no statement
                if has_code {
                    current.push_str(&token.to_string());
                }
            }
            Token::Whitespace(_) => {
                if has_code {
                    current.push_str(&token.to_string());
                }
            }
            _ => {
                has_code = true;
                current.push_str(&token.to_string());
            }
        }
    }
    if has_code {
        statements.push(format!("{};", current.trim()));
    }
    statements
}

fn strip_comment_lines(fragment: &str) -> String {
    fragment
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
