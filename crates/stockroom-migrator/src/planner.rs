//! Migration planner
//!
//! Diffs the declared schema against the live schema and produces the
//! statements that bring the database in line, each paired with the
//! statements that undo it. Live-only columns are never dropped.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use stockroom_core::{DeclaredSchema, LiveSchema, LiveTable, TableSchema};

use crate::dialect::Dialect;
use crate::error::{MigrateError, MigrateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    CreateEnum,
    CreateTable,
    AddColumn,
    AlterColumnType,
    AlterNullability,
    CreateIndex,
}

/// One schema change with its apply and revert statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    /// Enum or table the change applies to
    pub target: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

/// Ordered set of changes; never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    pub changes: Vec<Change>,
}

impl MigrationPlan {
    pub fn up_statements(&self) -> Vec<String> {
        self.changes.iter().flat_map(|c| c.up.iter().cloned()).collect()
    }

    /// Revert statements, last change first
    pub fn down_statements(&self) -> Vec<String> {
        self.changes
            .iter()
            .rev()
            .flat_map(|c| c.down.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Plan the changes from `live` to `declared`.
///
/// Returns `Ok(None)` when the schemas already agree.
pub fn plan(
    declared: &DeclaredSchema,
    live: &LiveSchema,
    dialect: &dyn Dialect,
) -> MigrateResult<Option<MigrationPlan>> {
    validate(declared, live)?;

    let mut changes = Vec::new();

    if dialect.supports_enums() {
        for global_enum in &declared.enums {
            if live.has_enum(&global_enum.name) {
                continue;
            }
            if let Some(up) = dialect.create_enum(global_enum) {
                changes.push(Change {
                    kind: ChangeKind::CreateEnum,
                    target: global_enum.name.clone(),
                    up: vec![up],
                    down: dialect.drop_enum(&global_enum.name).into_iter().collect(),
                });
            }
        }
    }

    let new_tables: Vec<&TableSchema> = declared
        .tables
        .iter()
        .filter(|t| live.table(&t.name).is_none())
        .collect();
    for table in creation_order(&new_tables)? {
        changes.push(create_table_change(table, dialect));
    }

    for table in &declared.tables {
        if let Some(live_table) = live.table(&table.name) {
            diff_table(table, live_table, dialect, &mut changes)?;
        }
    }

    if changes.is_empty() {
        tracing::debug!(dialect = dialect.name(), "declared schema matches live schema");
        return Ok(None);
    }
    Ok(Some(MigrationPlan { changes }))
}

fn create_table_change(table: &TableSchema, dialect: &dyn Dialect) -> Change {
    let mut up = vec![dialect.create_table(table)];
    up.extend(table.indexes.iter().map(|index| dialect.create_index(&table.name, index)));
    up.extend(table.raw_statements().map(|sql| sql.to_string()));
    Change {
        kind: ChangeKind::CreateTable,
        target: table.name.clone(),
        up,
        down: vec![dialect.drop_table(&table.name)],
    }
}

fn diff_table(
    table: &TableSchema,
    live: &LiveTable,
    dialect: &dyn Dialect,
    changes: &mut Vec<Change>,
) -> MigrateResult<()> {
    for field in &table.fields {
        let Some(column) = live.columns.get(&field.name) else {
            changes.push(Change {
                kind: ChangeKind::AddColumn,
                target: table.name.clone(),
                up: vec![dialect.add_column(&table.name, field)],
                down: vec![dialect.drop_column(&table.name, &field.name)],
            });
            continue;
        };

        let declared_type = dialect.canonical_type(field);
        if declared_type != column.data_type {
            let unsupported = || {
                MigrateError::schema_diff(format!(
                    "{} cannot change {}.{} from {} to {}",
                    dialect.name(),
                    table.name,
                    field.name,
                    column.data_type,
                    declared_type
                ))
            };
            let up = dialect
                .alter_column_type(&table.name, &field.name, &dialect.column_type(field))
                .ok_or_else(unsupported)?;
            let down = dialect
                .alter_column_type(&table.name, &field.name, &column.data_type)
                .ok_or_else(unsupported)?;
            changes.push(Change {
                kind: ChangeKind::AlterColumnType,
                target: table.name.clone(),
                up: vec![up],
                down: vec![down],
            });
        }

        if field.nullable != column.nullable {
            let unsupported = || {
                MigrateError::schema_diff(format!(
                    "{} cannot change nullability of {}.{}",
                    dialect.name(),
                    table.name,
                    field.name
                ))
            };
            let up = dialect
                .set_nullable(&table.name, &field.name, field.nullable)
                .ok_or_else(unsupported)?;
            let down = dialect
                .set_nullable(&table.name, &field.name, column.nullable)
                .ok_or_else(unsupported)?;
            changes.push(Change {
                kind: ChangeKind::AlterNullability,
                target: table.name.clone(),
                up: vec![up],
                down: vec![down],
            });
        }
    }

    for name in live.columns.keys() {
        if table.get_field(name).is_none() {
            tracing::warn!(
                table = %table.name,
                column = %name,
                "live column is not declared; leaving it in place"
            );
        }
    }

    for index in &table.indexes {
        if !live.indexes.contains(&index.name) {
            changes.push(Change {
                kind: ChangeKind::CreateIndex,
                target: table.name.clone(),
                up: vec![dialect.create_index(&table.name, index)],
                down: vec![dialect.drop_index(&index.name)],
            });
        }
    }

    Ok(())
}

fn validate(declared: &DeclaredSchema, live: &LiveSchema) -> MigrateResult<()> {
    let mut table_names = HashSet::new();
    for table in &declared.tables {
        if !table_names.insert(table.name.as_str()) {
            return Err(MigrateError::schema_diff(format!(
                "table '{}' is declared more than once",
                table.name
            )));
        }

        let mut field_names = HashSet::new();
        for field in &table.fields {
            if !field_names.insert(field.name.as_str()) {
                return Err(MigrateError::schema_diff(format!(
                    "field '{}' is declared more than once in table '{}'",
                    field.name, table.name
                )));
            }
            if let Some(enum_name) = field.field_type.enum_name() {
                if declared.enum_def(enum_name).is_none() {
                    return Err(MigrateError::schema_diff(format!(
                        "{}.{} references undeclared enum '{}'",
                        table.name, field.name, enum_name
                    )));
                }
            }
        }

        for column in table.primary_key_columns() {
            if !field_names.contains(column) {
                return Err(MigrateError::schema_diff(format!(
                    "primary key of '{}' names unknown column '{}'",
                    table.name, column
                )));
            }
        }

        for index in &table.indexes {
            if let Some(column) = index.columns.iter().find(|c| !field_names.contains(c.as_str())) {
                return Err(MigrateError::schema_diff(format!(
                    "index '{}' on '{}' names unknown column '{}'",
                    index.name, table.name, column
                )));
            }
        }
    }

    for table in &declared.tables {
        for referenced in table.referenced_tables() {
            if !table_names.contains(referenced) && live.table(referenced).is_none() {
                return Err(MigrateError::schema_diff(format!(
                    "'{}' references unknown table '{}'",
                    table.name, referenced
                )));
            }
        }
    }

    Ok(())
}

/// Referenced tables before the tables that reference them; otherwise
/// declaration order. Only dependencies among `tables` are considered.
fn creation_order<'a>(tables: &[&'a TableSchema]) -> MigrateResult<Vec<&'a TableSchema>> {
    let names: BTreeSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    let mut pending: BTreeMap<&str, Vec<&str>> = tables
        .iter()
        .map(|t| {
            let deps = t
                .referenced_tables()
                .into_iter()
                // A self-reference is satisfied inline by CREATE TABLE
                .filter(|r| *r != t.name && names.contains(r))
                .collect();
            (t.name.as_str(), deps)
        })
        .collect();

    let mut ordered: Vec<&'a TableSchema> = Vec::with_capacity(tables.len());
    while ordered.len() < tables.len() {
        let ready = tables.iter().find(|t| {
            pending
                .get(t.name.as_str())
                .is_some_and(|deps| deps.iter().all(|d| !pending.contains_key(d)))
        });
        let Some(table) = ready else {
            let cycle: Vec<&str> = pending.keys().copied().collect();
            return Err(MigrateError::schema_diff(format!(
                "foreign keys form a cycle among new tables: {}",
                cycle.join(", ")
            )));
        };
        pending.remove(table.name.as_str());
        ordered.push(*table);
    }
    Ok(ordered)
}
