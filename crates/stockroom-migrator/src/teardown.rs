//! Whole-database drop
//!
//! Kept apart from migrations. Dry runs print the plan and touch nothing.
//! Live runs ask for a yes/no answer and the database name retyped unless
//! `confirm` is set, then terminate other sessions and drop.

use serde::Serialize;
use stockroom_core::Prompter;

use crate::connection::DatabaseAdmin;
use crate::dialect::quote_literal;
use crate::error::{MigrateError, MigrateResult};

/// What a drop would execute, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropPlan {
    pub database: String,
    pub statements: Vec<String>,
}

impl DropPlan {
    pub fn for_database(database: &str) -> Self {
        Self {
            database: database.to_string(),
            statements: vec![
                format!(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                     WHERE datname = {} AND pid <> pg_backend_pid();",
                    quote_literal(database)
                ),
                format!("DROP DATABASE IF EXISTS {};", quote_identifier(database)),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DropOutcome {
    DryRun(DropPlan),
    Dropped(DropPlan),
    /// Confirmation was refused; nothing was executed
    Aborted,
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub async fn drop_database(
    database: &str,
    admin: Option<&dyn DatabaseAdmin>,
    prompter: &dyn Prompter,
    dry_run: bool,
    confirm: bool,
) -> MigrateResult<DropOutcome> {
    let plan = DropPlan::for_database(database);

    if dry_run {
        println!("Would drop database '{}':", plan.database);
        for statement in &plan.statements {
            println!("{statement}");
        }
        return Ok(DropOutcome::DryRun(plan));
    }

    if !confirm {
        let proceed = prompter.confirm(&format!(
            "Drop database '{database}'? Every table and row in it will be lost."
        ))?;
        if !proceed {
            return Ok(aborted(database, "declined"));
        }
        let typed = prompter.input(&format!("Type the database name ({database}) to confirm:"))?;
        if typed.trim() != database {
            return Ok(aborted(database, "name did not match"));
        }
    }

    let admin = admin.ok_or_else(|| {
        MigrateError::Connection("no administrative connection available for dropping databases".to_string())
    })?;

    if !admin.database_exists(database).await? {
        tracing::info!(database, "database does not exist; issuing idempotent drop");
    }
    for statement in &plan.statements {
        admin.execute(statement).await?;
    }

    tracing::warn!(database, "database dropped");
    println!("Dropped database '{database}'");
    Ok(DropOutcome::Dropped(plan))
}

fn aborted(database: &str, reason: &str) -> DropOutcome {
    tracing::warn!(database, reason, "database drop aborted");
    println!("Drop of database '{database}' aborted");
    DropOutcome::Aborted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::memory::RecordingAdmin;
    use stockroom_core::{ScriptedAnswer, ScriptedPrompter};

    #[test]
    fn test_plan_terminates_then_drops() {
        let plan = DropPlan::for_database("inventory");
        assert_eq!(
            plan.statements,
            vec![
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                 WHERE datname = 'inventory' AND pid <> pg_backend_pid();",
                "DROP DATABASE IF EXISTS \"inventory\";",
            ]
        );
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let admin = RecordingAdmin::default();
        let prompter = ScriptedPrompter::default();

        let outcome = drop_database("inventory", Some(&admin), &prompter, true, false)
            .await
            .unwrap();

        assert_eq!(outcome, DropOutcome::DryRun(DropPlan::for_database("inventory")));
        assert_eq!(*admin.calls.lock(), 0);
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_drop_runs_same_statements() {
        let admin = RecordingAdmin::default();
        let prompter = ScriptedPrompter::new([
            ScriptedAnswer::Confirm(true),
            ScriptedAnswer::Text("inventory".to_string()),
        ]);

        let outcome = drop_database("inventory", Some(&admin), &prompter, false, false)
            .await
            .unwrap();

        let plan = DropPlan::for_database("inventory");
        assert_eq!(outcome, DropOutcome::Dropped(plan.clone()));
        assert_eq!(*admin.statements.lock(), plan.statements);
        assert_eq!(prompter.asked().len(), 2);
    }

    #[tokio::test]
    async fn test_mismatched_name_aborts() {
        let admin = RecordingAdmin::default();
        let prompter = ScriptedPrompter::new([
            ScriptedAnswer::Confirm(true),
            ScriptedAnswer::Text("inventroy".to_string()),
        ]);

        let outcome = drop_database("inventory", Some(&admin), &prompter, false, false)
            .await
            .unwrap();
        assert_eq!(outcome, DropOutcome::Aborted);
        assert_eq!(*admin.calls.lock(), 0);

        let declined = ScriptedPrompter::new([ScriptedAnswer::Confirm(false)]);
        let outcome = drop_database("inventory", Some(&admin), &declined, false, false)
            .await
            .unwrap();
        assert_eq!(outcome, DropOutcome::Aborted);
    }

    #[tokio::test]
    async fn test_confirm_flag_skips_prompts() {
        let admin = RecordingAdmin::default();
        let prompter = ScriptedPrompter::default();

        let outcome = drop_database("inventory", Some(&admin), &prompter, false, true)
            .await
            .unwrap();
        assert!(matches!(outcome, DropOutcome::Dropped(_)));
        assert!(prompter.asked().is_empty());

        let err = drop_database("inventory", None, &prompter, false, true).await.unwrap_err();
        assert!(matches!(err, MigrateError::Connection(_)));
    }
}
