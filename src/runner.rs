use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::migration::Migration;

/// A live database connection, as far as the runner is concerned.
#[async_trait]
pub trait Executor: Send {
    async fn execute(&mut self, sql: &str) -> anyhow::Result<()>;
    async fn begin_transaction(&mut self) -> anyhow::Result<()>;
    async fn commit(&mut self) -> anyhow::Result<()>;
    async fn rollback(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerOptions {
    /// Wrap each run in `begin_transaction` / `commit`.
    pub use_transactions: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            use_transactions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub message: String,
    /// Index of the failing statement. `None` when the failure came from
    /// transaction control rather than a statement.
    pub statement_index: Option<usize>,
}

/// Outcome of running one migration's statements. Failures are reported
/// here, never as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub migration_id: String,
    /// Statements that completed before any failure.
    pub executed_statements: usize,
    pub execution_time_ms: u64,
    pub error: Option<ExecutionFailure>,
}

pub type RollbackResult = RunResult;

pub struct MigrationRunner<E: Executor> {
    executor: E,
    options: RunnerOptions,
}

impl<E: Executor> MigrationRunner<E> {
    pub fn new(executor: E, options: RunnerOptions) -> Self {
        Self { executor, options }
    }

    pub fn options(&self) -> RunnerOptions {
        self.options
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Executes `statements` for `migration` in order.
    pub async fn run(&mut self, migration: &Migration, statements: &[String]) -> RunResult {
        self.execute(migration, statements, "apply").await
    }

    /// Executes rollback `statements` for `migration` in the order given.
    pub async fn rollback(
        &mut self,
        migration: &Migration,
        statements: &[String],
    ) -> RollbackResult {
        self.execute(migration, statements, "rollback").await
    }

    /// Runs the migration's own forward statements.
    pub async fn apply(&mut self, migration: &Migration) -> RunResult {
        self.run(migration, migration.up()).await
    }

    /// Runs the migration's own rollback statements.
    pub async fn revert(&mut self, migration: &Migration) -> RollbackResult {
        self.rollback(migration, migration.down()).await
    }

    async fn execute(
        &mut self,
        migration: &Migration,
        statements: &[String],
        direction: &'static str,
    ) -> RunResult {
        let started = Instant::now();
        let id = migration.id();
        let transactional = self.options.use_transactions;

        if transactional && !migration.dialect().backend().supports_transactional_ddl() {
            warn!(
                migration = %id,
                dialect = %migration.dialect(),
                "dialect commits DDL implicitly; the transaction will not make this run atomic"
            );
        }

        debug!(migration = %id, direction, statements = statements.len(), transactional, "running migration");

        let finish = |executed: usize, error: Option<ExecutionFailure>| RunResult {
            success: error.is_none(),
            migration_id: id.to_string(),
            executed_statements: executed,
            execution_time_ms: started.elapsed().as_millis() as u64,
            error,
        };

        if transactional {
            if let Err(err) = self.executor.begin_transaction().await {
                warn!(migration = %id, error = %format!("{:#}", err), "failed to begin transaction");
                return finish(
                    0,
                    Some(ExecutionFailure {
                        message: format!("begin transaction: {:#}", err),
                        statement_index: None,
                    }),
                );
            }
        }

        let mut executed = 0;
        for (index, sql) in statements.iter().enumerate() {
            if let Err(err) = self.executor.execute(sql).await {
                let message = format!("{:#}", err);
                warn!(migration = %id, direction, statement = index, error = %message, "statement failed");
                if transactional {
                    self.abort(id).await;
                }
                return finish(
                    executed,
                    Some(ExecutionFailure {
                        message,
                        statement_index: Some(index),
                    }),
                );
            }
            executed += 1;
        }

        if transactional {
            if let Err(err) = self.executor.commit().await {
                let message = format!("commit: {:#}", err);
                warn!(migration = %id, direction, error = %message, "commit failed");
                self.abort(id).await;
                return finish(
                    executed,
                    Some(ExecutionFailure {
                        message,
                        statement_index: None,
                    }),
                );
            }
        }

        let result = finish(executed, None);
        info!(
            migration = %id,
            direction,
            statements = executed,
            elapsed_ms = result.execution_time_ms,
            "migration finished"
        );
        result
    }

    async fn abort(&mut self, id: &str) {
        if let Err(err) = self.executor.rollback().await {
            warn!(migration = %id, error = %format!("{:#}", err), "transaction rollback failed");
        }
    }
}

pub fn create_migration_runner<E: Executor>(
    executor: E,
    options: RunnerOptions,
) -> MigrationRunner<E> {
    MigrationRunner::new(executor, options)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::Dialect;
    use crate::migration::MigrationBuilder;
    use anyhow::bail;

    /// Records every call; fails the statement containing `fail_on` and,
    /// optionally, the commit.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingExecutor {
        pub calls: Vec<String>,
        pub fail_on: Option<String>,
        pub fail_commit: bool,
    }

    impl RecordingExecutor {
        pub fn failing_on(fragment: &str) -> Self {
            Self {
                fail_on: Some(fragment.to_string()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        async fn execute(&mut self, sql: &str) -> anyhow::Result<()> {
            if self.fail_on.as_deref().is_some_and(|f| sql.contains(f)) {
                bail!("syntax error near {:?}", sql);
            }
            self.calls.push(sql.to_string());
            Ok(())
        }

        async fn begin_transaction(&mut self) -> anyhow::Result<()> {
            self.calls.push("BEGIN".to_string());
            Ok(())
        }

        async fn commit(&mut self) -> anyhow::Result<()> {
            if self.fail_commit {
                bail!("connection reset");
            }
            self.calls.push("COMMIT".to_string());
            Ok(())
        }

        async fn rollback(&mut self) -> anyhow::Result<()> {
            self.calls.push("ROLLBACK".to_string());
            Ok(())
        }
    }

    fn migration(dialect: Dialect, up: &[&str]) -> Migration {
        let up = up.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let down = vec!["DROP 2".to_string(), "DROP 1".to_string()];
        MigrationBuilder::from_sql("t", dialect, up, down)
            .id("0001_test")
            .build()
    }

    #[test]
    fn options_default_to_transactions() {
        assert!(RunnerOptions::default().use_transactions);
        let options: RunnerOptions = serde_json::from_str("{}").unwrap();
        assert!(options.use_transactions);
    }

    #[tokio::test]
    async fn runs_statements_in_a_transaction() {
        let mut runner = create_migration_runner(RecordingExecutor::default(), RunnerOptions::default());
        let m = migration(Dialect::Postgres, &["S1", "S2"]);

        let result = runner.apply(&m).await;

        assert!(result.success);
        assert_eq!(result.migration_id, "0001_test");
        assert_eq!(result.executed_statements, 2);
        assert!(result.error.is_none());
        assert_eq!(runner.executor().calls, vec!["BEGIN", "S1", "S2", "COMMIT"]);
    }

    #[tokio::test]
    async fn failure_rolls_back_and_reports_index() {
        let mut runner = create_migration_runner(
            RecordingExecutor::failing_on("S2"),
            RunnerOptions::default(),
        );
        let m = migration(Dialect::Postgres, &["S1", "S2", "S3"]);

        let result = runner.apply(&m).await;

        assert!(!result.success);
        assert_eq!(result.executed_statements, 1);
        let error = result.error.unwrap();
        assert_eq!(error.statement_index, Some(1));
        assert!(error.message.contains("syntax error"));
        assert_eq!(runner.executor().calls, vec!["BEGIN", "S1", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn failure_without_transactions_stops_immediately() {
        let mut runner = create_migration_runner(
            RecordingExecutor::failing_on("S2"),
            RunnerOptions {
                use_transactions: false,
            },
        );
        let m = migration(Dialect::MySql, &["S1", "S2", "S3"]);

        let result = runner.apply(&m).await;

        assert!(!result.success);
        assert_eq!(result.executed_statements, 1);
        assert_eq!(result.error.unwrap().statement_index, Some(1));
        assert_eq!(runner.executor().calls, vec!["S1"]);
    }

    #[tokio::test]
    async fn commit_failure_is_reported_without_index() {
        let executor = RecordingExecutor {
            fail_commit: true,
            ..RecordingExecutor::default()
        };
        let mut runner = create_migration_runner(executor, RunnerOptions::default());
        let m = migration(Dialect::Sqlite, &["S1"]);

        let result = runner.apply(&m).await;

        assert!(!result.success);
        assert_eq!(result.executed_statements, 1);
        let error = result.error.unwrap();
        assert_eq!(error.statement_index, None);
        assert!(error.message.starts_with("commit"));
        assert_eq!(runner.executor().calls, vec!["BEGIN", "S1", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn rollback_runs_given_order() {
        let mut runner = create_migration_runner(RecordingExecutor::default(), RunnerOptions::default());
        let m = migration(Dialect::Postgres, &["S1"]);

        let result = runner.revert(&m).await;

        assert!(result.success);
        assert_eq!(result.executed_statements, 2);
        assert_eq!(
            runner.into_executor().calls,
            vec!["BEGIN", "DROP 2", "DROP 1", "COMMIT"]
        );
    }

    #[tokio::test]
    async fn empty_statement_list_succeeds() {
        let mut runner = create_migration_runner(RecordingExecutor::default(), RunnerOptions::default());
        let m = migration(Dialect::Postgres, &[]);

        let result = runner.run(&m, &[]).await;

        assert!(result.success);
        assert_eq!(result.executed_statements, 0);
    }
}
