use tracing::{info, warn};

use crate::error::MigrateError;
use crate::history::{
    HistoryStorage, MigrationHistory, RecordOptions, ReapplyOptions, RollbackOptions,
};
use crate::migration::{Migration, MigrationRegistry};
use crate::runner::{Executor, MigrationRunner, RunResult};

/// Applies and rolls back registered migrations, keeping the history in
/// step with what actually ran.
pub struct Migrator<E: Executor, S: HistoryStorage> {
    registry: MigrationRegistry,
    runner: MigrationRunner<E>,
    history: MigrationHistory<S>,
}

impl<E: Executor, S: HistoryStorage> Migrator<E, S> {
    pub fn new(
        registry: MigrationRegistry,
        runner: MigrationRunner<E>,
        history: MigrationHistory<S>,
    ) -> Self {
        Self {
            registry,
            runner,
            history,
        }
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn register(&mut self, migration: Migration) {
        self.registry.register(migration);
    }

    pub fn runner(&self) -> &MigrationRunner<E> {
        &self.runner
    }

    pub fn history(&self) -> &MigrationHistory<S> {
        &self.history
    }

    pub fn into_parts(self) -> (MigrationRegistry, MigrationRunner<E>, MigrationHistory<S>) {
        (self.registry, self.runner, self.history)
    }

    /// Registered migrations that are not currently applied, in
    /// registration order.
    pub async fn pending(&self) -> Result<Vec<&Migration>, MigrateError> {
        let mut pending = Vec::new();
        for migration in self.registry.all() {
            if !self.history.has_applied(migration.id()).await? {
                pending.push(migration);
            }
        }
        Ok(pending)
    }

    /// Runs a registered migration and records it. A migration that was
    /// rolled back before needs `force`.
    pub async fn apply(&mut self, id: &str, force: bool) -> Result<RunResult, MigrateError> {
        let migration = self
            .registry
            .get(id)
            .ok_or_else(|| MigrateError::NotFound(id.to_string()))?;

        if self.history.has_applied(id).await? {
            return Err(MigrateError::AlreadyApplied(id.to_string()));
        }

        let check = self
            .history
            .can_reapply(id, ReapplyOptions { force })
            .await?;
        if !check.allowed {
            return Err(MigrateError::ReapplyBlocked {
                migration: id.to_string(),
                reason: check.reason.unwrap_or_default(),
            });
        }

        let result = self.runner.apply(migration).await;
        if let Some(error) = &result.error {
            warn!(migration = %id, error = %error.message, "migration failed");
            return Err(MigrateError::Execution {
                migration: id.to_string(),
                message: error.message.clone(),
                statement_index: error.statement_index,
                executed: result.executed_statements,
                completed: Vec::new(),
            });
        }

        self.history
            .record(migration, RecordOptions { force })
            .await?;
        info!(migration = %id, statements = result.executed_statements, "applied migration");
        Ok(result)
    }

    /// Applies every pending migration in registration order, stopping at
    /// the first failure.
    pub async fn apply_pending(&mut self) -> Result<Vec<String>, MigrateError> {
        let ids: Vec<String> = self
            .pending()
            .await?
            .into_iter()
            .map(|m| m.id().to_string())
            .collect();

        let mut applied = Vec::new();
        for id in ids {
            match self.apply(&id, false).await {
                Ok(_) => applied.push(id),
                Err(MigrateError::Execution {
                    migration,
                    message,
                    statement_index,
                    executed,
                    ..
                }) => {
                    return Err(MigrateError::Execution {
                        migration,
                        message,
                        statement_index,
                        executed,
                        completed: applied,
                    })
                }
                Err(err) => return Err(err),
            }
        }
        Ok(applied)
    }

    /// Rolls back a migration. With `cascade`, migrations built on top of
    /// it are rolled back first, deepest first. Returns the rolled-back ids
    /// in the order they ran.
    pub async fn rollback(&mut self, id: &str, cascade: bool) -> Result<Vec<String>, MigrateError> {
        let check = self
            .history
            .can_rollback(id, RollbackOptions { cascade })
            .await?;
        if !check.allowed {
            return Err(MigrateError::RollbackBlocked {
                migration: id.to_string(),
                reason: check.reason.unwrap_or_default(),
                dependents: check.dependent_migrations,
            });
        }

        let mut rolled_back = Vec::new();
        for target in check.cascade_rollbacks.iter().map(String::as_str).chain([id]) {
            let migration = self
                .registry
                .get(target)
                .ok_or_else(|| MigrateError::NotFound(target.to_string()))?;

            let result = self.runner.revert(migration).await;
            if let Some(error) = &result.error {
                warn!(migration = %target, error = %error.message, "rollback failed");
                return Err(MigrateError::Execution {
                    migration: target.to_string(),
                    message: error.message.clone(),
                    statement_index: error.statement_index,
                    executed: result.executed_statements,
                    completed: rolled_back,
                });
            }

            self.history.record_rollback(target).await?;
            info!(migration = %target, "rolled back migration");
            rolled_back.push(target.to_string());
        }

        Ok(rolled_back)
    }
}
