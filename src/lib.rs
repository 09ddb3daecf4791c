pub mod backend;
pub mod classify;
pub mod diff;
pub mod error;
pub mod field;
pub mod generator;
pub mod history;
pub mod migration;
pub mod migrator;
pub mod operation;
pub mod runner;
pub mod schema;
pub mod version;

pub mod prelude {
    pub use crate::backend::{Backend, ClickHouse, Dialect, DuckDb, MySql, Postgres, Sqlite};
    pub use crate::classify::{is_narrowing, is_nullability_narrowing};
    pub use crate::diff::{diff, diff_with_renames, FieldRename, SchemaChange, SchemaDiff};
    pub use crate::error::{GenerateError, HistoryError, MigrateError};
    pub use crate::field::{FieldDefinition, FieldType, Modifier};
    pub use crate::generator::{
        create_migration_generator, generate_migration, GeneratorOptions, MigrationGenerator,
    };
    pub use crate::history::{
        create_migration_history, HistoryStorage, InMemoryHistoryStorage, MigrationHistory,
        MigrationRecord, MigrationState, ReapplyCheck, ReapplyOptions, RecordOptions,
        RollbackCheck, RollbackOptions, RollbackRecord,
    };
    pub use crate::migration::{Migration, MigrationBuilder, MigrationRegistry};
    pub use crate::migrator::Migrator;
    pub use crate::operation::MigrationOperation;
    pub use crate::runner::{
        create_migration_runner, ExecutionFailure, Executor, MigrationRunner, RollbackResult,
        RunResult, RunnerOptions,
    };
    pub use crate::schema::{RelationDef, RelationKind, SchemaSnapshot};
    pub use crate::version::SchemaVersion;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::runner::tests::RecordingExecutor;

    fn users_v1() -> SchemaSnapshot {
        SchemaSnapshot::new("users", 1)
            .field(FieldDefinition::new("id", "uuid").required())
            .field(FieldDefinition::new("name", "string"))
    }

    fn users_v2() -> SchemaSnapshot {
        SchemaSnapshot::new("users", 2)
            .field(FieldDefinition::new("id", "uuid").required())
            .field(FieldDefinition::new("name", "string"))
            .field(FieldDefinition::new("email", "string").required())
    }

    #[tokio::test]
    async fn full_migration_workflow() {
        let diff = diff(&users_v1(), &users_v2());
        assert_eq!(diff.changes.len(), 1);
        assert!(!diff.is_breaking);

        let statements =
            generate_migration(&diff, "postgres", GeneratorOptions::default()).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("ADD COLUMN \"email\""));
        assert!(statements[0].contains("NOT NULL"));

        let generator = create_migration_generator("postgres", GeneratorOptions::default()).unwrap();
        let migration = MigrationBuilder::from_diff(&diff, &generator)
            .unwrap()
            .id("0002_add_email")
            .build();

        let mut runner = create_migration_runner(RecordingExecutor::default(), RunnerOptions::default());
        let mut history = create_migration_history(InMemoryHistoryStorage::new());

        let result = runner.apply(&migration).await;
        assert!(result.success);
        assert_eq!(result.executed_statements, 1);
        history
            .record(&migration, RecordOptions::default())
            .await
            .unwrap();
        assert!(history.has_applied("0002_add_email").await.unwrap());
        assert_eq!(
            history.get_current_version().await.unwrap(),
            SchemaVersion::new(2, 0, 0)
        );

        let check = history
            .can_rollback("0002_add_email", RollbackOptions::default())
            .await
            .unwrap();
        assert!(check.allowed);

        let result = runner.revert(&migration).await;
        assert!(result.success);
        history.record_rollback("0002_add_email").await.unwrap();

        assert!(!history.has_applied("0002_add_email").await.unwrap());
        assert!(history.was_rolled_back("0002_add_email").await.unwrap());

        let calls = runner.into_executor().calls;
        assert!(calls.iter().any(|s| s.contains("ADD COLUMN \"email\"")));
        assert!(calls.iter().any(|s| s.contains("DROP COLUMN \"email\"")));
    }

    #[tokio::test]
    async fn migrator_workflow_across_versions() {
        let v3 = SchemaSnapshot::new("users", 3)
            .field(FieldDefinition::new("id", "uuid").required())
            .field(FieldDefinition::new("name", "string").indexed())
            .field(FieldDefinition::new("email", "string").required());

        let generator = create_migration_generator("mysql", GeneratorOptions::default()).unwrap();
        let mut registry = MigrationRegistry::new();
        registry.register(
            MigrationBuilder::from_diff(&diff(&users_v1(), &users_v2()), &generator)
                .unwrap()
                .id("0002_add_email")
                .build(),
        );
        registry.register(
            MigrationBuilder::from_diff(&diff(&users_v2(), &v3), &generator)
                .unwrap()
                .id("0003_index_name")
                .build(),
        );

        let mut migrator = Migrator::new(
            registry,
            create_migration_runner(
                RecordingExecutor::default(),
                RunnerOptions {
                    use_transactions: false,
                },
            ),
            create_migration_history(InMemoryHistoryStorage::new()),
        );

        let applied = migrator.apply_pending().await.unwrap();
        assert_eq!(applied, vec!["0002_add_email", "0003_index_name"]);
        assert!(migrator.pending().await.unwrap().is_empty());

        let err = migrator.rollback("0002_add_email", false).await.unwrap_err();
        assert!(matches!(err, MigrateError::RollbackBlocked { .. }));

        let rolled_back = migrator.rollback("0002_add_email", true).await.unwrap();
        assert_eq!(rolled_back, vec!["0003_index_name", "0002_add_email"]);

        let calls = &migrator.runner().executor().calls;
        assert!(calls[1].contains("CREATE INDEX `ix_users_name`"));
        assert!(calls[2].contains("DROP INDEX `ix_users_name`"));
        assert!(calls[3].contains("DROP COLUMN `email`"));
    }
}
