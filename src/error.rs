use thiserror::Error;

/// Errors raised while turning a diff into SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("{dialect} does not support {change}")]
    UnsupportedChange {
        dialect: &'static str,
        change: String,
    },

    #[error("{dialect} has no column type for {type_name}")]
    UnsupportedType {
        dialect: &'static str,
        type_name: String,
    },

    #[error("directive {0} has no DDL representation")]
    UnsupportedDirective(String),

    #[error("invalid value for directive {directive}: {reason}")]
    InvalidDirective { directive: String, reason: String },
}

/// Errors surfaced by a history storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history storage error: {0}")]
    Storage(String),
}

/// Errors raised by the [`Migrator`](crate::migrator::Migrator) when it
/// refuses or fails to change the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrateError {
    #[error("migration not found: {0}")]
    NotFound(String),

    #[error("migration {0} is already applied")]
    AlreadyApplied(String),

    #[error("migration {migration} cannot be reapplied: {reason}")]
    ReapplyBlocked { migration: String, reason: String },

    #[error("migration {migration} cannot be rolled back: {reason}")]
    RollbackBlocked {
        migration: String,
        reason: String,
        dependents: Vec<String>,
    },

    #[error("migration {migration} failed after {executed} statement(s): {message}")]
    Execution {
        migration: String,
        message: String,
        statement_index: Option<usize>,
        executed: usize,
        /// Migrations completed earlier in the same call.
        completed: Vec<String>,
    },

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    History(#[from] HistoryError),
}
