use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{Backend, Dialect};
use crate::diff::SchemaDiff;
use crate::error::GenerateError;
use crate::operation::MigrationOperation;

/// Formatting knobs applied to every rendered statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Quote table, column and index names. Turning this off only makes
    /// sense for identifiers that need no quoting.
    pub quote_identifiers: bool,
    /// Terminate each statement with `;`.
    pub semicolons: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            quote_identifiers: true,
            semicolons: false,
        }
    }
}

/// Turns a [`SchemaDiff`] into SQL for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct MigrationGenerator {
    dialect: Dialect,
    options: GeneratorOptions,
}

impl MigrationGenerator {
    pub fn new(dialect: Dialect, options: GeneratorOptions) -> Self {
        Self { dialect, options }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn options(&self) -> GeneratorOptions {
        self.options
    }

    pub fn backend(&self) -> &'static dyn Backend {
        self.dialect.backend()
    }

    /// Operations applying `diff`, in execution order.
    pub fn operations(&self, diff: &SchemaDiff) -> Result<Vec<MigrationOperation>, GenerateError> {
        let mut ops = Vec::new();
        for change in &diff.changes {
            ops.extend(change.forward_operations(&diff.schema_name)?);
        }
        Ok(ops)
    }

    /// Operations undoing `diff`: changes are undone last to first.
    pub fn rollback_operations(
        &self,
        diff: &SchemaDiff,
    ) -> Result<Vec<MigrationOperation>, GenerateError> {
        let mut ops = Vec::new();
        for change in diff.changes.iter().rev() {
            ops.extend(change.backward_operations(&diff.schema_name)?);
        }
        Ok(ops)
    }

    pub fn generate(&self, diff: &SchemaDiff) -> Result<Vec<String>, GenerateError> {
        if diff.is_empty() {
            debug!(schema = %diff.schema_name, "diff is empty, nothing to generate");
            return Ok(Vec::new());
        }

        let statements = self.render(&self.operations(diff)?)?;
        debug!(
            schema = %diff.schema_name,
            dialect = %self.dialect,
            statements = statements.len(),
            "generated migration"
        );
        Ok(statements)
    }

    pub fn generate_rollback(&self, diff: &SchemaDiff) -> Result<Vec<String>, GenerateError> {
        if diff.is_empty() {
            return Ok(Vec::new());
        }

        let ops = self.rollback_operations(diff)?;
        for op in &ops {
            if let MigrationOperation::AddColumn {
                table,
                column,
                lossy: true,
                ..
            } = op
            {
                warn!(table = %table, column = %column, "rollback re-creates a dropped column without its data");
            }
        }

        let statements = self.render(&ops)?;
        debug!(
            schema = %diff.schema_name,
            dialect = %self.dialect,
            statements = statements.len(),
            "generated rollback"
        );
        Ok(statements)
    }

    /// Renders operations with this generator's formatting options.
    pub fn render(&self, ops: &[MigrationOperation]) -> Result<Vec<String>, GenerateError> {
        let backend = self.backend();
        ops.iter()
            .map(|op| backend.render(op).map(|sql| self.format(sql)))
            .collect()
    }

    fn format(&self, sql: String) -> String {
        let mut sql = if self.options.quote_identifiers {
            sql
        } else {
            sql.replace(self.backend().quote_char(), "")
        };
        if self.options.semicolons {
            sql.push(';');
        }
        sql
    }
}

/// Looks up `dialect` by name and builds a generator for it.
pub fn create_migration_generator(
    dialect: &str,
    options: GeneratorOptions,
) -> Result<MigrationGenerator, GenerateError> {
    let dialect: Dialect = dialect.parse()?;
    Ok(MigrationGenerator::new(dialect, options))
}

/// One-shot form of [`MigrationGenerator::generate`].
pub fn generate_migration(
    diff: &SchemaDiff,
    dialect: &str,
    options: GeneratorOptions,
) -> Result<Vec<String>, GenerateError> {
    create_migration_generator(dialect, options)?.generate(diff)
}
