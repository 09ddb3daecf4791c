mod field;
mod index;

pub use index::{parse_index_directive, Index, INDEX_DIRECTIVE, UNIQUE_DIRECTIVE};

use serde::{Deserialize, Serialize};

use crate::diff::SchemaChange;
use crate::error::GenerateError;

/// Dialect-agnostic instruction produced from a [`SchemaChange`].
///
/// Column types are schema type strings (`"uuid"`, `"string[]"`); each
/// backend maps them to native SQL types when rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum MigrationOperation {
    AddColumn {
        table: String,
        column: String,
        column_type: String,
        nullable: bool,
        /// Set when re-creating a dropped column whose data cannot come back.
        lossy: bool,
    },
    DropColumn {
        table: String,
        column: String,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    AlterType {
        table: String,
        column: String,
        column_type: String,
        nullable: bool,
    },
    AlterNullability {
        table: String,
        column: String,
        column_type: String,
        nullable: bool,
    },
    CreateIndex {
        table: String,
        name: String,
        columns: Vec<String>,
        unique: bool,
    },
    DropIndex {
        table: String,
        name: String,
    },
}

impl MigrationOperation {
    pub fn table(&self) -> &str {
        match self {
            MigrationOperation::AddColumn { table, .. }
            | MigrationOperation::DropColumn { table, .. }
            | MigrationOperation::RenameColumn { table, .. }
            | MigrationOperation::AlterType { table, .. }
            | MigrationOperation::AlterNullability { table, .. }
            | MigrationOperation::CreateIndex { table, .. }
            | MigrationOperation::DropIndex { table, .. } => table,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            MigrationOperation::AddColumn { table, column, .. } => {
                format!("Add column {} to {}", column, table)
            }
            MigrationOperation::DropColumn { table, column } => {
                format!("Drop column {} from {}", column, table)
            }
            MigrationOperation::RenameColumn { table, from, to } => {
                format!("Rename column {} to {} on {}", from, to, table)
            }
            MigrationOperation::AlterType {
                table,
                column,
                column_type,
                ..
            } => format!("Change type of {}.{} to {}", table, column, column_type),
            MigrationOperation::AlterNullability {
                table,
                column,
                nullable,
                ..
            } => {
                let action = if *nullable { "Drop" } else { "Set" };
                format!("{} NOT NULL on {}.{}", action, table, column)
            }
            MigrationOperation::CreateIndex { table, name, .. } => {
                format!("Add index {} on {}", name, table)
            }
            MigrationOperation::DropIndex { table, name } => {
                format!("Remove index {} from {}", name, table)
            }
        }
    }
}

impl SchemaChange {
    /// Operations applying this change to `table`.
    pub fn forward_operations(&self, table: &str) -> Result<Vec<MigrationOperation>, GenerateError> {
        let ops = match self {
            SchemaChange::AddField { definition, .. } => field::add_field(table, definition),
            SchemaChange::RemoveField { field, definition } => {
                field::drop_field(table, field, definition.as_ref())
            }
            SchemaChange::RenameField {
                old_name,
                new_name,
                indexed,
            } => field::rename_field(table, old_name, new_name, *indexed),
            SchemaChange::ChangeType {
                field,
                new_type,
                nullable,
                ..
            } => field::change_type(table, field, new_type, *nullable),
            SchemaChange::ChangeModifier {
                field,
                old_modifier,
                new_modifier,
                field_type,
            } => field::change_modifier(table, field, *old_modifier, *new_modifier, field_type),
            SchemaChange::ChangeDirective {
                directive,
                old_value,
                new_value,
            } => index::directive_operations(
                table,
                directive,
                old_value.as_ref(),
                new_value.as_ref(),
            )?,
        };
        Ok(ops)
    }

    /// Operations undoing this change, in execution order.
    pub fn backward_operations(
        &self,
        table: &str,
    ) -> Result<Vec<MigrationOperation>, GenerateError> {
        let ops = match self {
            SchemaChange::AddField { field, definition } => {
                field::drop_field(table, field, Some(definition))
            }
            SchemaChange::RemoveField { field, definition } => {
                field::restore_field(table, field, definition.as_ref())
            }
            SchemaChange::RenameField {
                old_name,
                new_name,
                indexed,
            } => field::rename_field(table, new_name, old_name, *indexed),
            SchemaChange::ChangeType {
                field,
                old_type,
                nullable,
                ..
            } => field::change_type(table, field, old_type, *nullable),
            SchemaChange::ChangeModifier {
                field,
                old_modifier,
                new_modifier,
                field_type,
            } => field::change_modifier(table, field, *new_modifier, *old_modifier, field_type),
            SchemaChange::ChangeDirective {
                directive,
                old_value,
                new_value,
            } => index::directive_operations(
                table,
                directive,
                new_value.as_ref(),
                old_value.as_ref(),
            )?,
        };
        Ok(ops)
    }
}
