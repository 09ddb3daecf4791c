use crate::field::{FieldDefinition, Modifier};
use crate::operation::{Index, MigrationOperation};

/// Type used to re-create a removed column whose definition is unknown.
const FALLBACK_TYPE: &str = "string";

pub fn add_field(table: &str, definition: &FieldDefinition) -> Vec<MigrationOperation> {
    let mut ops = vec![MigrationOperation::AddColumn {
        table: table.to_string(),
        column: definition.name.clone(),
        column_type: definition.type_name(),
        nullable: definition.is_nullable(),
        lossy: false,
    }];
    if definition.is_indexed() {
        ops.push(Index::field(&definition.name).create(table));
    }
    ops
}

pub fn drop_field(
    table: &str,
    field: &str,
    definition: Option<&FieldDefinition>,
) -> Vec<MigrationOperation> {
    let mut ops = Vec::new();
    if definition.is_some_and(FieldDefinition::is_indexed) {
        ops.push(Index::field(field).drop(table));
    }
    ops.push(MigrationOperation::DropColumn {
        table: table.to_string(),
        column: field.to_string(),
    });
    ops
}

/// Re-creates a dropped column. The data is gone, so the column always
/// comes back nullable.
pub fn restore_field(
    table: &str,
    field: &str,
    definition: Option<&FieldDefinition>,
) -> Vec<MigrationOperation> {
    let column_type = definition
        .map(FieldDefinition::type_name)
        .unwrap_or_else(|| FALLBACK_TYPE.to_string());

    let mut ops = vec![MigrationOperation::AddColumn {
        table: table.to_string(),
        column: field.to_string(),
        column_type,
        nullable: true,
        lossy: true,
    }];
    if definition.is_some_and(FieldDefinition::is_indexed) {
        ops.push(Index::field(field).create(table));
    }
    ops
}

/// Renames a column. A modifier index is named after its column, so it is
/// dropped before the rename and re-created under the new name.
pub fn rename_field(table: &str, from: &str, to: &str, indexed: bool) -> Vec<MigrationOperation> {
    let mut ops = Vec::new();
    if indexed {
        ops.push(Index::field(from).drop(table));
    }
    ops.push(MigrationOperation::RenameColumn {
        table: table.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    });
    if indexed {
        ops.push(Index::field(to).create(table));
    }
    ops
}

pub fn change_type(
    table: &str,
    field: &str,
    column_type: &str,
    nullable: bool,
) -> Vec<MigrationOperation> {
    vec![MigrationOperation::AlterType {
        table: table.to_string(),
        column: field.to_string(),
        column_type: column_type.to_string(),
        nullable,
    }]
}

/// Moves a column from one modifier to another: a plain index that goes
/// away is dropped before the nullability change, a new one is created
/// after it.
pub fn change_modifier(
    table: &str,
    field: &str,
    from: Modifier,
    to: Modifier,
    column_type: &str,
) -> Vec<MigrationOperation> {
    let mut ops = Vec::new();

    if from.is_indexed() && !to.is_indexed() {
        ops.push(Index::field(field).drop(table));
    }

    if from.is_nullable() != to.is_nullable() {
        ops.push(MigrationOperation::AlterNullability {
            table: table.to_string(),
            column: field.to_string(),
            column_type: column_type.to_string(),
            nullable: to.is_nullable(),
        });
    }

    if to.is_indexed() && !from.is_indexed() {
        ops.push(Index::field(field).create(table));
    }

    ops
}
