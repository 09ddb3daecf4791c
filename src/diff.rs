//! Structural comparison of two schema snapshots.
//!
//! Changes come out in a fixed order: renames, adds, per-field type and
//! modifier changes, directive changes, then removes. Removes go last so
//! that index drops emitted for other changes never reference a column
//! that is already gone.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::{is_narrowing, is_nullability_narrowing};
use crate::field::{FieldDefinition, FieldType, Modifier};
use crate::schema::SchemaSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaChange {
    AddField {
        field: String,
        definition: FieldDefinition,
    },
    RemoveField {
        field: String,
        /// Definition before removal, used to re-create the column on rollback.
        definition: Option<FieldDefinition>,
    },
    RenameField {
        old_name: String,
        new_name: String,
        /// The column carried a `#` index before the rename. The index is
        /// moved to the new name; a later modifier change starts from there.
        #[serde(default)]
        indexed: bool,
    },
    ChangeType {
        field: String,
        old_type: String,
        new_type: String,
        /// Nullability while the type change runs.
        nullable: bool,
    },
    ChangeModifier {
        field: String,
        old_modifier: Modifier,
        new_modifier: Modifier,
        /// Column type once any type change for the same field has run.
        field_type: String,
    },
    ChangeDirective {
        directive: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
}

impl SchemaChange {
    /// Whether this single change can lose data or violate constraints.
    pub fn is_breaking(&self) -> bool {
        match self {
            SchemaChange::RemoveField { .. } => true,
            SchemaChange::ChangeModifier {
                old_modifier,
                new_modifier,
                ..
            } => is_nullability_narrowing(*old_modifier, *new_modifier),
            SchemaChange::ChangeType {
                old_type, new_type, ..
            } => is_narrowing(old_type, new_type),
            SchemaChange::AddField { .. }
            | SchemaChange::RenameField { .. }
            | SchemaChange::ChangeDirective { .. } => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SchemaChange::AddField { field, .. } => format!("add field {}", field),
            SchemaChange::RemoveField { field, .. } => format!("remove field {}", field),
            SchemaChange::RenameField {
                old_name, new_name, ..
            } => format!("rename field {} to {}", old_name, new_name),
            SchemaChange::ChangeType {
                field,
                old_type,
                new_type,
                ..
            } => format!("change type of {} from {} to {}", field, old_type, new_type),
            SchemaChange::ChangeModifier {
                field,
                old_modifier,
                new_modifier,
                ..
            } => format!(
                "change modifier of {} from '{}' to '{}'",
                field, old_modifier, new_modifier
            ),
            SchemaChange::ChangeDirective { directive, .. } => {
                format!("change directive {}", directive)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub schema_name: String,
    pub from_version: Option<u32>,
    pub to_version: Option<u32>,
    pub changes: Vec<SchemaChange>,
    pub is_breaking: bool,
}

impl SchemaDiff {
    /// A diff with no changes for `schema_name`.
    pub fn empty(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            from_version: None,
            to_version: None,
            changes: Vec::new(),
            is_breaking: false,
        }
    }

    /// Builds a diff from explicit changes, deriving `is_breaking`.
    pub fn from_changes(schema_name: impl Into<String>, changes: Vec<SchemaChange>) -> Self {
        let is_breaking = changes.iter().any(SchemaChange::is_breaking);
        Self {
            schema_name: schema_name.into(),
            from_version: None,
            to_version: None,
            changes,
            is_breaking,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn breaking_changes(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter().filter(|c| c.is_breaking())
    }
}

/// Caller-supplied intent that a field was renamed rather than replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRename {
    pub from: String,
    pub to: String,
}

impl FieldRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Compares two snapshots by field name. Renames are never inferred.
pub fn diff(old: &SchemaSnapshot, new: &SchemaSnapshot) -> SchemaDiff {
    diff_with_renames(old, new, &[])
}

/// Like [`diff`], but treats each valid entry of `renames` as a rename.
///
/// A rename is valid when `from` exists only in `old` and `to` exists only
/// in `new`; anything else is ignored and the fields diff as plain
/// adds/removes.
pub fn diff_with_renames(
    old: &SchemaSnapshot,
    new: &SchemaSnapshot,
    renames: &[FieldRename],
) -> SchemaDiff {
    let mut renamed: Vec<(&FieldDefinition, &FieldDefinition)> = Vec::new();
    let mut renamed_from = BTreeSet::new();
    let mut renamed_to = BTreeSet::new();

    for rename in renames {
        let valid = !new.fields.contains_key(&rename.from)
            && !old.fields.contains_key(&rename.to)
            && !renamed_from.contains(rename.from.as_str())
            && !renamed_to.contains(rename.to.as_str());

        match (old.fields.get(&rename.from), new.fields.get(&rename.to)) {
            (Some(before), Some(after)) if valid => {
                renamed_from.insert(rename.from.as_str());
                renamed_to.insert(rename.to.as_str());
                renamed.push((before, after));
            }
            _ => {
                tracing::debug!(
                    from = %rename.from,
                    to = %rename.to,
                    "ignoring rename that does not match the snapshots"
                );
            }
        }
    }

    let mut changes = Vec::new();

    for (before, after) in &renamed {
        changes.push(SchemaChange::RenameField {
            old_name: before.name.clone(),
            new_name: after.name.clone(),
            indexed: before.is_indexed(),
        });
    }

    for (name, definition) in &new.fields {
        if !old.fields.contains_key(name) && !renamed_to.contains(name.as_str()) {
            changes.push(SchemaChange::AddField {
                field: name.clone(),
                definition: definition.clone(),
            });
        }
    }

    let mut modified: Vec<(&str, &FieldDefinition, &FieldDefinition)> = renamed
        .iter()
        .map(|(before, after)| (after.name.as_str(), *before, *after))
        .collect();
    for (name, after) in &new.fields {
        if let Some(before) = old.fields.get(name) {
            modified.push((name.as_str(), before, after));
        }
    }
    modified.sort_by(|a, b| a.0.cmp(b.0));

    for (name, before, after) in modified {
        push_field_changes(&mut changes, name, before, after);
    }

    let directive_keys: BTreeSet<&String> =
        old.directives.keys().chain(new.directives.keys()).collect();
    for key in directive_keys {
        let old_value = old.directives.get(key);
        let new_value = new.directives.get(key);
        if old_value != new_value {
            changes.push(SchemaChange::ChangeDirective {
                directive: key.clone(),
                old_value: old_value.cloned(),
                new_value: new_value.cloned(),
            });
        }
    }

    for (name, definition) in &old.fields {
        if !new.fields.contains_key(name) && !renamed_from.contains(name.as_str()) {
            changes.push(SchemaChange::RemoveField {
                field: name.clone(),
                definition: Some(definition.clone()),
            });
        }
    }

    let is_breaking = changes.iter().any(SchemaChange::is_breaking);

    tracing::debug!(
        schema = %new.name,
        changes = changes.len(),
        is_breaking,
        "computed schema diff"
    );

    SchemaDiff {
        schema_name: new.name.clone(),
        from_version: Some(old.version),
        to_version: Some(new.version),
        changes,
        is_breaking,
    }
}

fn push_field_changes(
    changes: &mut Vec<SchemaChange>,
    name: &str,
    before: &FieldDefinition,
    after: &FieldDefinition,
) {
    let old_type = before.type_name();
    let new_type = after.type_name();

    if !same_type(&old_type, &new_type) {
        changes.push(SchemaChange::ChangeType {
            field: name.to_string(),
            old_type,
            new_type: new_type.clone(),
            nullable: before.is_nullable(),
        });
    }

    if before.modifier != after.modifier {
        changes.push(SchemaChange::ChangeModifier {
            field: name.to_string(),
            old_modifier: before.modifier,
            new_modifier: after.modifier,
            field_type: new_type,
        });
    }
}

/// Aliases such as `bigint` and `long` are the same type. Unknown names
/// only match themselves.
fn same_type(old: &str, new: &str) -> bool {
    match (old.parse::<FieldType>(), new.parse::<FieldType>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => old == new,
    }
}
