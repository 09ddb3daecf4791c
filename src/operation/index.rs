use serde_json::Value;

use crate::error::GenerateError;
use crate::operation::MigrationOperation;

pub const INDEX_DIRECTIVE: &str = "$index";
pub const UNIQUE_DIRECTIVE: &str = "$unique";

/// An index derived from a field modifier or an index directive.
///
/// Modifier indexes are named `ix_<table>_<col>` so they never collide with
/// an `$index` entry on the same column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub columns: Vec<String>,
    pub unique: bool,
    from_modifier: bool,
}

impl Index {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            unique: false,
            from_modifier: false,
        }
    }

    pub fn column(column: impl Into<String>) -> Self {
        Self::new(vec![column.into()])
    }

    /// The plain index a `#` modifier puts on `column`.
    pub fn field(column: impl Into<String>) -> Self {
        Self {
            from_modifier: true,
            ..Self::column(column)
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn name(&self, table: &str) -> String {
        let prefix = match (self.from_modifier, self.unique) {
            (true, _) => "ix",
            (false, true) => "uniq",
            (false, false) => "idx",
        };
        format!("{}_{}_{}", prefix, table, self.columns.join("_"))
    }

    pub fn create(&self, table: &str) -> MigrationOperation {
        MigrationOperation::CreateIndex {
            table: table.to_string(),
            name: self.name(table),
            columns: self.columns.clone(),
            unique: self.unique,
        }
    }

    pub fn drop(&self, table: &str) -> MigrationOperation {
        MigrationOperation::DropIndex {
            table: table.to_string(),
            name: self.name(table),
        }
    }
}

/// Parses the value of an `$index` or `$unique` directive.
///
/// Accepted shapes: `"email"` (one index), `["email", "name"]` (one index
/// per entry) and `[["org_id", "email"], "name"]` (nested arrays are
/// composite indexes). `null` or an absent value means no indexes.
pub fn parse_index_directive(
    directive: &str,
    value: Option<&Value>,
) -> Result<Vec<Index>, GenerateError> {
    let unique = match directive {
        INDEX_DIRECTIVE => false,
        UNIQUE_DIRECTIVE => true,
        other => return Err(GenerateError::UnsupportedDirective(other.to_string())),
    };

    let invalid = |reason: &str| GenerateError::InvalidDirective {
        directive: directive.to_string(),
        reason: reason.to_string(),
    };

    let entries = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(column)) => vec![Index::column(column.clone())],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(column) => Ok(Index::column(column.clone())),
                Value::Array(columns) => {
                    let columns = columns
                        .iter()
                        .map(|c| c.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| invalid("composite index columns must be strings"))?;
                    if columns.is_empty() {
                        return Err(invalid("composite index has no columns"));
                    }
                    Ok(Index::new(columns))
                }
                _ => Err(invalid("expected a column name or a list of column names")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(invalid("expected a column name or a list of column names")),
    };

    Ok(entries
        .into_iter()
        .map(|index| if unique { index.unique() } else { index })
        .collect())
}

/// Operations moving a table from the `old` directive value to `new`:
/// indexes that disappear are dropped first, then new ones are created.
pub fn directive_operations(
    table: &str,
    directive: &str,
    old: Option<&Value>,
    new: Option<&Value>,
) -> Result<Vec<MigrationOperation>, GenerateError> {
    let before = parse_index_directive(directive, old)?;
    let after = parse_index_directive(directive, new)?;

    let drops = before
        .iter()
        .filter(|index| !after.contains(index))
        .map(|index| index.drop(table));
    let creates = after
        .iter()
        .filter(|index| !before.contains(index))
        .map(|index| index.create(table));

    Ok(drops.chain(creates).collect())
}
