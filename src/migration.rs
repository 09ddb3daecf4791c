use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::Dialect;
use crate::diff::SchemaDiff;
use crate::error::GenerateError;
use crate::generator::MigrationGenerator;
use crate::operation::MigrationOperation;
use crate::version::SchemaVersion;

/// An executable migration: the rendered forward and rollback statements
/// for one diff against one dialect.
///
/// Built with [`MigrationBuilder`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    id: String,
    from_version: SchemaVersion,
    to_version: SchemaVersion,
    timestamp: DateTime<Utc>,
    dialect: Dialect,
    operations: Vec<MigrationOperation>,
    up: Vec<String>,
    down: Vec<String>,
    is_breaking: bool,
    description: Option<String>,
}

impl Migration {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from_version(&self) -> SchemaVersion {
        self.from_version
    }

    pub fn to_version(&self) -> SchemaVersion {
        self.to_version
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn operations(&self) -> &[MigrationOperation] {
        &self.operations
    }

    /// Forward statements, in execution order.
    pub fn up(&self) -> &[String] {
        &self.up
    }

    /// Rollback statements, in execution order.
    pub fn down(&self) -> &[String] {
        &self.down
    }

    pub fn is_breaking(&self) -> bool {
        self.is_breaking
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }
}

pub struct MigrationBuilder {
    id: Option<String>,
    schema: String,
    from_version: SchemaVersion,
    to_version: SchemaVersion,
    timestamp: DateTime<Utc>,
    dialect: Dialect,
    operations: Vec<MigrationOperation>,
    up: Vec<String>,
    down: Vec<String>,
    is_breaking: bool,
    description: Option<String>,
}

impl MigrationBuilder {
    /// Renders `diff` with `generator`. Fails if any change cannot be
    /// expressed in the generator's dialect.
    pub fn from_diff(
        diff: &SchemaDiff,
        generator: &MigrationGenerator,
    ) -> Result<Self, GenerateError> {
        let operations = generator.operations(diff)?;
        let up = generator.generate(diff)?;
        let down = generator.generate_rollback(diff)?;

        let description = if diff.is_empty() {
            None
        } else {
            Some(
                diff.changes
                    .iter()
                    .map(|c| c.describe())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        Ok(Self {
            id: None,
            schema: diff.schema_name.clone(),
            from_version: SchemaVersion::from_revision(diff.from_version.unwrap_or(0)),
            to_version: SchemaVersion::from_revision(diff.to_version.unwrap_or(0)),
            timestamp: Utc::now(),
            dialect: generator.dialect(),
            operations,
            up,
            down,
            is_breaking: diff.is_breaking,
            description,
        })
    }

    /// A migration from hand-written statements.
    pub fn from_sql(
        schema: impl Into<String>,
        dialect: Dialect,
        up: Vec<String>,
        down: Vec<String>,
    ) -> Self {
        Self {
            id: None,
            schema: schema.into(),
            from_version: SchemaVersion::default(),
            to_version: SchemaVersion::default(),
            timestamp: Utc::now(),
            dialect,
            operations: Vec::new(),
            up,
            down,
            is_breaking: false,
            description: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn versions(mut self, from: SchemaVersion, to: SchemaVersion) -> Self {
        self.from_version = from;
        self.to_version = to;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn breaking(mut self, is_breaking: bool) -> Self {
        self.is_breaking = is_breaking;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn build(self) -> Migration {
        let id = self.id.unwrap_or_else(|| {
            format!(
                "{}_{}_v{}_to_v{}",
                self.timestamp.format("%Y%m%d%H%M%S"),
                self.schema,
                self.from_version,
                self.to_version
            )
        });

        Migration {
            id,
            from_version: self.from_version,
            to_version: self.to_version,
            timestamp: self.timestamp,
            dialect: self.dialect,
            operations: self.operations,
            up: self.up,
            down: self.down,
            is_breaking: self.is_breaking,
            description: self.description,
        }
    }
}

/// Migrations known to a [`Migrator`](crate::migrator::Migrator), in
/// registration order.
#[derive(Debug, Default)]
pub struct MigrationRegistry {
    migrations: HashMap<String, Migration>,
    order: Vec<String>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a migration. Registering an id again replaces the earlier
    /// migration but keeps its position.
    pub fn register(&mut self, migration: Migration) {
        let id = migration.id().to_string();
        if self.migrations.insert(id.clone(), migration).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Migration> {
        self.migrations.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Migration> {
        self.order.iter().filter_map(|id| self.migrations.get(id))
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
