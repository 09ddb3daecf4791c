mod clickhouse;
mod duckdb;
mod mysql;
mod postgres;
mod sqlite;

pub use clickhouse::ClickHouse;
pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use std::fmt;
use std::str::FromStr;

use sea_query::{
    Alias, ColumnDef, Index as SeaIndex, IndexCreateStatement, IndexDropStatement, Table,
    TableAlterStatement,
};
use serde::{Deserialize, Serialize};

use crate::error::GenerateError;
use crate::field::FieldType;
use crate::operation::MigrationOperation;

/// Renders [`MigrationOperation`]s as SQL for one database engine.
///
/// The default methods build statements with sea-query; backends whose
/// syntax sea-query does not cover override the `*_sql` methods.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;
    fn quote_char(&self) -> char;
    fn supports_alter_column(&self) -> bool;
    fn supports_transactional_ddl(&self) -> bool;

    /// Native column type for a schema type.
    fn column_type(&self, field_type: &FieldType) -> String;

    fn build_table_alter(&self, stmt: TableAlterStatement) -> String;
    fn build_index_create(&self, stmt: IndexCreateStatement) -> String;
    fn build_index_drop(&self, stmt: IndexDropStatement) -> String;

    fn map_type(&self, type_name: &str) -> Result<String, GenerateError> {
        let field_type: FieldType =
            type_name
                .parse()
                .map_err(|_| GenerateError::UnsupportedType {
                    dialect: self.name(),
                    type_name: type_name.to_string(),
                })?;
        Ok(self.column_type(&field_type))
    }

    fn quote_identifier(&self, name: &str) -> String {
        let quote = self.quote_char();
        let escaped = name.replace(quote, &format!("{}{}", quote, quote));
        format!("{}{}{}", quote, escaped, quote)
    }

    fn add_column_sql(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        nullable: bool,
    ) -> Result<String, GenerateError> {
        let mut col = ColumnDef::new(Alias::new(column));
        col.custom(Alias::new(self.map_type(column_type)?));
        if !nullable {
            col.not_null();
        }

        let stmt = Table::alter()
            .table(Alias::new(table))
            .add_column(col)
            .to_owned();
        Ok(self.build_table_alter(stmt))
    }

    fn drop_column_sql(&self, table: &str, column: &str) -> String {
        let stmt = Table::alter()
            .table(Alias::new(table))
            .drop_column(Alias::new(column))
            .to_owned();
        self.build_table_alter(stmt)
    }

    fn rename_column_sql(&self, table: &str, from: &str, to: &str) -> String {
        let stmt = Table::alter()
            .table(Alias::new(table))
            .rename_column(Alias::new(from), Alias::new(to))
            .to_owned();
        self.build_table_alter(stmt)
    }

    /// `ALTER COLUMN .. TYPE ..`; the column's nullability is left alone.
    fn alter_type_sql(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        _nullable: bool,
    ) -> Result<String, GenerateError> {
        let mut col = ColumnDef::new(Alias::new(column));
        col.custom(Alias::new(self.map_type(column_type)?));

        let stmt = Table::alter()
            .table(Alias::new(table))
            .modify_column(col)
            .to_owned();
        Ok(self.build_table_alter(stmt))
    }

    /// `ALTER COLUMN .. SET NOT NULL` / `DROP NOT NULL`.
    fn alter_nullability_sql(
        &self,
        table: &str,
        column: &str,
        _column_type: &str,
        nullable: bool,
    ) -> Result<String, GenerateError> {
        let mut col = ColumnDef::new(Alias::new(column));
        if nullable {
            col.null();
        } else {
            col.not_null();
        }

        let stmt = Table::alter()
            .table(Alias::new(table))
            .modify_column(col)
            .to_owned();
        Ok(self.build_table_alter(stmt))
    }

    fn create_index_sql(
        &self,
        table: &str,
        name: &str,
        columns: &[String],
        unique: bool,
    ) -> Result<String, GenerateError> {
        let mut stmt = SeaIndex::create();
        stmt.name(name).table(Alias::new(table));

        if unique {
            stmt.unique();
        }

        for column in columns {
            stmt.col(Alias::new(column));
        }

        Ok(self.build_index_create(stmt.to_owned()))
    }

    fn drop_index_sql(&self, table: &str, name: &str) -> String {
        let stmt = SeaIndex::drop()
            .name(name)
            .table(Alias::new(table))
            .to_owned();
        self.build_index_drop(stmt)
    }

    fn render(&self, op: &MigrationOperation) -> Result<String, GenerateError> {
        match op {
            MigrationOperation::AddColumn {
                table,
                column,
                column_type,
                nullable,
                lossy,
            } => {
                let sql = self.add_column_sql(table, column, column_type, *nullable)?;
                if *lossy {
                    Ok(format!(
                        "/* lossy rollback: data previously stored in {}.{} is not restored */ {}",
                        table, column, sql
                    ))
                } else {
                    Ok(sql)
                }
            }
            MigrationOperation::DropColumn { table, column } => {
                Ok(self.drop_column_sql(table, column))
            }
            MigrationOperation::RenameColumn { table, from, to } => {
                Ok(self.rename_column_sql(table, from, to))
            }
            MigrationOperation::AlterType {
                table,
                column,
                column_type,
                nullable,
            } => self.alter_type_sql(table, column, column_type, *nullable),
            MigrationOperation::AlterNullability {
                table,
                column,
                column_type,
                nullable,
            } => self.alter_nullability_sql(table, column, column_type, *nullable),
            MigrationOperation::CreateIndex {
                table,
                name,
                columns,
                unique,
            } => self.create_index_sql(table, name, columns, *unique),
            MigrationOperation::DropIndex { table, name } => Ok(self.drop_index_sql(table, name)),
        }
    }
}

/// The closed set of supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    DuckDb,
    ClickHouse,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::Sqlite,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::DuckDb,
        Dialect::ClickHouse,
    ];

    pub fn backend(&self) -> &'static dyn Backend {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::DuckDb => &DuckDb,
            Dialect::ClickHouse => &ClickHouse,
        }
    }

    pub fn name(&self) -> &'static str {
        self.backend().name()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = GenerateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "duckdb" => Ok(Dialect::DuckDb),
            "clickhouse" => Ok(Dialect::ClickHouse),
            _ => Err(GenerateError::UnknownDialect(s.to_string())),
        }
    }
}
