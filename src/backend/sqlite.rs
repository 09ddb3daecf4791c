use sea_query::{IndexCreateStatement, IndexDropStatement, SqliteQueryBuilder, TableAlterStatement};

use crate::backend::Backend;
use crate::error::GenerateError;
use crate::field::FieldType;

#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Sqlite {
    fn unsupported(&self, table: &str, column: &str, what: &str) -> GenerateError {
        GenerateError::UnsupportedChange {
            dialect: self.name(),
            change: format!("changing the {} of {}.{} in place", what, table, column),
        }
    }
}

impl Backend for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn column_type(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Int | FieldType::Long | FieldType::Boolean => "INTEGER".to_string(),
            FieldType::Float | FieldType::Double => "REAL".to_string(),
            FieldType::Decimal(_) => "NUMERIC".to_string(),
            FieldType::Binary => "BLOB".to_string(),
            // Everything else, arrays included, is stored as text.
            _ => "TEXT".to_string(),
        }
    }

    fn build_table_alter(&self, stmt: TableAlterStatement) -> String {
        stmt.to_string(SqliteQueryBuilder)
    }

    fn build_index_create(&self, stmt: IndexCreateStatement) -> String {
        stmt.to_string(SqliteQueryBuilder)
    }

    fn build_index_drop(&self, stmt: IndexDropStatement) -> String {
        stmt.to_string(SqliteQueryBuilder)
    }

    fn alter_type_sql(
        &self,
        table: &str,
        column: &str,
        _column_type: &str,
        _nullable: bool,
    ) -> Result<String, GenerateError> {
        Err(self.unsupported(table, column, "type"))
    }

    fn alter_nullability_sql(
        &self,
        table: &str,
        column: &str,
        _column_type: &str,
        _nullable: bool,
    ) -> Result<String, GenerateError> {
        Err(self.unsupported(table, column, "nullability"))
    }
}
