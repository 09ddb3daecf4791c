use sea_query::{
    IndexCreateStatement, IndexDropStatement, PostgresQueryBuilder, TableAlterStatement,
};

use crate::backend::Backend;
use crate::field::FieldType;

/// DuckDB accepts the PostgreSQL DDL dialect, so statements are built with
/// the Postgres query builder and only the type names differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDb;

impl Backend for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    fn column_type(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Uuid => "UUID".to_string(),
            FieldType::String | FieldType::Text => "VARCHAR".to_string(),
            FieldType::VarChar(len) => format!("VARCHAR({})", len),
            FieldType::Int => "INTEGER".to_string(),
            FieldType::Long => "BIGINT".to_string(),
            FieldType::Float => "FLOAT".to_string(),
            FieldType::Double => "DOUBLE".to_string(),
            FieldType::Decimal(None) => "DECIMAL".to_string(),
            FieldType::Decimal(Some((p, s))) => format!("DECIMAL({}, {})", p, s),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Timestamp => "TIMESTAMP".to_string(),
            FieldType::Date => "DATE".to_string(),
            FieldType::Json => "JSON".to_string(),
            FieldType::Binary => "BLOB".to_string(),
            FieldType::Array(inner) => format!("{}[]", self.column_type(inner)),
        }
    }

    fn build_table_alter(&self, stmt: TableAlterStatement) -> String {
        stmt.to_string(PostgresQueryBuilder)
    }

    fn build_index_create(&self, stmt: IndexCreateStatement) -> String {
        stmt.to_string(PostgresQueryBuilder)
    }

    fn build_index_drop(&self, stmt: IndexDropStatement) -> String {
        stmt.to_string(PostgresQueryBuilder)
    }
}
