use sea_query::{
    IndexCreateStatement, IndexDropStatement, PostgresQueryBuilder, TableAlterStatement,
};

use crate::backend::Backend;
use crate::field::FieldType;

#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Backend for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
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
            FieldType::String | FieldType::Text => "TEXT".to_string(),
            FieldType::VarChar(len) => format!("VARCHAR({})", len),
            FieldType::Int => "INTEGER".to_string(),
            FieldType::Long => "BIGINT".to_string(),
            FieldType::Float => "REAL".to_string(),
            FieldType::Double => "DOUBLE PRECISION".to_string(),
            FieldType::Decimal(None) => "DECIMAL".to_string(),
            FieldType::Decimal(Some((p, s))) => format!("DECIMAL({}, {})", p, s),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Timestamp => "TIMESTAMP".to_string(),
            FieldType::Date => "DATE".to_string(),
            FieldType::Json => "JSONB".to_string(),
            FieldType::Binary => "BYTEA".to_string(),
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
