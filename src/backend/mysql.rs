use sea_query::{
    Alias, ColumnDef, IndexCreateStatement, IndexDropStatement, MysqlQueryBuilder, Table,
    TableAlterStatement,
};

use crate::backend::Backend;
use crate::error::GenerateError;
use crate::field::FieldType;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl MySql {
    /// `MODIFY COLUMN` restates the whole column, so type and nullability
    /// always travel together.
    fn modify_column_sql(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        nullable: bool,
    ) -> Result<String, GenerateError> {
        let mut col = ColumnDef::new(Alias::new(column));
        col.custom(Alias::new(self.map_type(column_type)?));
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
}

impl Backend for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn supports_transactional_ddl(&self) -> bool {
        // MySQL issues implicit commits for DDL statements
        false
    }

    fn column_type(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Uuid => "CHAR(36)".to_string(),
            FieldType::String => "VARCHAR(255)".to_string(),
            FieldType::Text => "TEXT".to_string(),
            FieldType::VarChar(len) => format!("VARCHAR({})", len),
            FieldType::Int => "INT".to_string(),
            FieldType::Long => "BIGINT".to_string(),
            FieldType::Float => "FLOAT".to_string(),
            FieldType::Double => "DOUBLE".to_string(),
            FieldType::Decimal(None) => "DECIMAL".to_string(),
            FieldType::Decimal(Some((p, s))) => format!("DECIMAL({}, {})", p, s),
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Timestamp => "DATETIME".to_string(),
            FieldType::Date => "DATE".to_string(),
            FieldType::Binary => "BLOB".to_string(),
            FieldType::Json | FieldType::Array(_) => "JSON".to_string(),
        }
    }

    fn build_table_alter(&self, stmt: TableAlterStatement) -> String {
        stmt.to_string(MysqlQueryBuilder)
    }

    fn build_index_create(&self, stmt: IndexCreateStatement) -> String {
        stmt.to_string(MysqlQueryBuilder)
    }

    fn build_index_drop(&self, stmt: IndexDropStatement) -> String {
        stmt.to_string(MysqlQueryBuilder)
    }

    fn alter_type_sql(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        nullable: bool,
    ) -> Result<String, GenerateError> {
        self.modify_column_sql(table, column, column_type, nullable)
    }

    fn alter_nullability_sql(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        nullable: bool,
    ) -> Result<String, GenerateError> {
        self.modify_column_sql(table, column, column_type, nullable)
    }
}
