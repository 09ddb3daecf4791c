use sea_query::{IndexCreateStatement, IndexDropStatement, MysqlQueryBuilder, TableAlterStatement};

use crate::backend::Backend;
use crate::error::GenerateError;
use crate::field::FieldType;

/// ClickHouse shares MySQL's backtick quoting and column DDL for drops and
/// renames. Nullability is part of the column type, and indexes are data
/// skipping indexes declared through `ALTER TABLE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouse;

/// Skip index type used for every generated index.
const SKIP_INDEX: &str = "TYPE minmax GRANULARITY 1";

impl ClickHouse {
    fn nullable_type(&self, column_type: &str, nullable: bool) -> Result<String, GenerateError> {
        let mapped = self.map_type(column_type)?;
        // Array(T) cannot be wrapped in Nullable.
        if nullable && !mapped.starts_with("Array(") {
            Ok(format!("Nullable({})", mapped))
        } else {
            Ok(mapped)
        }
    }

    fn modify_column_sql(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        nullable: bool,
    ) -> Result<String, GenerateError> {
        Ok(format!(
            "ALTER TABLE {} MODIFY COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            self.nullable_type(column_type, nullable)?
        ))
    }
}

impl Backend for ClickHouse {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn supports_transactional_ddl(&self) -> bool {
        false
    }

    fn column_type(&self, field_type: &FieldType) -> String {
        match field_type {
            FieldType::Uuid => "UUID".to_string(),
            FieldType::String
            | FieldType::Text
            | FieldType::VarChar(_)
            | FieldType::Json
            | FieldType::Binary => "String".to_string(),
            FieldType::Int => "Int32".to_string(),
            FieldType::Long => "Int64".to_string(),
            FieldType::Float => "Float32".to_string(),
            FieldType::Double => "Float64".to_string(),
            FieldType::Decimal(None) => "Decimal(38, 9)".to_string(),
            FieldType::Decimal(Some((p, s))) => format!("Decimal({}, {})", p, s),
            FieldType::Boolean => "Bool".to_string(),
            FieldType::Timestamp => "DateTime64(3)".to_string(),
            FieldType::Date => "Date".to_string(),
            FieldType::Array(inner) => format!("Array({})", self.column_type(inner)),
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

    fn add_column_sql(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        nullable: bool,
    ) -> Result<String, GenerateError> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            self.nullable_type(column_type, nullable)?
        ))
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

    fn create_index_sql(
        &self,
        table: &str,
        name: &str,
        columns: &[String],
        unique: bool,
    ) -> Result<String, GenerateError> {
        if unique {
            return Err(GenerateError::UnsupportedChange {
                dialect: self.name(),
                change: format!("unique index {} on {}", name, table),
            });
        }

        let columns = columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!(
            "ALTER TABLE {} ADD INDEX {} ({}) {}",
            self.quote_identifier(table),
            self.quote_identifier(name),
            columns,
            SKIP_INDEX
        ))
    }

    fn drop_index_sql(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP INDEX {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clickhouse_backend_name() {
        assert_eq!(ClickHouse.name(), "clickhouse");
        assert!(!ClickHouse.supports_transactional_ddl());
    }

    #[test]
    fn clickhouse_type_map() {
        assert_eq!(ClickHouse.map_type("uuid").unwrap(), "UUID");
        assert_eq!(ClickHouse.map_type("string").unwrap(), "String");
        assert_eq!(ClickHouse.map_type("long").unwrap(), "Int64");
        assert_eq!(ClickHouse.map_type("timestamp").unwrap(), "DateTime64(3)");
        assert_eq!(ClickHouse.map_type("int[]").unwrap(), "Array(Int32)");
    }

    #[test]
    fn clickhouse_nullable_columns() {
        let sql = ClickHouse
            .add_column_sql("events", "note", "string", true)
            .unwrap();
        assert_eq!(sql, "ALTER TABLE `events` ADD COLUMN `note` Nullable(String)");

        let sql = ClickHouse
            .add_column_sql("events", "id", "uuid", false)
            .unwrap();
        assert_eq!(sql, "ALTER TABLE `events` ADD COLUMN `id` UUID");
    }

    #[test]
    fn clickhouse_arrays_are_never_nullable() {
        let sql = ClickHouse
            .add_column_sql("events", "tags", "string[]", true)
            .unwrap();
        assert_eq!(sql, "ALTER TABLE `events` ADD COLUMN `tags` Array(String)");
    }

    #[test]
    fn clickhouse_modify_column() {
        let sql = ClickHouse
            .alter_type_sql("events", "count", "long", false)
            .unwrap();
        assert_eq!(sql, "ALTER TABLE `events` MODIFY COLUMN `count` Int64");

        let sql = ClickHouse
            .alter_nullability_sql("events", "count", "long", true)
            .unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE `events` MODIFY COLUMN `count` Nullable(Int64)"
        );
    }

    #[test]
    fn clickhouse_skip_indexes() {
        let columns = vec!["user_id".to_string(), "ts".to_string()];
        let sql = ClickHouse
            .create_index_sql("events", "idx_events_user_id_ts", &columns, false)
            .unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE `events` ADD INDEX `idx_events_user_id_ts` (`user_id`, `ts`) TYPE minmax GRANULARITY 1"
        );

        let sql = ClickHouse.drop_index_sql("events", "idx_events_user_id_ts");
        assert_eq!(sql, "ALTER TABLE `events` DROP INDEX `idx_events_user_id_ts`");
    }

    #[test]
    fn clickhouse_rejects_unique_indexes() {
        let err = ClickHouse
            .create_index_sql("events", "uniq_events_id", &["id".to_string()], true)
            .unwrap_err();
        assert!(matches!(
            err,
            GenerateError::UnsupportedChange {
                dialect: "clickhouse",
                ..
            }
        ));
    }

    #[test]
    fn clickhouse_drop_and_rename_use_backticks() {
        let sql = ClickHouse.drop_column_sql("events", "note");
        assert!(sql.contains("DROP COLUMN `note`"));

        let sql = ClickHouse.rename_column_sql("events", "note", "comment");
        assert!(sql.contains("RENAME COLUMN `note` TO `comment`"));
    }
}
