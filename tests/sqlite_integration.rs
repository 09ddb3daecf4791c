use async_trait::async_trait;
use rusqlite::Connection;
use schemadrift::prelude::*;
use serde_json::json;

struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    fn new() -> Self {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id TEXT NOT NULL PRIMARY KEY, name TEXT)")
            .unwrap();
        Self { conn }
    }

    fn columns(&self, table: &str) -> Vec<String> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info(\"{}\")", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn indexes(&self, table: &str) -> Vec<String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 \
                 AND name NOT LIKE 'sqlite_autoindex_%' ORDER BY name",
            )
            .unwrap();
        stmt.query_map([table], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    async fn execute(&mut self, sql: &str) -> anyhow::Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> anyhow::Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    async fn commit(&mut self) -> anyhow::Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    async fn rollback(&mut self) -> anyhow::Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn users_v1() -> SchemaSnapshot {
    SchemaSnapshot::new("users", 1)
        .field(FieldDefinition::new("id", "uuid").required())
        .field(FieldDefinition::new("name", "string"))
}

fn users_v2() -> SchemaSnapshot {
    SchemaSnapshot::new("users", 2)
        .field(FieldDefinition::new("id", "uuid").required())
        .field(FieldDefinition::new("name", "string"))
        .field(FieldDefinition::new("email", "string").optional())
        .field(FieldDefinition::new("slug", "string").indexed())
        .directive("$unique", json!(["email"]))
}

fn migrator(
    migrations: Vec<Migration>,
) -> Migrator<SqliteExecutor, InMemoryHistoryStorage> {
    init_tracing();
    let mut registry = MigrationRegistry::new();
    for migration in migrations {
        registry.register(migration);
    }
    Migrator::new(
        registry,
        create_migration_runner(SqliteExecutor::new(), RunnerOptions::default()),
        create_migration_history(InMemoryHistoryStorage::new()),
    )
}

fn build(id: &str, old: &SchemaSnapshot, new: &SchemaSnapshot) -> Migration {
    let generator = create_migration_generator("sqlite", GeneratorOptions::default()).unwrap();
    MigrationBuilder::from_diff(&diff(old, new), &generator)
        .unwrap()
        .id(id)
        .build()
}

#[tokio::test]
async fn apply_adds_columns_and_indexes() {
    let mut migrator = migrator(vec![build("0002_contact", &users_v1(), &users_v2())]);

    let result = migrator.apply("0002_contact", false).await.unwrap();
    assert!(result.success);
    assert_eq!(result.executed_statements, 4);

    let executor = migrator.runner().executor();
    assert_eq!(executor.columns("users"), vec!["id", "name", "email", "slug"]);
    assert_eq!(
        executor.indexes("users"),
        vec!["ix_users_slug", "uniq_users_email"]
    );
    assert!(migrator.history().has_applied("0002_contact").await.unwrap());
}

#[tokio::test]
async fn rollback_restores_previous_shape() {
    let mut migrator = migrator(vec![build("0002_contact", &users_v1(), &users_v2())]);
    migrator.apply("0002_contact", false).await.unwrap();

    let rolled_back = migrator.rollback("0002_contact", false).await.unwrap();
    assert_eq!(rolled_back, vec!["0002_contact"]);

    let executor = migrator.runner().executor();
    assert_eq!(executor.columns("users"), vec!["id", "name"]);
    assert!(executor.indexes("users").is_empty());
    assert!(migrator.history().was_rolled_back("0002_contact").await.unwrap());
}

#[tokio::test]
async fn unique_directive_is_enforced() {
    let mut migrator = migrator(vec![build("0002_contact", &users_v1(), &users_v2())]);
    migrator.apply("0002_contact", false).await.unwrap();

    let conn = &migrator.runner().executor().conn;
    conn.execute_batch("INSERT INTO users (id, email) VALUES ('a', 'x@example.com')")
        .unwrap();
    assert!(conn
        .execute_batch("INSERT INTO users (id, email) VALUES ('b', 'x@example.com')")
        .is_err());
}

#[tokio::test]
async fn rename_and_lossy_rollback() {
    let v3 = SchemaSnapshot::new("users", 3)
        .field(FieldDefinition::new("id", "uuid").required())
        .field(FieldDefinition::new("full_name", "string"));
    let generator = create_migration_generator("sqlite", GeneratorOptions::default()).unwrap();
    let rename = MigrationBuilder::from_diff(
        &diff_with_renames(&users_v1(), &v3, &[FieldRename::new("name", "full_name")]),
        &generator,
    )
    .unwrap()
    .id("0002_rename")
    .build();

    let v4 = SchemaSnapshot::new("users", 4).field(FieldDefinition::new("id", "uuid").required());
    let remove = build("0003_drop_name", &v3, &v4);
    assert!(remove.is_breaking());
    assert!(remove.down()[0].starts_with("/* lossy rollback"));

    let mut migrator = migrator(vec![rename, remove]);
    migrator.apply_pending().await.unwrap();
    assert_eq!(migrator.runner().executor().columns("users"), vec!["id"]);

    migrator.rollback("0002_rename", true).await.unwrap();
    assert_eq!(
        migrator.runner().executor().columns("users"),
        vec!["id", "name"]
    );
}

#[tokio::test]
async fn renamed_indexed_column_can_be_dropped_later() {
    let with_email = users_v1().field(FieldDefinition::new("email", "string").indexed());
    let with_email = SchemaSnapshot { version: 2, ..with_email };
    let renamed = SchemaSnapshot::new("users", 3)
        .field(FieldDefinition::new("id", "uuid").required())
        .field(FieldDefinition::new("name", "string"))
        .field(FieldDefinition::new("contact", "string").indexed());
    let dropped = SchemaSnapshot { version: 4, ..users_v1() };

    let generator = create_migration_generator("sqlite", GeneratorOptions::default()).unwrap();
    let rename = MigrationBuilder::from_diff(
        &diff_with_renames(&with_email, &renamed, &[FieldRename::new("email", "contact")]),
        &generator,
    )
    .unwrap()
    .id("0003_rename_email")
    .build();

    let mut migrator = migrator(vec![
        build("0002_email", &users_v1(), &with_email),
        rename,
        build("0004_drop_contact", &renamed, &dropped),
    ]);

    migrator.apply("0002_email", false).await.unwrap();
    migrator.apply("0003_rename_email", false).await.unwrap();
    assert_eq!(migrator.runner().executor().indexes("users"), vec!["ix_users_contact"]);

    let result = migrator.apply("0004_drop_contact", false).await.unwrap();
    assert!(result.success);
    assert_eq!(migrator.runner().executor().columns("users"), vec!["id", "name"]);
    assert!(migrator.runner().executor().indexes("users").is_empty());

    let rolled_back = migrator.rollback("0002_email", true).await.unwrap();
    assert_eq!(
        rolled_back,
        vec!["0004_drop_contact", "0003_rename_email", "0002_email"]
    );
    assert_eq!(migrator.runner().executor().columns("users"), vec!["id", "name"]);
    assert!(migrator.runner().executor().indexes("users").is_empty());
}

#[tokio::test]
async fn modifier_and_directive_index_on_same_column() {
    let v2 = SchemaSnapshot::new("users", 2)
        .field(FieldDefinition::new("id", "uuid").required())
        .field(FieldDefinition::new("name", "string").indexed())
        .directive("$index", json!(["name"]));

    let mut migrator = migrator(vec![build("0002_index_name", &users_v1(), &v2)]);
    migrator.apply("0002_index_name", false).await.unwrap();
    assert_eq!(
        migrator.runner().executor().indexes("users"),
        vec!["idx_users_name", "ix_users_name"]
    );

    migrator.rollback("0002_index_name", false).await.unwrap();
    assert!(migrator.runner().executor().indexes("users").is_empty());
}

#[tokio::test]
async fn failed_statement_rolls_back_the_transaction() {
    let broken = MigrationBuilder::from_sql(
        "users",
        Dialect::Sqlite,
        vec![
            "ALTER TABLE \"users\" ADD COLUMN \"email\" TEXT".to_string(),
            "ALTER TABLE \"missing\" ADD COLUMN \"x\" TEXT".to_string(),
        ],
        vec![],
    )
    .id("0002_broken")
    .build();

    let mut migrator = migrator(vec![broken]);
    let err = migrator.apply("0002_broken", false).await.unwrap_err();

    match err {
        MigrateError::Execution {
            statement_index,
            executed,
            message,
            ..
        } => {
            assert_eq!(statement_index, Some(1));
            assert_eq!(executed, 1);
            assert!(message.contains("missing"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(migrator.runner().executor().columns("users"), vec!["id", "name"]);
    assert!(!migrator.history().has_applied("0002_broken").await.unwrap());
}

#[test]
fn sqlite_rejects_in_place_type_changes() {
    let v2 = SchemaSnapshot::new("users", 2)
        .field(FieldDefinition::new("id", "uuid").required())
        .field(FieldDefinition::new("name", "text[]"));

    let err = generate_migration(&diff(&users_v1(), &v2), "sqlite", GeneratorOptions::default())
        .unwrap_err();
    assert!(matches!(err, GenerateError::UnsupportedChange { .. }));
}
