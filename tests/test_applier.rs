//! Tests for the apply pass: ordering, dry runs and additive-only behavior

mod common;

use common::{fast_retry, FakeSqlDriver, RecordingObserver};
use schemaguard::migration::{ApplyOptions, PlanOptions};
use schemaguard::schema::ElementKind;
use schemaguard::{
    Engine, MysqlAdapter, PostgresAdapter, SchemaDocument, SchemaMigrator, StaticVersions,
};
use std::sync::Arc;

const DOC: &str = r#"{
    "postgres": {
        "tables": {
            "users": {
                "columns": {
                    "id": { "type": "uuid", "primary": true, "default": "gen_random_uuid()" },
                    "email": { "type": "varchar(320)", "nullable": false },
                    "nickname": { "type": "string", "since": 2.0 },
                    "legacy_code": { "type": "string", "removed_in": 3.0 }
                },
                "indexes": [
                    { "columns": ["email"], "unique": true },
                    { "columns": ["lower(email)"], "name": "users_email_lower_idx" }
                ]
            }
        }
    }
}"#;

fn migrator(
    driver: &Arc<FakeSqlDriver>,
    version: f64,
    observer: Arc<RecordingObserver>,
) -> SchemaMigrator {
    SchemaMigrator::new()
        .with_postgres(PostgresAdapter::new(driver.clone()).with_retry(fast_retry()))
        .with_versions(StaticVersions::new().with(Engine::Postgres, "users", version))
        .with_observer(observer)
}

fn doc() -> SchemaDocument {
    SchemaDocument::from_json_str(DOC).unwrap()
}

#[test]
fn test_dry_run_counts_match_live_run() {
    let dry_driver = FakeSqlDriver::new().with_table("users", &["id"], &[]);
    let live_driver = FakeSqlDriver::new().with_table("users", &["id"], &[]);

    let dry = migrator(&dry_driver, 3.0, RecordingObserver::new())
        .apply_schema(&doc(), &ApplyOptions::dry_run())
        .unwrap();
    let live = migrator(&live_driver, 3.0, RecordingObserver::new())
        .apply_schema(&doc(), &ApplyOptions::default())
        .unwrap();

    assert_eq!(dry.additions_applied, live.additions_applied);
    assert_eq!(dry.additions_applied, 4);
    assert!(dry_driver.executed().is_empty());
    assert!(dry.statements.iter().all(|s| !s.executed));
    assert_eq!(live_driver.executed().len(), 4);
    assert!(live.statements.iter().all(|s| s.executed));
}

#[test]
fn test_additions_run_columns_before_indexes() {
    let driver = FakeSqlDriver::new().with_table("users", &["id"], &[]);
    let report = migrator(&driver, 3.0, RecordingObserver::new())
        .apply_schema(&doc(), &ApplyOptions::default())
        .unwrap();

    let kinds: Vec<ElementKind> = report.statements.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ElementKind::Column,
            ElementKind::Column,
            ElementKind::Index,
            ElementKind::Index
        ]
    );
    let executed = driver.executed();
    assert!(executed[0].starts_with("ALTER TABLE \"users\" ADD COLUMN"));
    assert!(executed[0].contains("\"email\" VARCHAR(320) NOT NULL"));
    assert!(executed[1].contains("\"nickname\""));
    assert!(executed[2].starts_with("CREATE UNIQUE INDEX"));
    assert!(executed[2].contains("\"users_email_idx\""));
    assert_eq!(
        executed[3],
        "CREATE INDEX IF NOT EXISTS \"users_email_lower_idx\" ON \"users\" ((lower(\"email\")))"
    );
}

#[test]
fn test_removed_column_is_never_dropped_or_added() {
    let driver = FakeSqlDriver::new().with_table("users", &["id", "email", "legacy_code"], &[]);
    migrator(&driver, 3.0, RecordingObserver::new())
        .apply_schema(&doc(), &ApplyOptions::default())
        .unwrap();

    for sql in driver.executed() {
        assert!(!sql.to_ascii_uppercase().contains("DROP"), "{sql}");
        assert!(!sql.contains("legacy_code"), "{sql}");
    }
    assert!(driver.table("users").unwrap().columns.contains("legacy_code"));
}

#[test]
fn test_create_table_then_validate() {
    let driver = FakeSqlDriver::new();
    let observer = RecordingObserver::new();
    let migrator = migrator(&driver, 1.0, observer.clone());

    let report = migrator
        .apply_schema(&doc(), &ApplyOptions::default())
        .unwrap();
    assert_eq!(report.statements[0].kind, ElementKind::Table);
    let executed = driver.executed();
    let create = &executed[0];
    assert!(create.starts_with("CREATE TABLE IF NOT EXISTS \"users\""));
    assert!(create.contains("\"legacy_code\""));
    assert!(!create.contains("\"nickname\""));
    assert_eq!(*observer.applied.lock(), vec![(Engine::Postgres, 3, false)]);

    let columns = driver.table("users").unwrap().columns;
    assert_eq!(
        columns.into_iter().collect::<Vec<_>>(),
        vec!["email", "id", "legacy_code"]
    );

    let result = migrator.final_validate(&doc(), &PlanOptions::all()).unwrap();
    assert!(result.passed());
    assert_eq!(result.checks.len(), 6);

    let again = migrator
        .apply_schema(&doc(), &ApplyOptions::default())
        .unwrap();
    assert_eq!(again.additions_applied, 0);
}

#[test]
fn test_mysql_table_options_and_report() {
    let doc = SchemaDocument::from_json_str(
        r#"{ "mysql": { "tables": { "orders": {
            "columns": {
                "id": { "type": "bigint", "primary": true, "auto_increment": true },
                "total": { "type": "number" }
            },
            "options": { "engine": "InnoDB", "charset": "utf8mb4" }
        } } } }"#,
    )
    .unwrap();
    let driver = FakeSqlDriver::new();
    let migrator = SchemaMigrator::new()
        .with_mysql(MysqlAdapter::new(driver.clone()).with_retry(fast_retry()))
        .with_versions(StaticVersions::new())
        .with_observer(RecordingObserver::new());

    let report = migrator.apply_schema(&doc, &ApplyOptions::default()).unwrap();
    assert_eq!(report.additions_applied, 1);
    let executed = driver.executed();
    let sql = &executed[0];
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `orders`"));
    assert!(sql.contains("AUTO_INCREMENT"));
    assert!(sql.contains("DECIMAL(20,6)"));
    assert!(sql.contains("InnoDB"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["statements"][0]["statement"]["type"], "sql");
    assert_eq!(json["additions_applied"], 1);
    assert_eq!(driver.table("orders").unwrap().columns.len(), 2);
}
