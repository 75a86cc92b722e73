//! Tests for the planning pass against in-memory relational drivers

mod common;

use common::{fast_retry, FakeSqlDriver, FakeWideColumnDriver, RecordingObserver};
use schemaguard::migration::PlanOptions;
use schemaguard::schema::{ElementKind, SchemaElement};
use schemaguard::{
    DynamoAdapter, Engine, MysqlAdapter, PostgresAdapter, SchemaDocument, SchemaMigrator,
    StaticVersions,
};
use std::sync::Arc;

const USERS: &str = r#"{
    "postgres": {
        "tables": {
            "users": {
                "columns": {
                    "id": { "type": "uuid", "primary": true },
                    "email": { "type": "string" },
                    "nickname": { "type": "string", "since": 2.0 },
                    "legacy_code": { "type": "string", "removed_in": 3.0 }
                },
                "indexes": [
                    { "columns": ["email"], "unique": true },
                    { "name": "users_nickname_idx", "columns": ["nickname"], "since": "2.0" }
                ]
            },
            "audit_log": {
                "since": 4.0,
                "columns": { "id": { "type": "bigint", "primary": true } }
            }
        }
    }
}"#;

fn doc() -> SchemaDocument {
    SchemaDocument::from_json_str(USERS).unwrap()
}

fn migrator(driver: &Arc<FakeSqlDriver>, version: f64) -> SchemaMigrator {
    SchemaMigrator::new()
        .with_postgres(PostgresAdapter::new(driver.clone()).with_retry(fast_retry()))
        .with_versions(
            StaticVersions::new()
                .with(Engine::Postgres, "users", version)
                .with(Engine::Postgres, "audit_log", version),
        )
        .with_observer(RecordingObserver::new())
}

#[test]
fn test_future_column_is_never_added() {
    let driver = FakeSqlDriver::new().with_table(
        "users",
        &["id", "email", "legacy_code"],
        &["users_email_idx"],
    );
    let plan = migrator(&driver, 1.0)
        .plan_schema_changes(&doc(), &PlanOptions::all())
        .unwrap();

    let postgres = plan.engine(Engine::Postgres).unwrap();
    assert!(postgres.additions.is_empty());
    let nickname = postgres
        .future_items
        .iter()
        .find(|item| item.column.as_deref() == Some("nickname"))
        .unwrap();
    assert_eq!(nickname.reason.as_deref(), Some("since=2.0"));
    assert!(postgres
        .future_items
        .iter()
        .any(|item| item.kind == ElementKind::Table && item.table == "audit_log"));
}

#[test]
fn test_removed_column_is_reported() {
    let driver = FakeSqlDriver::new().with_table("users", &["id", "email", "legacy_code"], &[]);
    let plan = migrator(&driver, 3.0)
        .plan_schema_changes(&doc(), &PlanOptions::all())
        .unwrap();

    let postgres = plan.engine(Engine::Postgres).unwrap();
    let legacy = &postgres.removals_to_report[0];
    assert_eq!(legacy.column.as_deref(), Some("legacy_code"));
    assert_eq!(legacy.reason.as_deref(), Some("removed_in=3.0"));

    let added: Vec<&str> = postgres.additions.iter().map(|item| item.name()).collect();
    assert_eq!(added, vec!["nickname", "users_email_idx", "users_nickname_idx"]);
}

#[test]
fn test_additions_are_all_active() {
    let document = doc();
    for version in [1.0, 2.0, 3.0, 5.0] {
        let driver = FakeSqlDriver::new().with_table("users", &["id"], &[]);
        let plan = migrator(&driver, version)
            .plan_schema_changes(&document, &PlanOptions::all())
            .unwrap();

        let tables = &document.postgres.as_ref().unwrap().tables;
        for (_, item) in plan.additions() {
            let (logical, spec) = tables
                .iter()
                .find(|(logical, spec)| spec.physical_name(logical) == item.table)
                .unwrap();
            let element = if item.kind == ElementKind::Table {
                SchemaElement::relational_table(Engine::Postgres, logical, spec)
            } else {
                SchemaElement::relational_children(Engine::Postgres, &item.table, spec)
                    .into_iter()
                    .find(|child| child.kind() == item.kind && child.name() == item.name())
                    .unwrap()
            };
            assert!(
                element.classify(version).unwrap().active,
                "{element} is not active at {version}"
            );
        }
    }
}

#[test]
fn test_missing_table_bundles_columns() {
    let driver = FakeSqlDriver::new();
    let plan = migrator(&driver, 2.0)
        .plan_schema_changes(&doc(), &PlanOptions::all())
        .unwrap();

    let kinds: Vec<(ElementKind, &str)> = plan
        .additions()
        .map(|(_, item)| (item.kind, item.name()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ElementKind::Table, "users"),
            (ElementKind::Index, "users_email_idx"),
            (ElementKind::Index, "users_nickname_idx"),
        ]
    );
    // Only the table probe ran; children of a missing table are not probed.
    assert_eq!(driver.probes(), 1);
    assert!(driver.executed().is_empty());
}

#[test]
fn test_plan_meta() {
    let driver = FakeSqlDriver::new().with_table("users", &["id", "email"], &[]);
    let document = doc();
    let plan = migrator(&driver, 2.5)
        .plan_schema_changes(&document, &PlanOptions::all())
        .unwrap();

    assert_eq!(plan.meta.targets, vec![Engine::Postgres]);
    assert_eq!(plan.version(Engine::Postgres, "users"), Some(2.5));
    assert_eq!(plan.meta.document_checksum, document.checksum());

    let json = serde_json::to_value(&plan).unwrap();
    assert!(json["engines"]["postgres"]["additions"].is_array());
}

#[test]
fn test_targets_and_missing_adapters() {
    let both = r#"{
        "postgres": { "tables": { "users": { "columns": { "id": { "type": "uuid" } } } } },
        "mysql": { "tables": { "orders": { "columns": { "id": { "type": "bigint" } } } } }
    }"#;
    let document = SchemaDocument::from_json_str(both).unwrap();
    let postgres = FakeSqlDriver::new();
    let mysql = FakeSqlDriver::new();
    let observer = RecordingObserver::new();

    let postgres_only = SchemaMigrator::new()
        .with_postgres(PostgresAdapter::new(postgres.clone()))
        .with_versions(StaticVersions::new())
        .with_observer(observer.clone());
    let plan = postgres_only
        .plan_schema_changes(&document, &PlanOptions::all())
        .unwrap();
    assert_eq!(plan.meta.targets, vec![Engine::Postgres]);
    assert!(observer.logs.lock().iter().any(|(level, message)| {
        *level == log::Level::Debug && message.contains("without adapter")
    }));

    let with_mysql = SchemaMigrator::new()
        .with_postgres(PostgresAdapter::new(postgres.clone()))
        .with_mysql(MysqlAdapter::new(mysql.clone()))
        .with_versions(StaticVersions::new())
        .with_observer(observer);
    let plan = with_mysql
        .plan_schema_changes(&document, &PlanOptions::only(&[Engine::Mysql]))
        .unwrap();
    assert_eq!(plan.meta.targets, vec![Engine::Mysql]);
    assert_eq!(plan.addition_count(), 1);
}

#[test]
fn test_invalid_lifecycle_bounds_fail_planning() {
    let bad = r#"{ "postgres": { "tables": { "users": { "columns": {
        "id": { "type": "uuid", "since": 3.0, "removed_in": 2.0 }
    } } } } }"#;
    let driver = FakeSqlDriver::new().with_table("users", &["id"], &[]);
    let err = migrator(&driver, 1.0)
        .plan_schema_changes(&SchemaDocument::from_json_str(bad).unwrap(), &PlanOptions::all())
        .unwrap_err();
    assert!(matches!(err, schemaguard::MigrateError::Configuration(_)));
}

#[test]
fn test_missing_table_reports_no_child_lifecycle_items() {
    let document = SchemaDocument::from_json_str(
        r#"{
            "postgres": { "tables": { "events": {
                "columns": {
                    "id": { "type": "bigint", "primary": true },
                    "old_flag": { "type": "boolean", "removed_in": 1.5 },
                    "region": { "type": "string", "since": 3.0 }
                },
                "indexes": [
                    { "name": "events_id_idx", "columns": ["id"] },
                    { "name": "events_old_idx", "columns": ["id"], "removed_in": 1.0 }
                ]
            } } },
            "dynamodb": { "tables": { "events": {
                "PK": "id",
                "AttributeTypes": { "id": "S", "kind": "S", "userId": "S" },
                "GlobalSecondaryIndexes": [
                    { "IndexName": "old-index", "PK": "kind", "removed_in": 1.0 },
                    { "IndexName": "user-index", "PK": "userId" }
                ]
            } } }
        }"#,
    )
    .unwrap();
    let sql = FakeSqlDriver::new();
    let wide = FakeWideColumnDriver::new();
    let observer = RecordingObserver::new();
    let migrator = SchemaMigrator::new()
        .with_postgres(PostgresAdapter::new(sql.clone()).with_retry(fast_retry()))
        .with_dynamodb(DynamoAdapter::new(wide.clone()).with_retry(fast_retry()))
        .with_versions(
            StaticVersions::new()
                .with(Engine::Postgres, "events", 2.0)
                .with(Engine::Dynamodb, "events", 2.0),
        )
        .with_observer(observer.clone());

    let plan = migrator
        .plan_schema_changes(&document, &PlanOptions::all())
        .unwrap();

    for engine in [Engine::Postgres, Engine::Dynamodb] {
        let engine_plan = plan.engine(engine).unwrap();
        assert!(engine_plan.removals_to_report.is_empty(), "{engine}");
        assert!(engine_plan.future_items.is_empty(), "{engine}");
        assert_eq!(engine_plan.additions[0].kind, ElementKind::Table);
    }

    let postgres: Vec<&str> = plan
        .engine(Engine::Postgres)
        .unwrap()
        .additions
        .iter()
        .map(|item| item.name())
        .collect();
    assert_eq!(postgres, vec!["events", "events_id_idx"]);

    let dynamo = plan.engine(Engine::Dynamodb).unwrap();
    assert_eq!(dynamo.additions.len(), 1);
    assert_eq!(dynamo.additions[0].bundled_indexes, vec!["user-index".to_string()]);

    assert!(!observer
        .logs
        .lock()
        .iter()
        .any(|(level, _)| *level == log::Level::Warn));
}
