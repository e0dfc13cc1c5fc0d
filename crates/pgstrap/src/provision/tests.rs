use pgstrap_sql::{ObjectKind, Password, Stmt};

use super::*;
use crate::traced::Connector;
use crate::{
    DatabaseGrant, DatabaseSpec, GrantSubject, MemoryConnection, MemoryConnector, RoleSpec,
    SchemaGrant, SchemaSpec,
};

async fn connect(connector: &MemoryConnector, database: Option<&str>) -> MemoryConnection {
    connector.connect(database).await.unwrap()
}

fn login_role(name: &str, password: &str) -> RoleSpec {
    RoleSpec {
        name: name.into(),
        can_login: true,
        password: Some(Password::new(password)),
        ..Default::default()
    }
}

fn group_role(name: &str) -> RoleSpec {
    RoleSpec {
        name: name.into(),
        ..Default::default()
    }
}

fn database(name: &str, owner: &str) -> DatabaseSpec {
    DatabaseSpec {
        name: name.into(),
        owner: Some(owner.into()),
        ..Default::default()
    }
}

fn schema(name: &str, owner: &str, grants: Vec<SchemaGrant>) -> SchemaSpec {
    SchemaSpec {
        name: name.into(),
        owner: Some(owner.into()),
        grants,
    }
}

fn tokens(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn cluster_with_app_db() -> MemoryConnector {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;
    apply_roles(
        &conn,
        &[login_role("app_owner", "secret"), group_role("readonly")],
    )
    .await
    .unwrap();
    apply_databases(&conn, &[database("app_db", "app_owner")])
        .await
        .unwrap();
    connector.clear_log();
    connector
}

// ============================================================================
// Roles
// ============================================================================

#[tokio::test]
async fn test_roles_create_then_grant_memberships() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let mut reporter = login_role("reporter", "pw");
    reporter.roles = tokens(&["readonly"]);
    let outcome = apply_roles(&conn, &[group_role("readonly"), reporter])
        .await
        .unwrap();

    assert_eq!(
        connector.executed_sql(),
        [
            r#"CREATE ROLE "readonly""#,
            r#"CREATE ROLE "reporter" WITH LOGIN PASSWORD 'pw'"#,
            r#"GRANT "readonly" TO "reporter""#,
        ]
    );
    assert_eq!(outcome.created.len(), 2);
    assert!(outcome.present.is_empty());
    assert!(connector.catalog().roles["reporter"].member_of.contains("readonly"));
}

#[tokio::test]
async fn test_existing_role_is_skipped_but_memberships_reapplied() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let mut postgres = group_role("postgres");
    postgres.roles = tokens(&["readonly"]);
    let outcome = apply_roles(&conn, &[group_role("readonly"), postgres])
        .await
        .unwrap();

    assert_eq!(outcome.present, [CatalogObject::role("postgres")]);
    assert_eq!(
        connector.executed_sql(),
        [r#"CREATE ROLE "readonly""#, r#"GRANT "readonly" TO "postgres""#]
    );
}

#[tokio::test]
async fn test_login_role_without_credential_fails() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let role = RoleSpec {
        name: "app_owner".into(),
        can_login: true,
        ..Default::default()
    };
    let err = apply_roles(&conn, &[role]).await.unwrap_err();

    assert_eq!(err.stage, Stage::Roles);
    assert_eq!(err.object, "app_owner");
    assert!(matches!(err.kind, ErrorKind::MissingCredential));
    assert!(connector.executed().is_empty());
}

#[tokio::test]
async fn test_existing_login_role_needs_no_credential() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let role = RoleSpec {
        name: "postgres".into(),
        can_login: true,
        ..Default::default()
    };
    apply_roles(&conn, &[role]).await.unwrap();
    assert!(connector.executed().is_empty());
}

#[tokio::test]
async fn test_membership_in_unknown_role_aborts_with_role_name() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let mut reporter = group_role("reporter");
    reporter.roles = tokens(&["nonexistent"]);
    let after = group_role("after");
    let err = apply_roles(&conn, &[reporter, after]).await.unwrap_err();

    assert_eq!(err.object, "reporter");
    assert!(matches!(err.kind, ErrorKind::Grant { ref subject, .. } if subject == "reporter"));
    // The stage stopped at the first failure.
    assert!(!connector.catalog().roles.contains_key("after"));
}

#[tokio::test]
async fn test_existence_check_failure_is_reported() {
    let connector = MemoryConnector::new();
    connector.fail_exists(ObjectKind::Role);
    let conn = connect(&connector, None).await;

    let err = apply_roles(&conn, &[group_role("readonly")])
        .await
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ExistenceCheck { .. }));
    assert!(connector.executed().is_empty());
}

// ============================================================================
// Databases
// ============================================================================

#[tokio::test]
async fn test_database_with_name_and_owner_only() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;
    apply_roles(&conn, &[group_role("app_owner")]).await.unwrap();
    connector.clear_log();

    apply_databases(&conn, &[database("app_db", "app_owner")])
        .await
        .unwrap();

    assert_eq!(
        connector.executed_sql(),
        [r#"CREATE DATABASE "app_db" OWNER "app_owner""#]
    );
}

#[tokio::test]
async fn test_database_full_clause_set_and_grants() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;
    apply_roles(&conn, &[group_role("app_owner"), group_role("app_user")])
        .await
        .unwrap();
    connector.clear_log();

    let spec = DatabaseSpec {
        encoding: Some("UTF8".into()),
        lc_collate: Some("C".into()),
        lc_ctype: Some("C".into()),
        template: Some("template0".into()),
        grants: vec![
            DatabaseGrant {
                user: "app_user".into(),
                privileges: tokens(&["CONNECT", "TEMPORARY"]),
            },
            DatabaseGrant {
                user: "app_owner".into(),
                privileges: tokens(&["ALL PRIVILEGES"]),
            },
        ],
        ..database("app_db", "app_owner")
    };
    apply_databases(&conn, &[spec]).await.unwrap();

    assert_eq!(
        connector.executed_sql(),
        [
            r#"CREATE DATABASE "app_db" OWNER "app_owner" ENCODING 'UTF8' LC_COLLATE 'C' LC_CTYPE 'C' TEMPLATE "template0""#,
            r#"GRANT CONNECT, TEMPORARY ON DATABASE "app_db" TO "app_user""#,
            r#"GRANT ALL PRIVILEGES ON DATABASE "app_db" TO "app_owner""#,
        ]
    );
    assert_eq!(
        connector.catalog().databases["app_db"].encoding.as_deref(),
        Some("UTF8")
    );
}

#[tokio::test]
async fn test_empty_optional_fields_are_omitted() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let spec = DatabaseSpec {
        name: "scratch".into(),
        owner: Some(String::new()),
        encoding: Some(String::new()),
        ..Default::default()
    };
    apply_databases(&conn, &[spec]).await.unwrap();
    assert_eq!(connector.executed_sql(), [r#"CREATE DATABASE "scratch""#]);
}

#[tokio::test]
async fn test_existing_database_still_gets_grants() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let spec = DatabaseSpec {
        grants: vec![DatabaseGrant {
            user: "postgres".into(),
            privileges: tokens(&["CONNECT"]),
        }],
        ..database("postgres", "postgres")
    };
    let outcome = apply_databases(&conn, &[spec]).await.unwrap();

    assert_eq!(outcome.present, [CatalogObject::database("postgres")]);
    assert_eq!(
        connector.executed_sql(),
        [r#"GRANT CONNECT ON DATABASE "postgres" TO "postgres""#]
    );
}

#[tokio::test]
async fn test_database_grant_without_privileges_is_skipped() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let spec = DatabaseSpec {
        grants: vec![
            DatabaseGrant {
                user: "postgres".into(),
                privileges: Vec::new(),
            },
            DatabaseGrant {
                user: "postgres".into(),
                privileges: tokens(&["TEMP"]),
            },
        ],
        ..database("postgres", "postgres")
    };
    apply_databases(&conn, &[spec]).await.unwrap();

    assert_eq!(
        connector.executed_sql(),
        [r#"GRANT TEMP ON DATABASE "postgres" TO "postgres""#]
    );
}

#[tokio::test]
async fn test_databases_before_roles_fails_on_missing_owner() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let err = apply_databases(&conn, &[database("app_db", "app_owner")])
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Databases);
    assert_eq!(err.object, "app_db");
    assert!(matches!(err.kind, ErrorKind::Creation { .. }));
    assert!(
        std::error::Error::source(&err)
            .unwrap()
            .to_string()
            .contains("role \"app_owner\" does not exist")
    );
}

#[tokio::test]
async fn test_invalid_database_privilege_is_rejected() {
    let connector = MemoryConnector::new();
    let conn = connect(&connector, None).await;

    let spec = DatabaseSpec {
        grants: vec![DatabaseGrant {
            user: "postgres".into(),
            privileges: tokens(&["CONNECT; DROP DATABASE postgres"]),
        }],
        ..database("postgres", "postgres")
    };
    let err = apply_databases(&conn, &[spec]).await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidPrivilege(_)));
    assert!(connector.executed().is_empty());
}

// ============================================================================
// Extensions
// ============================================================================

#[tokio::test]
async fn test_extensions_are_created_once() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;
    let extensions = tokens(&["uuid-ossp", "pgcrypto"]);

    let first = apply_extensions(&conn, "app_db", &extensions).await.unwrap();
    let second = apply_extensions(&conn, "app_db", &extensions).await.unwrap();

    assert_eq!(first.created.len(), 2);
    assert_eq!(second.present.len(), 2);
    assert_eq!(
        connector.executed_sql(),
        [
            r#"CREATE EXTENSION IF NOT EXISTS "uuid-ossp""#,
            r#"CREATE EXTENSION IF NOT EXISTS "pgcrypto""#,
        ]
    );
    assert!(connector.executed().iter().all(|(db, _)| db == "app_db"));
}

#[tokio::test]
async fn test_extension_failure_names_database_and_extension() {
    let connector = cluster_with_app_db().await;
    connector.fail_execute(|stmt| matches!(stmt, Stmt::CreateExtension(_)));
    let conn = connect(&connector, Some("app_db")).await;

    let err = apply_extensions(&conn, "app_db", &tokens(&["postgis"]))
        .await
        .unwrap_err();
    assert_eq!(
        err.stage,
        Stage::Extensions {
            database: "app_db".into()
        }
    );
    assert_eq!(err.object, "postgis");
}

// ============================================================================
// Schemas
// ============================================================================

#[tokio::test]
async fn test_schema_grant_without_subject_issues_nothing() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;

    let grant = SchemaGrant {
        privileges: tokens(&["USAGE"]),
        table_privileges: tokens(&["SELECT"]),
        ..Default::default()
    };
    let err = apply_schemas(&conn, "app_db", &[schema("app", "app_owner", vec![grant])])
        .await
        .unwrap_err();

    assert_eq!(err.object, "app");
    match &err.kind {
        ErrorKind::InvalidGrant(reason) => {
            assert!(reason.contains("schema grant must specify either user or role"))
        }
        other => panic!("expected InvalidGrant, got {other:?}"),
    }
    assert!(err.to_string().contains("schema grant must specify either user or role"));
    assert!(connector.executed().is_empty());
}

#[tokio::test]
async fn test_schema_grant_with_both_subjects_is_rejected() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;

    let grant = SchemaGrant {
        subject: GrantSubject::from_fields(Some("app_owner".into()), Some("readonly".into())),
        privileges: tokens(&["USAGE"]),
        ..Default::default()
    };
    let err = apply_schemas(&conn, "app_db", &[schema("app", "app_owner", vec![grant])])
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::InvalidGrant(ref reason) if reason.contains("not both")));
    assert!(connector.executed().is_empty());
}

#[tokio::test]
async fn test_only_table_tier_emits_one_grant() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;

    let grant = SchemaGrant {
        subject: GrantSubject::Role("readonly".into()),
        table_privileges: tokens(&["SELECT"]),
        ..Default::default()
    };
    apply_schemas(&conn, "app_db", &[schema("app", "app_owner", vec![grant])])
        .await
        .unwrap();

    let grants: Vec<String> = connector
        .executed()
        .iter()
        .filter(|(_, stmt)| stmt.is_grant())
        .map(|(_, stmt)| pgstrap_sql::render(stmt).sql)
        .collect();
    assert_eq!(
        grants,
        [r#"GRANT SELECT ON ALL TABLES IN SCHEMA "app" TO "readonly""#]
    );
}

#[tokio::test]
async fn test_all_five_tiers() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;

    let grant = SchemaGrant {
        subject: GrantSubject::User("readonly".into()),
        privileges: tokens(&["USAGE"]),
        table_privileges: tokens(&["SELECT"]),
        sequence_privileges: tokens(&["USAGE", "SELECT"]),
        function_privileges: tokens(&["EXECUTE"]),
        default_privileges: tokens(&["SELECT"]),
    };
    apply_schemas(&conn, "app_db", &[schema("app", "app_owner", vec![grant])])
        .await
        .unwrap();

    assert_eq!(
        connector.executed_sql(),
        [
            r#"CREATE SCHEMA "app" AUTHORIZATION "app_owner""#,
            r#"GRANT USAGE ON SCHEMA "app" TO "readonly""#,
            r#"GRANT SELECT ON ALL TABLES IN SCHEMA "app" TO "readonly""#,
            r#"GRANT USAGE, SELECT ON ALL SEQUENCES IN SCHEMA "app" TO "readonly""#,
            r#"GRANT EXECUTE ON ALL FUNCTIONS IN SCHEMA "app" TO "readonly""#,
            r#"ALTER DEFAULT PRIVILEGES FOR ROLE "app_owner" IN SCHEMA "app" GRANT SELECT ON TABLES TO "readonly""#,
        ]
    );

    let catalog = connector.catalog();
    let app = &catalog.databases["app_db"].schemas["app"];
    assert_eq!(app.owner, "app_owner");
    assert_eq!(app.default_acl.len(), 1);
}

#[tokio::test]
async fn test_default_privileges_without_owner_omit_for_role() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;

    let grant = SchemaGrant {
        subject: GrantSubject::Role("readonly".into()),
        default_privileges: tokens(&["SELECT"]),
        ..Default::default()
    };
    let ownerless = SchemaSpec {
        name: "a".into(),
        owner: None,
        grants: vec![grant],
    };
    apply_schemas(&conn, "app_db", &[ownerless]).await.unwrap();

    assert_eq!(
        connector.executed_sql(),
        [
            r#"CREATE SCHEMA "a""#,
            r#"ALTER DEFAULT PRIVILEGES IN SCHEMA "a" GRANT SELECT ON TABLES TO "readonly""#,
        ]
    );
    // The rule belongs to whoever ran it.
    let catalog = connector.catalog();
    let acl = &catalog.databases["app_db"].schemas["a"].default_acl;
    assert!(acl.iter().all(|entry| entry.for_role == "postgres"));
}

#[tokio::test]
async fn test_malformed_grant_on_later_schema_blocks_earlier_schemas() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;

    let valid = SchemaGrant {
        subject: GrantSubject::Role("readonly".into()),
        privileges: tokens(&["USAGE"]),
        ..Default::default()
    };
    let err = apply_schemas(
        &conn,
        "app_db",
        &[
            schema("c", "app_owner", vec![valid]),
            schema("b", "app_owner", vec![SchemaGrant::default()]),
        ],
    )
    .await
    .unwrap_err();

    assert_eq!(err.object, "b");
    assert!(matches!(err.kind, ErrorKind::InvalidGrant(_)));
    assert!(connector.executed().is_empty());
    assert!(!connector.catalog().databases["app_db"].schemas.contains_key("c"));
}

#[tokio::test]
async fn test_existing_schema_is_not_recreated() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;
    let schemas = [schema("app", "app_owner", vec![])];

    apply_schemas(&conn, "app_db", &schemas).await.unwrap();
    let second = apply_schemas(&conn, "app_db", &schemas).await.unwrap();

    assert_eq!(second.present, [CatalogObject::schema("app")]);
    assert_eq!(connector.executed().len(), 1);
}

#[tokio::test]
async fn test_grant_failure_names_schema_and_subject() {
    let connector = cluster_with_app_db().await;
    let conn = connect(&connector, Some("app_db")).await;

    let grant = SchemaGrant {
        subject: GrantSubject::Role("ghost".into()),
        privileges: tokens(&["USAGE"]),
        ..Default::default()
    };
    let err = apply_schemas(&conn, "app_db", &[schema("app", "app_owner", vec![grant])])
        .await
        .unwrap_err();

    assert_eq!(err.object, "app");
    match &err.kind {
        ErrorKind::Grant { subject, sql, .. } => {
            assert_eq!(subject, "ghost");
            assert_eq!(sql, r#"GRANT USAGE ON SCHEMA "app" TO "ghost""#);
        }
        other => panic!("expected Grant, got {other:?}"),
    }
}
