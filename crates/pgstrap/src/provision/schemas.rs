use pgstrap_sql::{
    AlterDefaultPrivilegesStmt, CatalogObject, CreateSchemaStmt, GrantStmt, GrantTarget,
    ObjectClass, Privilege, Stmt,
};
use tracing::warn;

use super::{Outcome, Step};
use crate::model::given;
use crate::traced::AdminConnection;
use crate::{Error, ErrorKind, GrantSubject, GrantTier, SchemaGrant, SchemaSpec, Stage};

const MISSING_SUBJECT: &str = "schema grant must specify either user or role";

/// Create missing schemas and apply their grants.
///
/// Each grant expands into up to five statements, one per non-empty tier.
/// Every grant in `schemas` is validated before the first statement is
/// issued, so a malformed grant leaves the database untouched.
pub async fn apply_schemas<C: AdminConnection>(
    conn: &C,
    database: &str,
    schemas: &[SchemaSpec],
) -> Result<Outcome, Error> {
    let mut step = Step::new(
        conn,
        Stage::Schemas {
            database: database.to_string(),
        },
    );

    let mut plans = Vec::with_capacity(schemas.len());
    for schema in schemas {
        let mut grants = Vec::with_capacity(schema.grants.len());
        for grant in &schema.grants {
            let subject = grantee(grant).map_err(|kind| step.fail(&schema.name, kind))?;
            let statements = grant_statements(schema, subject, grant)
                .map_err(|kind| step.fail(&schema.name, kind))?;
            grants.push((subject, statements));
        }
        plans.push((schema, grants));
    }

    for (schema, grants) in plans {
        step.ensure(CatalogObject::schema(&schema.name), || {
            let mut stmt = CreateSchemaStmt::new(&schema.name);
            if let Some(owner) = given(&schema.owner) {
                stmt = stmt.authorization(owner);
            }
            Ok(stmt.into())
        })
        .await?;

        for (subject, statements) in grants {
            if statements.is_empty() {
                warn!(schema = %schema.name, subject, "schema grant lists no privileges, skipping");
            }
            for stmt in statements {
                step.grant(&schema.name, subject, stmt).await?;
            }
        }
    }

    Ok(step.finish())
}

fn grantee(grant: &SchemaGrant) -> Result<&str, ErrorKind> {
    match &grant.subject {
        GrantSubject::User(name) | GrantSubject::Role(name) => Ok(name.as_str()),
        GrantSubject::Unspecified => Err(ErrorKind::InvalidGrant(MISSING_SUBJECT.to_string())),
        GrantSubject::Ambiguous { user, role } => Err(ErrorKind::InvalidGrant(format!(
            "{MISSING_SUBJECT}, not both (user {user:?}, role {role:?})"
        ))),
    }
}

/// The statements one grant expands to, in tier order.
fn grant_statements(
    schema: &SchemaSpec,
    subject: &str,
    grant: &SchemaGrant,
) -> Result<Vec<Stmt>, ErrorKind> {
    let mut statements = Vec::new();

    for (tier, tokens) in grant.tiers() {
        if tokens.is_empty() {
            continue;
        }
        let privileges = Privilege::parse_all(tokens)?;
        let in_schema = |class| GrantTarget::AllInSchema {
            class,
            schema: schema.name.clone(),
        };

        let stmt: Stmt = match tier {
            GrantTier::Schema => {
                GrantStmt::new(privileges, GrantTarget::Schema(schema.name.clone()), subject).into()
            }
            GrantTier::Table => GrantStmt::new(privileges, in_schema(ObjectClass::Tables), subject).into(),
            GrantTier::Sequence => {
                GrantStmt::new(privileges, in_schema(ObjectClass::Sequences), subject).into()
            }
            GrantTier::Function => {
                GrantStmt::new(privileges, in_schema(ObjectClass::Functions), subject).into()
            }
            GrantTier::Default => {
                let mut stmt = AlterDefaultPrivilegesStmt::new(
                    &schema.name,
                    privileges,
                    ObjectClass::Tables,
                    subject,
                );
                if let Some(owner) = given(&schema.owner) {
                    stmt = stmt.for_role(owner);
                }
                stmt.into()
            }
        };
        statements.push(stmt);
    }

    Ok(statements)
}
