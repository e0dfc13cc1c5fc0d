use pgstrap_sql::{CatalogObject, CreateDatabaseStmt, GrantStmt, GrantTarget, Privilege, Stmt};
use tracing::warn;

use super::{Outcome, Step};
use crate::model::given;
use crate::traced::AdminConnection;
use crate::{DatabaseSpec, Error, ErrorKind, Stage};

/// Create missing databases and apply their database-level grants.
///
/// Grants run for every database, new or not, one GRANT per entry with the
/// privileges in document order. A grant with no privileges issues nothing and
/// only logs a warning, since a GRANT needs at least one privilege.
pub async fn apply_databases<C: AdminConnection>(
    conn: &C,
    databases: &[DatabaseSpec],
) -> Result<Outcome, Error> {
    let mut step = Step::new(conn, Stage::Databases);

    for database in databases {
        step.ensure(CatalogObject::database(&database.name), || {
            Ok(create_database(database))
        })
        .await?;

        for grant in &database.grants {
            if grant.user.is_empty() {
                return Err(step.fail(
                    &database.name,
                    ErrorKind::InvalidGrant("database grant must specify a user".into()),
                ));
            }
            if grant.privileges.is_empty() {
                warn!(database = %database.name, user = %grant.user, "database grant lists no privileges, skipping");
                continue;
            }

            let privileges = Privilege::parse_all(&grant.privileges)
                .map_err(|e| step.fail(&database.name, e.into()))?;
            let stmt = GrantStmt::new(
                privileges,
                GrantTarget::Database(database.name.clone()),
                &grant.user,
            );
            step.grant(&database.name, &grant.user, stmt.into()).await?;
        }
    }

    Ok(step.finish())
}

/// Only clauses with a value are emitted.
fn create_database(database: &DatabaseSpec) -> Stmt {
    let mut stmt = CreateDatabaseStmt::new(&database.name);
    if let Some(owner) = given(&database.owner) {
        stmt = stmt.owner(owner);
    }
    if let Some(encoding) = given(&database.encoding) {
        stmt = stmt.encoding(encoding);
    }
    if let Some(lc_collate) = given(&database.lc_collate) {
        stmt = stmt.lc_collate(lc_collate);
    }
    if let Some(lc_ctype) = given(&database.lc_ctype) {
        stmt = stmt.lc_ctype(lc_ctype);
    }
    if let Some(template) = given(&database.template) {
        stmt = stmt.template(template);
    }
    stmt.into()
}
