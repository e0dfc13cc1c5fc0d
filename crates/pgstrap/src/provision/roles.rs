use pgstrap_sql::{CatalogObject, CreateRoleStmt, GrantRoleStmt, Stmt};

use super::{Outcome, Step};
use crate::traced::AdminConnection;
use crate::{Error, ErrorKind, RoleSpec, Stage};

/// Create missing roles and attach their memberships.
///
/// Existing roles are never altered. Memberships are granted whether or not
/// the role was just created.
pub async fn apply_roles<C: AdminConnection>(conn: &C, roles: &[RoleSpec]) -> Result<Outcome, Error> {
    let mut step = Step::new(conn, Stage::Roles);

    for role in roles {
        step.ensure(CatalogObject::role(&role.name), || create_role(role))
            .await?;

        for membership in &role.roles {
            let stmt = Stmt::from(GrantRoleStmt::new(membership, &role.name));
            step.grant(&role.name, &role.name, stmt).await?;
        }
    }

    Ok(step.finish())
}

fn create_role(role: &RoleSpec) -> Result<Stmt, ErrorKind> {
    let mut stmt = CreateRoleStmt::new(&role.name);
    if role.can_login {
        let password = role.password.clone().ok_or(ErrorKind::MissingCredential)?;
        stmt = stmt.login(password);
    }
    Ok(stmt.into())
}
