//! Render statements to SQL text.

use std::cell::Cell;
use std::fmt;

use crate::stmt::*;
use crate::{Ident, Lit, Privilege, RenderedSql};

const REDACTED: &str = "********";

/// Rendering context.
///
/// Tracks whether secrets should be masked and whether any were, using a
/// `Cell` so that `Render::render` can take `&self`.
pub struct RenderContext {
    redact_secrets: bool,
    redacted: Cell<bool>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            redact_secrets: false,
            redacted: Cell::new(false),
        }
    }

    /// A context that replaces passwords with a placeholder.
    pub fn redacting() -> Self {
        Self {
            redact_secrets: true,
            redacted: Cell::new(false),
        }
    }

    fn write_secret(&self, f: &mut fmt::Formatter<'_>, secret: &Password) -> fmt::Result {
        if self.redact_secrets {
            self.redacted.set(true);
            write!(f, "{}", Lit(REDACTED))
        } else {
            write!(f, "{}", Lit(secret.expose()))
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper for rendering a value via Display.
pub struct Fmt<'a, T: Render>(&'a RenderContext, &'a T);

impl<T: Render> fmt::Display for Fmt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.1.render(self.0, f)
    }
}

/// Trait for types that can be rendered to SQL.
pub trait Render {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

fn write_privileges(f: &mut fmt::Formatter<'_>, privileges: &[Privilege]) -> fmt::Result {
    for (i, privilege) in privileges.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{privilege}")?;
    }
    Ok(())
}

impl Render for CreateRoleStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Ident(&self.name);
        write!(f, "CREATE ROLE {name}")?;
        if let Some(password) = &self.login {
            write!(f, " WITH LOGIN PASSWORD ")?;
            ctx.write_secret(f, password)?;
        }
        Ok(())
    }
}

impl Render for GrantRoleStmt {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = Ident(&self.role);
        let member = Ident(&self.member);
        write!(f, "GRANT {role} TO {member}")
    }
}

impl Render for CreateDatabaseStmt {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Ident(&self.name);
        write!(f, "CREATE DATABASE {name}")?;

        if let Some(owner) = &self.owner {
            write!(f, " OWNER {}", Ident(owner))?;
        }
        if let Some(encoding) = &self.encoding {
            write!(f, " ENCODING {}", Lit(encoding))?;
        }
        if let Some(lc_collate) = &self.lc_collate {
            write!(f, " LC_COLLATE {}", Lit(lc_collate))?;
        }
        if let Some(lc_ctype) = &self.lc_ctype {
            write!(f, " LC_CTYPE {}", Lit(lc_ctype))?;
        }
        if let Some(template) = &self.template {
            write!(f, " TEMPLATE {}", Ident(template))?;
        }

        Ok(())
    }
}

impl Render for CreateExtensionStmt {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE EXTENSION ")?;
        if self.if_not_exists {
            write!(f, "IF NOT EXISTS ")?;
        }
        write!(f, "{}", Ident(&self.name))
    }
}

impl Render for CreateSchemaStmt {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE SCHEMA {}", Ident(&self.name))?;
        if let Some(owner) = &self.authorization {
            write!(f, " AUTHORIZATION {}", Ident(owner))?;
        }
        Ok(())
    }
}

impl Render for GrantTarget {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantTarget::Database(name) => write!(f, "DATABASE {}", Ident(name)),
            GrantTarget::Schema(name) => write!(f, "SCHEMA {}", Ident(name)),
            GrantTarget::AllInSchema { class, schema } => {
                let class = class.as_str();
                write!(f, "ALL {class} IN SCHEMA {}", Ident(schema))
            }
        }
    }
}

impl Render for GrantStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GRANT ")?;
        write_privileges(f, &self.privileges)?;
        let on = Fmt(ctx, &self.on);
        let to = Ident(&self.to);
        write!(f, " ON {on} TO {to}")
    }
}

impl Render for AlterDefaultPrivilegesStmt {
    fn render(&self, _ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ALTER DEFAULT PRIVILEGES")?;
        if let Some(role) = &self.for_role {
            write!(f, " FOR ROLE {}", Ident(role))?;
        }
        write!(f, " IN SCHEMA {} GRANT ", Ident(&self.in_schema))?;
        write_privileges(f, &self.privileges)?;
        let on = self.on.as_str();
        let to = Ident(&self.to);
        write!(f, " ON {on} TO {to}")
    }
}

impl Render for Stmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::CreateRole(s) => s.render(ctx, f),
            Stmt::GrantRole(s) => s.render(ctx, f),
            Stmt::CreateDatabase(s) => s.render(ctx, f),
            Stmt::CreateExtension(s) => s.render(ctx, f),
            Stmt::CreateSchema(s) => s.render(ctx, f),
            Stmt::Grant(s) => s.render(ctx, f),
            Stmt::AlterDefaultPrivileges(s) => s.render(ctx, f),
        }
    }
}

// ============================================================================
// Convenience methods
// ============================================================================

/// Render a statement to SQL, secrets included.
pub fn render(stmt: &impl Render) -> RenderedSql {
    render_with(RenderContext::new(), stmt)
}

/// Render a statement to SQL with secrets masked, for logs and plans.
pub fn render_redacted(stmt: &impl Render) -> RenderedSql {
    render_with(RenderContext::redacting(), stmt)
}

fn render_with(ctx: RenderContext, stmt: &impl Render) -> RenderedSql {
    let sql = format!("{}", Fmt(&ctx, stmt));
    RenderedSql {
        sql,
        redacted: ctx.redacted.get(),
    }
}
