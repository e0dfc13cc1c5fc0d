//! Administrative statements.

use crate::Privilege;

/// An administrative SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    CreateRole(CreateRoleStmt),
    GrantRole(GrantRoleStmt),
    CreateDatabase(CreateDatabaseStmt),
    CreateExtension(CreateExtensionStmt),
    CreateSchema(CreateSchemaStmt),
    Grant(GrantStmt),
    AlterDefaultPrivileges(AlterDefaultPrivilegesStmt),
}

impl Stmt {
    /// Whether this statement changes privileges rather than creating an object.
    pub fn is_grant(&self) -> bool {
        matches!(
            self,
            Stmt::GrantRole(_) | Stmt::Grant(_) | Stmt::AlterDefaultPrivileges(_)
        )
    }
}

// ============================================================================
// Roles
// ============================================================================

/// CREATE ROLE, optionally with LOGIN and a password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleStmt {
    pub name: String,
    pub login: Option<Password>,
}

/// A role password. Debug output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(********)")
    }
}

/// GRANT role TO member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRoleStmt {
    pub role: String,
    pub member: String,
}

// ============================================================================
// Databases, extensions, schemas
// ============================================================================

/// CREATE DATABASE with optional clauses.
///
/// Only the clauses that are `Some` are rendered, always in the order
/// owner, encoding, lc_collate, lc_ctype, template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDatabaseStmt {
    pub name: String,
    pub owner: Option<String>,
    pub encoding: Option<String>,
    pub lc_collate: Option<String>,
    pub lc_ctype: Option<String>,
    pub template: Option<String>,
}

/// CREATE EXTENSION [IF NOT EXISTS].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateExtensionStmt {
    pub name: String,
    pub if_not_exists: bool,
}

/// CREATE SCHEMA ... AUTHORIZATION owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSchemaStmt {
    pub name: String,
    pub authorization: Option<String>,
}

// ============================================================================
// Grants
// ============================================================================

/// Objects that can be targeted in bulk with `ALL <class> IN SCHEMA`,
/// or by default privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectClass {
    Tables,
    Sequences,
    Functions,
}

impl ObjectClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectClass::Tables => "TABLES",
            ObjectClass::Sequences => "SEQUENCES",
            ObjectClass::Functions => "FUNCTIONS",
        }
    }
}

/// What a GRANT applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GrantTarget {
    /// ON DATABASE name
    Database(String),
    /// ON SCHEMA name
    Schema(String),
    /// ON ALL <class> IN SCHEMA name
    AllInSchema { class: ObjectClass, schema: String },
}

/// GRANT privileges ON target TO grantee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantStmt {
    pub privileges: Vec<Privilege>,
    pub on: GrantTarget,
    pub to: String,
}

/// ALTER DEFAULT PRIVILEGES FOR ROLE owner IN SCHEMA schema GRANT ... ON class TO grantee.
///
/// Affects objects `for_role` creates in `schema` from now on; existing
/// objects are untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlterDefaultPrivilegesStmt {
    pub for_role: Option<String>,
    pub in_schema: String,
    pub privileges: Vec<Privilege>,
    pub on: ObjectClass,
    pub to: String,
}

// ============================================================================
// Builder-style constructors
// ============================================================================

impl CreateRoleStmt {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            login: None,
        }
    }

    pub fn login(mut self, password: Password) -> Self {
        self.login = Some(password);
        self
    }
}

impl GrantRoleStmt {
    pub fn new(role: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            member: member.into(),
        }
    }
}

impl CreateDatabaseStmt {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn lc_collate(mut self, lc_collate: impl Into<String>) -> Self {
        self.lc_collate = Some(lc_collate.into());
        self
    }

    pub fn lc_ctype(mut self, lc_ctype: impl Into<String>) -> Self {
        self.lc_ctype = Some(lc_ctype.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

impl CreateExtensionStmt {
    pub fn if_not_exists(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            if_not_exists: true,
        }
    }
}

impl CreateSchemaStmt {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorization: None,
        }
    }

    pub fn authorization(mut self, owner: impl Into<String>) -> Self {
        self.authorization = Some(owner.into());
        self
    }
}

impl GrantStmt {
    pub fn new(privileges: Vec<Privilege>, on: GrantTarget, to: impl Into<String>) -> Self {
        Self {
            privileges,
            on,
            to: to.into(),
        }
    }
}

impl AlterDefaultPrivilegesStmt {
    pub fn new(
        in_schema: impl Into<String>,
        privileges: Vec<Privilege>,
        on: ObjectClass,
        to: impl Into<String>,
    ) -> Self {
        Self {
            for_role: None,
            in_schema: in_schema.into(),
            privileges,
            on,
            to: to.into(),
        }
    }

    pub fn for_role(mut self, role: impl Into<String>) -> Self {
        self.for_role = Some(role.into());
        self
    }
}

impl From<CreateRoleStmt> for Stmt {
    fn from(s: CreateRoleStmt) -> Self {
        Stmt::CreateRole(s)
    }
}

impl From<GrantRoleStmt> for Stmt {
    fn from(s: GrantRoleStmt) -> Self {
        Stmt::GrantRole(s)
    }
}

impl From<CreateDatabaseStmt> for Stmt {
    fn from(s: CreateDatabaseStmt) -> Self {
        Stmt::CreateDatabase(s)
    }
}

impl From<CreateExtensionStmt> for Stmt {
    fn from(s: CreateExtensionStmt) -> Self {
        Stmt::CreateExtension(s)
    }
}

impl From<CreateSchemaStmt> for Stmt {
    fn from(s: CreateSchemaStmt) -> Self {
        Stmt::CreateSchema(s)
    }
}

impl From<GrantStmt> for Stmt {
    fn from(s: GrantStmt) -> Self {
        Stmt::Grant(s)
    }
}

impl From<AlterDefaultPrivilegesStmt> for Stmt {
    fn from(s: AlterDefaultPrivilegesStmt) -> Self {
        Stmt::AlterDefaultPrivileges(s)
    }
}
