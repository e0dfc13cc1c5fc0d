//! Desired cluster state.
//!
//! This is the in-memory form of a bootstrap document:
//!
//! ```yaml
//! users:
//!   - name: app_owner
//!     password_env: APP_OWNER_PASSWORD
//!     can_login: true
//! databases:
//!   - name: app_db
//!     owner: app_owner
//!     extensions: ["uuid-ossp"]
//!     schemas:
//!       - name: public
//!         owner: app_owner
//!         grants:
//!           - role: readonly
//!             privileges: [USAGE]
//!             table_privileges: [SELECT]
//! ```
//!
//! Names are plain strings; nothing is cross-checked at load time.

use pgstrap_sql::Password;
use serde::Deserialize;

/// Root of a bootstrap document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DesiredState {
    pub users: Vec<RoleSpec>,
    pub databases: Vec<DatabaseSpec>,
}

impl DesiredState {
    /// Parse a YAML bootstrap document.
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Secret references named by any role, in document order.
    pub fn secret_references(&self) -> impl Iterator<Item = &str> {
        self.users.iter().filter_map(|u| given(&u.password_env))
    }
}

/// A role (user) to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoleSpec {
    pub name: String,

    /// Reference to the secret holding the password.
    #[serde(alias = "secret")]
    pub password_env: Option<String>,

    pub can_login: bool,

    /// Informational: schemas this role is expected to own.
    pub owns_schemas: Vec<String>,

    /// Roles this role becomes a member of.
    pub roles: Vec<String>,

    /// Resolved credential, filled in by [`DesiredState::resolve_secrets`].
    #[serde(skip)]
    pub password: Option<Password>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSpec {
    pub name: String,
    pub owner: Option<String>,
    pub encoding: Option<String>,
    pub lc_collate: Option<String>,
    pub lc_ctype: Option<String>,
    pub template: Option<String>,
    pub extensions: Vec<String>,
    pub grants: Vec<DatabaseGrant>,
    pub schemas: Vec<SchemaSpec>,
}

/// Privileges on a database for one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseGrant {
    #[serde(alias = "role")]
    pub user: String,
    pub privileges: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchemaSpec {
    pub name: String,
    pub owner: Option<String>,
    pub grants: Vec<SchemaGrant>,
}

/// Who a schema grant is for.
///
/// Documents spell this as a `user` / `role` field pair. Both are kept so that
/// a grant naming neither, or both, can be reported when it is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GrantSubject {
    User(String),
    Role(String),
    #[default]
    Unspecified,
    Ambiguous {
        user: String,
        role: String,
    },
}

impl GrantSubject {
    pub fn from_fields(user: Option<String>, role: Option<String>) -> Self {
        let user = user.filter(|u| !u.is_empty());
        let role = role.filter(|r| !r.is_empty());
        match (user, role) {
            (Some(user), None) => GrantSubject::User(user),
            (None, Some(role)) => GrantSubject::Role(role),
            (None, None) => GrantSubject::Unspecified,
            (Some(user), Some(role)) => GrantSubject::Ambiguous { user, role },
        }
    }

    /// The grantee name, if exactly one subject was given.
    pub fn name(&self) -> Option<&str> {
        match self {
            GrantSubject::User(name) | GrantSubject::Role(name) => Some(name.as_str()),
            GrantSubject::Unspecified | GrantSubject::Ambiguous { .. } => None,
        }
    }
}

/// One of the five privilege sets a schema grant can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantTier {
    Schema,
    Table,
    Sequence,
    Function,
    Default,
}

impl GrantTier {
    pub fn as_str(self) -> &'static str {
        match self {
            GrantTier::Schema => "privileges",
            GrantTier::Table => "table_privileges",
            GrantTier::Sequence => "sequence_privileges",
            GrantTier::Function => "function_privileges",
            GrantTier::Default => "default_privileges",
        }
    }
}

/// Access to a schema and the objects in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "SchemaGrantDoc")]
pub struct SchemaGrant {
    pub subject: GrantSubject,
    pub privileges: Vec<String>,
    pub table_privileges: Vec<String>,
    pub sequence_privileges: Vec<String>,
    pub function_privileges: Vec<String>,
    /// Applied to tables the schema owner creates later.
    pub default_privileges: Vec<String>,
}

impl SchemaGrant {
    /// Every tier with its privilege tokens, in the order they are applied.
    pub fn tiers(&self) -> [(GrantTier, &[String]); 5] {
        [
            (GrantTier::Schema, self.privileges.as_slice()),
            (GrantTier::Table, self.table_privileges.as_slice()),
            (GrantTier::Sequence, self.sequence_privileges.as_slice()),
            (GrantTier::Function, self.function_privileges.as_slice()),
            (GrantTier::Default, self.default_privileges.as_slice()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.tiers().iter().all(|(_, tokens)| tokens.is_empty())
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct SchemaGrantDoc {
    user: Option<String>,
    role: Option<String>,
    privileges: Vec<String>,
    table_privileges: Vec<String>,
    sequence_privileges: Vec<String>,
    function_privileges: Vec<String>,
    default_privileges: Vec<String>,
}

impl From<SchemaGrantDoc> for SchemaGrant {
    fn from(doc: SchemaGrantDoc) -> Self {
        Self {
            subject: GrantSubject::from_fields(doc.user, doc.role),
            privileges: doc.privileges,
            table_privileges: doc.table_privileges,
            sequence_privileges: doc.sequence_privileges,
            function_privileges: doc.function_privileges,
            default_privileges: doc.default_privileges,
        }
    }
}

/// An optional document field, treating an empty string as absent.
pub(crate) fn given(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
