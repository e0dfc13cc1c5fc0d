//! Warnings about a desired state that is probably not what was meant.
//!
//! Lints never stop a run; the server is the final judge of whether a name
//! resolves. Each lint has a stable code so callers can filter them.

use std::collections::HashSet;
use std::fmt;

use crate::model::given;
use crate::DesiredState;

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lint {
    pub code: &'static str,
    pub message: String,
}

impl Lint {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Lint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

pub const DUPLICATE_ROLE: &str = "duplicate-role";
pub const DUPLICATE_DATABASE: &str = "duplicate-database";
pub const DUPLICATE_SCHEMA: &str = "duplicate-schema";
pub const UNDECLARED_ROLE: &str = "undeclared-role";
pub const OWNS_SCHEMAS_MISMATCH: &str = "owns-schemas-mismatch";
pub const LOGIN_WITHOUT_SECRET: &str = "login-without-secret";
pub const EMPTY_GRANT: &str = "empty-grant";

impl DesiredState {
    /// Check the document for likely mistakes, in document order.
    pub fn lint(&self) -> Vec<Lint> {
        let mut lints = Vec::new();
        self.lint_roles(&mut lints);
        self.lint_databases(&mut lints);
        self.lint_references(&mut lints);
        self.lint_owned_schemas(&mut lints);
        lints
    }

    fn lint_roles(&self, lints: &mut Vec<Lint>) {
        let mut seen = HashSet::new();
        for role in &self.users {
            if !seen.insert(role.name.as_str()) {
                lints.push(Lint::new(
                    DUPLICATE_ROLE,
                    format!("role {:?} is declared more than once", role.name),
                ));
            }
            if role.can_login && given(&role.password_env).is_none() {
                lints.push(Lint::new(
                    LOGIN_WITHOUT_SECRET,
                    format!(
                        "role {:?} can log in but names no password_env; creating it will fail",
                        role.name
                    ),
                ));
            }
        }
    }

    fn lint_databases(&self, lints: &mut Vec<Lint>) {
        let mut seen = HashSet::new();
        for database in &self.databases {
            if !seen.insert(database.name.as_str()) {
                lints.push(Lint::new(
                    DUPLICATE_DATABASE,
                    format!("database {:?} is declared more than once", database.name),
                ));
            }

            let mut schemas = HashSet::new();
            for schema in &database.schemas {
                if !schemas.insert(schema.name.as_str()) {
                    lints.push(Lint::new(
                        DUPLICATE_SCHEMA,
                        format!(
                            "schema {:?} is declared more than once in database {:?}",
                            schema.name, database.name
                        ),
                    ));
                }
                for grant in &schema.grants {
                    if grant.is_empty() {
                        lints.push(Lint::new(
                            EMPTY_GRANT,
                            format!(
                                "grant on schema {:?} in database {:?} lists no privileges",
                                schema.name, database.name
                            ),
                        ));
                    }
                }
            }

            for grant in &database.grants {
                if grant.privileges.is_empty() {
                    lints.push(Lint::new(
                        EMPTY_GRANT,
                        format!(
                            "grant on database {:?} to {:?} lists no privileges",
                            database.name, grant.user
                        ),
                    ));
                }
            }
        }
    }

    /// Roles named as owners or grantees that `users` does not declare.
    fn lint_references(&self, lints: &mut Vec<Lint>) {
        let declared: HashSet<&str> = self.users.iter().map(|u| u.name.as_str()).collect();
        let mut reported = HashSet::new();
        let mut check = |name: &str, context: String| {
            if name.is_empty() || declared.contains(name) || !reported.insert(name.to_string()) {
                return;
            }
            lints.push(Lint::new(
                UNDECLARED_ROLE,
                format!("role {name:?} ({context}) is not declared in users; it must already exist"),
            ));
        };

        for role in &self.users {
            for membership in &role.roles {
                check(membership.as_str(), format!("membership of {:?}", role.name));
            }
        }
        for database in &self.databases {
            if let Some(owner) = given(&database.owner) {
                check(owner, format!("owner of database {:?}", database.name));
            }
            for grant in &database.grants {
                check(grant.user.as_str(), format!("grantee on database {:?}", database.name));
            }
            for schema in &database.schemas {
                if let Some(owner) = given(&schema.owner) {
                    check(owner, format!("owner of schema {:?}", schema.name));
                }
                for grant in &schema.grants {
                    if let Some(subject) = grant.subject.name() {
                        check(subject, format!("grantee on schema {:?}", schema.name));
                    }
                }
            }
        }
    }

    /// `owns_schemas` hints that disagree with the schemas' declared owners.
    fn lint_owned_schemas(&self, lints: &mut Vec<Lint>) {
        for role in &self.users {
            for hinted in &role.owns_schemas {
                let owners: Vec<(&str, Option<&str>)> = self
                    .databases
                    .iter()
                    .flat_map(|db| {
                        db.schemas
                            .iter()
                            .filter(|s| &s.name == hinted)
                            .map(move |s| (db.name.as_str(), given(&s.owner)))
                    })
                    .collect();

                if owners.is_empty() {
                    lints.push(Lint::new(
                        OWNS_SCHEMAS_MISMATCH,
                        format!(
                            "role {:?} is said to own schema {hinted:?}, which no database declares",
                            role.name
                        ),
                    ));
                    continue;
                }

                for (database, owner) in owners {
                    if owner != Some(role.name.as_str()) {
                        lints.push(Lint::new(
                            OWNS_SCHEMAS_MISMATCH,
                            format!(
                                "role {:?} is said to own schema {hinted:?}, but in database {database:?} its owner is {}",
                                role.name,
                                owner.map_or_else(|| "unset".to_string(), |o| format!("{o:?}")),
                            ),
                        ));
                    }
                }
            }
        }
    }
}
