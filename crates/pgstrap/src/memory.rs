//! An in-memory cluster catalog.
//!
//! [`MemoryConnector`] interprets [`Stmt`]s against a set-based model of a
//! Postgres cluster and enforces the same referential rules a server does:
//! roles named as owners or grantees must exist, creating something twice
//! fails, schemas and extensions belong to the database the connection is
//! scoped to. A fresh cluster has the `postgres` role and the `postgres`,
//! `template0` and `template1` databases, none of which carry schemas.
//!
//! Offline dry-runs plan against it; tests use it to observe exact command
//! sequences and to inject failures.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pgstrap_sql::{CatalogObject, GrantTarget, ObjectClass, ObjectKind, Stmt, render};

use crate::traced::{AdminConnection, BoxFuture, Connector};
use crate::BackendError;

const BOOTSTRAP_ROLE: &str = "postgres";
const DEFAULT_DATABASE: &str = "postgres";

/// An error raised by the in-memory catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MemoryError(pub String);

fn fail(message: String) -> BackendError {
    Box::new(MemoryError(message))
}

/// Catalog state, comparable between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub roles: BTreeMap<String, RoleEntry>,
    pub databases: BTreeMap<String, DatabaseEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleEntry {
    pub login: bool,
    pub member_of: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseEntry {
    pub owner: String,
    pub encoding: Option<String>,
    pub lc_collate: Option<String>,
    pub lc_ctype: Option<String>,
    pub acl: BTreeSet<AclEntry>,
    pub extensions: BTreeSet<String>,
    pub schemas: BTreeMap<String, SchemaEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaEntry {
    pub owner: String,
    pub acl: BTreeSet<AclEntry>,
    pub default_acl: BTreeSet<DefaultAclEntry>,
}

/// What a privilege was granted on, relative to its owning database or schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AclScope {
    Object,
    AllIn(ObjectClass),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AclEntry {
    pub scope: AclScope,
    pub grantee: String,
    pub privilege: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DefaultAclEntry {
    pub for_role: String,
    pub class: ObjectClass,
    pub grantee: String,
    pub privilege: String,
}

impl Default for Catalog {
    fn default() -> Self {
        let mut roles = BTreeMap::new();
        roles.insert(
            BOOTSTRAP_ROLE.to_string(),
            RoleEntry {
                login: true,
                ..Default::default()
            },
        );

        let databases = ["postgres", "template0", "template1"]
            .into_iter()
            .map(|name| {
                let entry = DatabaseEntry {
                    owner: BOOTSTRAP_ROLE.to_string(),
                    ..Default::default()
                };
                (name.to_string(), entry)
            })
            .collect();

        Self { roles, databases }
    }
}

impl Catalog {
    fn require_role(&self, name: &str) -> Result<(), BackendError> {
        if self.roles.contains_key(name) {
            Ok(())
        } else {
            Err(fail(format!("role \"{name}\" does not exist")))
        }
    }

    fn database_mut(&mut self, name: &str) -> Result<&mut DatabaseEntry, BackendError> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| fail(format!("database \"{name}\" does not exist")))
    }

    fn schema_mut(&mut self, database: &str, schema: &str) -> Result<&mut SchemaEntry, BackendError> {
        self.database_mut(database)?
            .schemas
            .get_mut(schema)
            .ok_or_else(|| fail(format!("schema \"{schema}\" does not exist")))
    }

    fn exists(&self, database: &str, object: &CatalogObject) -> bool {
        let name = object.name.as_str();
        match object.kind {
            ObjectKind::Role => self.roles.contains_key(name),
            ObjectKind::Database => self.databases.contains_key(name),
            ObjectKind::Schema => self
                .databases
                .get(database)
                .is_some_and(|db| db.schemas.contains_key(name)),
            ObjectKind::Extension => self
                .databases
                .get(database)
                .is_some_and(|db| db.extensions.contains(name)),
        }
    }

    fn apply(&mut self, database: &str, stmt: &Stmt) -> Result<(), BackendError> {
        match stmt {
            Stmt::CreateRole(s) => {
                if self.roles.contains_key(&s.name) {
                    return Err(fail(format!("role \"{}\" already exists", s.name)));
                }
                let entry = RoleEntry {
                    login: s.login.is_some(),
                    ..Default::default()
                };
                self.roles.insert(s.name.clone(), entry);
            }
            Stmt::GrantRole(s) => {
                self.require_role(&s.role)?;
                self.require_role(&s.member)?;
                if let Some(member) = self.roles.get_mut(&s.member) {
                    member.member_of.insert(s.role.clone());
                }
            }
            Stmt::CreateDatabase(s) => {
                if self.databases.contains_key(&s.name) {
                    return Err(fail(format!("database \"{}\" already exists", s.name)));
                }
                let owner = s.owner.clone().unwrap_or_else(|| BOOTSTRAP_ROLE.to_string());
                self.require_role(&owner)?;
                if let Some(template) = &s.template {
                    if !self.databases.contains_key(template) {
                        return Err(fail(format!(
                            "template database \"{template}\" does not exist"
                        )));
                    }
                }
                let entry = DatabaseEntry {
                    owner,
                    encoding: s.encoding.clone(),
                    lc_collate: s.lc_collate.clone(),
                    lc_ctype: s.lc_ctype.clone(),
                    ..Default::default()
                };
                self.databases.insert(s.name.clone(), entry);
            }
            Stmt::CreateExtension(s) => {
                let db = self.database_mut(database)?;
                if !db.extensions.insert(s.name.clone()) && !s.if_not_exists {
                    return Err(fail(format!("extension \"{}\" already exists", s.name)));
                }
            }
            Stmt::CreateSchema(s) => {
                let owner = s
                    .authorization
                    .clone()
                    .unwrap_or_else(|| BOOTSTRAP_ROLE.to_string());
                self.require_role(&owner)?;
                let db = self.database_mut(database)?;
                if db.schemas.contains_key(&s.name) {
                    return Err(fail(format!("schema \"{}\" already exists", s.name)));
                }
                db.schemas.insert(
                    s.name.clone(),
                    SchemaEntry {
                        owner,
                        ..Default::default()
                    },
                );
            }
            Stmt::Grant(s) => {
                self.require_role(&s.to)?;
                let (acl, scope) = match &s.on {
                    GrantTarget::Database(name) => (&mut self.database_mut(name)?.acl, AclScope::Object),
                    GrantTarget::Schema(name) => {
                        (&mut self.schema_mut(database, name)?.acl, AclScope::Object)
                    }
                    GrantTarget::AllInSchema { class, schema } => (
                        &mut self.schema_mut(database, schema)?.acl,
                        AclScope::AllIn(*class),
                    ),
                };
                for privilege in &s.privileges {
                    acl.insert(AclEntry {
                        scope,
                        grantee: s.to.clone(),
                        privilege: privilege.to_string(),
                    });
                }
            }
            Stmt::AlterDefaultPrivileges(s) => {
                let for_role = s
                    .for_role
                    .clone()
                    .unwrap_or_else(|| BOOTSTRAP_ROLE.to_string());
                self.require_role(&for_role)?;
                self.require_role(&s.to)?;
                let schema = self.schema_mut(database, &s.in_schema)?;
                for privilege in &s.privileges {
                    schema.default_acl.insert(DefaultAclEntry {
                        for_role: for_role.clone(),
                        class: s.on,
                        grantee: s.to.clone(),
                        privilege: privilege.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

type StmtMatcher = Box<dyn Fn(&Stmt) -> bool + Send>;

#[derive(Default)]
struct Cluster {
    catalog: Catalog,
    /// Executed statements with the database they ran in.
    log: Vec<(String, Stmt)>,
    open_connections: usize,
    closed_connections: usize,
    fail_connect: BTreeSet<String>,
    fail_exists: HashSet<ObjectKind>,
    fail_execute: Vec<StmtMatcher>,
}

/// Hands out connections to a shared in-memory cluster.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    cluster: Arc<Mutex<Cluster>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Cluster> {
        self.cluster.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current catalog.
    pub fn catalog(&self) -> Catalog {
        self.lock().catalog.clone()
    }

    /// Every statement executed so far, rendered, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.lock()
            .log
            .iter()
            .map(|(_, stmt)| render(stmt).sql)
            .collect()
    }

    /// Every statement executed so far, with the database it ran in.
    pub fn executed(&self) -> Vec<(String, Stmt)> {
        self.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Connections handed out and not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    /// Connections closed explicitly rather than dropped.
    pub fn closed_connections(&self) -> usize {
        self.lock().closed_connections
    }

    /// Make connecting to `database` fail.
    pub fn fail_connect(&self, database: impl Into<String>) {
        self.lock().fail_connect.insert(database.into());
    }

    /// Make every existence check for `kind` fail.
    pub fn fail_exists(&self, kind: ObjectKind) {
        self.lock().fail_exists.insert(kind);
    }

    /// Make executing any statement matching `matcher` fail.
    pub fn fail_execute(&self, matcher: impl Fn(&Stmt) -> bool + Send + 'static) {
        self.lock().fail_execute.push(Box::new(matcher));
    }

    fn open(&self, database: Option<&str>) -> Result<MemoryConnection, BackendError> {
        let database = database.unwrap_or(DEFAULT_DATABASE);
        let mut cluster = self.lock();
        if cluster.fail_connect.contains(database) {
            return Err(fail(format!("connection to database \"{database}\" refused")));
        }
        if !cluster.catalog.databases.contains_key(database) {
            return Err(fail(format!("database \"{database}\" does not exist")));
        }
        cluster.open_connections += 1;
        Ok(MemoryConnection {
            cluster: Arc::clone(&self.cluster),
            database: database.to_string(),
        })
    }
}

impl Connector for MemoryConnector {
    type Conn = MemoryConnection;

    fn connect<'a>(
        &'a self,
        database: Option<&'a str>,
    ) -> BoxFuture<'a, Result<MemoryConnection, BackendError>> {
        Box::pin(std::future::ready(self.open(database)))
    }
}

/// A connection to one database of a [`MemoryConnector`] cluster.
pub struct MemoryConnection {
    cluster: Arc<Mutex<Cluster>>,
    database: String,
}

impl MemoryConnection {
    fn lock(&self) -> MutexGuard<'_, Cluster> {
        self.cluster.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn probe(&self, object: &CatalogObject) -> Result<bool, BackendError> {
        let cluster = self.lock();
        if cluster.fail_exists.contains(&object.kind) {
            return Err(fail(format!("catalog lookup for {object} failed")));
        }
        Ok(cluster.catalog.exists(&self.database, object))
    }

    fn run(&self, stmt: &Stmt) -> Result<(), BackendError> {
        let mut cluster = self.lock();
        if cluster.fail_execute.iter().any(|matches| matches(stmt)) {
            return Err(fail(format!("injected failure: {}", render(stmt).sql)));
        }
        cluster.catalog.apply(&self.database, stmt)?;
        cluster.log.push((self.database.clone(), stmt.clone()));
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut cluster = self.lock();
        cluster.open_connections = cluster.open_connections.saturating_sub(1);
    }
}

impl AdminConnection for MemoryConnection {
    fn exists<'a>(&'a self, object: &'a CatalogObject) -> BoxFuture<'a, Result<bool, BackendError>> {
        Box::pin(std::future::ready(self.probe(object)))
    }

    fn execute<'a>(&'a self, stmt: &'a Stmt) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(std::future::ready(self.run(stmt)))
    }

    fn close<'a>(self) -> BoxFuture<'a, ()>
    where
        Self: 'a,
    {
        self.lock().closed_connections += 1;
        Box::pin(async move { drop(self) })
    }
}
