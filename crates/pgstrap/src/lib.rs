//! Declarative Postgres cluster bootstrap.
//!
//! Describe the roles, databases, extensions, schemas and grants a cluster
//! should have, and pgstrap issues whatever commands are needed to get there.
//! It is additive: nothing is ever dropped or altered, objects that already
//! exist are left alone, and grants are reapplied every run.
//!
//! # Stages
//!
//! A run goes through four stages, strictly in order, each depending only on
//! what the previous ones created:
//!
//! 1. roles, and their memberships
//! 2. databases, and database-level grants
//! 3. per database: extensions
//! 4. per database: schemas, and schema grants across five privilege tiers
//!
//! The first failure ends the run. Re-running after fixing the cause is the
//! supported recovery path.
//!
//! # Example
//!
//! ```ignore
//! let state = DesiredState::from_yaml(&std::fs::read_to_string("bootstrap.yaml")?)?;
//! let secrets = Secrets::new().with("APP_OWNER_PASSWORD", "hunter2");
//! let connector = PgConnector::from_url("postgres://postgres@localhost/postgres")?;
//!
//! let bootstrap = Bootstrap::new(connector, BootstrapOptions::new(RunMode::Apply, secrets));
//! let report = bootstrap.run(&state).await?;
//! ```
//!
//! Swap in [`MemoryConnector`] to plan against an empty cluster, or
//! [`RunMode::DryRun`] to only record what would be issued.

mod bootstrap;
mod error;
mod lint;
mod memory;
mod mode;
mod model;
pub mod pool;
pub mod provision;
mod recorder;
mod secrets;
mod traced;

pub use bootstrap::{Bootstrap, Report, StageReport};
pub use error::{BackendError, Error, ErrorKind, Stage};
pub use lint::*;
pub use memory::{
    AclEntry, AclScope, Catalog, DatabaseEntry, DefaultAclEntry, MemoryConnection,
    MemoryConnector, MemoryError, RoleEntry, SchemaEntry,
};
pub use mode::{BootstrapOptions, RunMode};
pub use model::{
    DatabaseGrant, DatabaseSpec, DesiredState, GrantSubject, GrantTier, RoleSpec, SchemaGrant,
    SchemaSpec,
};
pub use pool::{PgConnector, PgSession};
pub use provision::Outcome;
pub use recorder::Recorder;
pub use secrets::Secrets;
pub use traced::{AdminConnection, BoxFuture, ConnectionExt, Connector, TracedConn};

pub use pgstrap_sql;
