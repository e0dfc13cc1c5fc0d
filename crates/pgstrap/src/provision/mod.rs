//! The four provisioning stages.
//!
//! Each stage walks its specs in document order. Object creation is
//! existence-guarded; grants are reapplied every run. The first failure ends
//! the stage, tagged with the stage and the object being processed.

mod databases;
mod extensions;
mod roles;
mod schemas;

pub use databases::apply_databases;
pub use extensions::apply_extensions;
pub use roles::apply_roles;
pub use schemas::apply_schemas;

use pgstrap_sql::{CatalogObject, Stmt, render_redacted};
use tracing::{debug, info};

use crate::traced::{AdminConnection, ConnectionExt, TracedConn};
use crate::{Error, ErrorKind, Stage};

/// What a stage found and created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Objects that were absent and have been created (or, in a dry-run, would be).
    pub created: Vec<CatalogObject>,
    /// Objects that already existed and were left alone.
    pub present: Vec<CatalogObject>,
}

struct Step<'a, C: AdminConnection> {
    conn: TracedConn<'a, C>,
    stage: Stage,
    outcome: Outcome,
}

impl<'a, C: AdminConnection> Step<'a, C> {
    fn new(conn: &'a C, stage: Stage) -> Self {
        Self {
            conn: conn.traced(),
            stage,
            outcome: Outcome::default(),
        }
    }

    fn fail(&self, object: &str, kind: ErrorKind) -> Error {
        Error::new(self.stage.clone(), object, kind)
    }

    /// Create `object` with the statement `build` returns, unless it already exists.
    ///
    /// `build` only runs when the object is absent.
    async fn ensure<F>(&mut self, object: CatalogObject, build: F) -> Result<(), Error>
    where
        F: FnOnce() -> Result<Stmt, ErrorKind>,
    {
        let exists = self.conn.exists(&object).await.map_err(|source| {
            self.fail(
                &object.name,
                ErrorKind::ExistenceCheck {
                    object: object.clone(),
                    source,
                },
            )
        })?;

        if exists {
            debug!(kind = %object.kind, name = %object.name, "already exists");
            self.outcome.present.push(object);
            return Ok(());
        }

        let stmt = build().map_err(|kind| self.fail(&object.name, kind))?;
        self.conn.execute(&stmt).await.map_err(|source| {
            self.fail(
                &object.name,
                ErrorKind::Creation {
                    object: object.clone(),
                    source,
                },
            )
        })?;

        info!(kind = %object.kind, name = %object.name, "created");
        self.outcome.created.push(object);
        Ok(())
    }

    /// Apply a grant on behalf of `object`, conferring privileges on `subject`.
    async fn grant(&self, object: &str, subject: &str, stmt: Stmt) -> Result<(), Error> {
        self.conn.execute(&stmt).await.map_err(|source| {
            self.fail(
                object,
                ErrorKind::Grant {
                    subject: subject.to_string(),
                    sql: render_redacted(&stmt).sql,
                    source,
                },
            )
        })?;
        info!(object, subject, sql = %render_redacted(&stmt).sql, "granted");
        Ok(())
    }

    fn finish(self) -> Outcome {
        self.outcome
    }
}

#[cfg(test)]
mod tests;
