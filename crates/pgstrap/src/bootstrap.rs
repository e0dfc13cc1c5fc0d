//! The four-stage pipeline.

use std::fmt;

use pgstrap_sql::{CatalogObject, Stmt, render_redacted};
use tracing::{Instrument, info, info_span};

use crate::provision::{Outcome, apply_databases, apply_extensions, apply_roles, apply_schemas};
use crate::recorder::Recorder;
use crate::traced::{AdminConnection, Connector};
use crate::{BootstrapOptions, DatabaseSpec, DesiredState, Error, ErrorKind, RunMode, Stage};

/// Reconciles a cluster toward a [`DesiredState`].
///
/// Stages run strictly in order: roles, databases, then for each database its
/// extensions and schemas. The roles and databases stages share nothing but
/// the connector; each opens its own connection to the default database, and
/// every database with extensions or schemas gets one connection of its own.
/// A stage that succeeds closes its connection and waits for the close; on
/// error the connection is dropped instead. The first error ends the run.
/// Objects created before it stay in place, so fixing the cause and running
/// again is the way to recover.
pub struct Bootstrap<C> {
    connector: C,
    options: BootstrapOptions,
}

impl<C: Connector> Bootstrap<C> {
    pub fn new(connector: C, options: BootstrapOptions) -> Self {
        Self { connector, options }
    }

    pub fn mode(&self) -> RunMode {
        self.options.mode
    }

    /// Apply (or, in dry-run mode, plan) `state`.
    ///
    /// Secrets are resolved on a copy of `state` before any connection is opened.
    pub async fn run(&self, state: &DesiredState) -> Result<Report, Error> {
        let mut state = state.clone();
        state.resolve_secrets(&self.options.secrets)?;

        let mode = self.options.mode;
        info!(
            %mode,
            roles = state.users.len(),
            databases = state.databases.len(),
            "bootstrap starting"
        );

        let mut report = Report::new(mode);

        if !state.users.is_empty() {
            let conn = self.open(None, Stage::Roles).await?;
            let outcome = apply_roles(&conn, &state.users)
                .instrument(info_span!("stage", stage = "roles"))
                .await?;
            report.push(Stage::Roles, outcome, conn.take_statements());
            conn.close().await;
        }

        let mut planned = Vec::new();
        if !state.databases.is_empty() {
            let conn = self.open(None, Stage::Databases).await?;
            let outcome = apply_databases(&conn, &state.databases)
                .instrument(info_span!("stage", stage = "databases"))
                .await?;
            if mode.is_dry_run() {
                planned = outcome.created.clone();
            }
            report.push(Stage::Databases, outcome, conn.take_statements());
            conn.close().await;
        }

        for database in &state.databases {
            let offline = planned.contains(&CatalogObject::database(&database.name));
            self.provision_database(database, offline, &mut report)
                .await?;
        }

        info!(
            %mode,
            created = report.created(),
            present = report.present(),
            statements = report.statements().count(),
            "bootstrap complete"
        );
        Ok(report)
    }

    /// Extensions and schemas for one database, over a single connection.
    ///
    /// `offline` means a dry-run planned to create the database, so there is
    /// nothing to connect to yet.
    async fn provision_database(
        &self,
        database: &DatabaseSpec,
        offline: bool,
        report: &mut Report,
    ) -> Result<(), Error> {
        let name = database.name.as_str();
        let extensions = Stage::Extensions {
            database: name.to_string(),
        };
        let schemas = Stage::Schemas {
            database: name.to_string(),
        };

        let first = match (database.extensions.is_empty(), database.schemas.is_empty()) {
            (true, true) => return Ok(()),
            (false, _) => extensions.clone(),
            (true, false) => schemas.clone(),
        };

        let conn = if offline {
            info!(database = name, "database is planned, not yet created: planning offline");
            Recorder::offline()
        } else {
            self.open(Some(name), first).await?
        };

        if !database.extensions.is_empty() {
            let outcome = apply_extensions(&conn, name, &database.extensions)
                .instrument(info_span!("stage", stage = "extensions", database = name))
                .await?;
            report.push(extensions, outcome, conn.take_statements());
        }

        if !database.schemas.is_empty() {
            let outcome = apply_schemas(&conn, name, &database.schemas)
                .instrument(info_span!("stage", stage = "schemas", database = name))
                .await?;
            report.push(schemas, outcome, conn.take_statements());
        }

        conn.close().await;
        Ok(())
    }

    async fn open(&self, database: Option<&str>, stage: Stage) -> Result<Recorder<C::Conn>, Error> {
        let label = database.unwrap_or("(default)");
        match self.connector.connect(database).await {
            Ok(conn) => Ok(Recorder::new(conn, self.options.mode)),
            Err(source) => Err(Error::new(
                stage,
                label,
                ErrorKind::Connection {
                    database: label.to_string(),
                    source,
                },
            )),
        }
    }
}

/// What one run did, or in dry-run mode, would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub mode: RunMode,
    pub stages: Vec<StageReport>,
}

/// One stage's share of a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub created: Vec<CatalogObject>,
    pub present: Vec<CatalogObject>,
    /// Commands in the order they were issued, with secrets redacted.
    pub statements: Vec<String>,
}

impl Report {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            stages: Vec::new(),
        }
    }

    fn push(&mut self, stage: Stage, outcome: Outcome, statements: Vec<Stmt>) {
        self.stages.push(StageReport {
            stage,
            created: outcome.created,
            present: outcome.present,
            statements: statements
                .iter()
                .map(|stmt| render_redacted(stmt).sql)
                .collect(),
        });
    }

    /// Every command across all stages, in order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .flat_map(|s| s.statements.iter().map(String::as_str))
    }

    pub fn stage(&self, stage: &Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| &s.stage == stage)
    }

    /// Whether `object` was created (or planned) by any stage.
    pub fn was_created(&self, object: &CatalogObject) -> bool {
        self.stages.iter().any(|s| s.created.contains(object))
    }

    pub fn created(&self) -> usize {
        self.stages.iter().map(|s| s.created.len()).sum()
    }

    pub fn present(&self) -> usize {
        self.stages.iter().map(|s| s.present.len()).sum()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stage in &self.stages {
            writeln!(
                f,
                "-- {}: {} created, {} present",
                stage.stage,
                stage.created.len(),
                stage.present.len()
            )?;
            for sql in &stage.statements {
                writeln!(f, "{sql};")?;
            }
        }
        Ok(())
    }
}
