//! Statement recording, and the dry-run switch.

use std::sync::{Mutex, PoisonError};

use pgstrap_sql::{CatalogObject, Stmt};

use crate::traced::{AdminConnection, BoxFuture};
use crate::{BackendError, RunMode};

/// Wraps a connection and keeps every statement that went through it.
///
/// In [`RunMode::Apply`] statements are executed and recorded once they
/// succeed. In [`RunMode::DryRun`] they are only recorded. An offline
/// recorder has no connection at all: every object reads as absent, which
/// is what a database the dry-run is about to create looks like.
pub struct Recorder<C> {
    inner: Option<C>,
    mode: RunMode,
    statements: Mutex<Vec<Stmt>>,
}

impl<C: AdminConnection> Recorder<C> {
    pub fn new(conn: C, mode: RunMode) -> Self {
        Self {
            inner: Some(conn),
            mode,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn offline() -> Self {
        Self {
            inner: None,
            mode: RunMode::DryRun,
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Drain the statements recorded so far.
    pub fn take_statements(&self) -> Vec<Stmt> {
        let mut statements = self
            .statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *statements)
    }

    fn record(&self, stmt: &Stmt) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stmt.clone());
    }

    async fn probe(&self, object: &CatalogObject) -> Result<bool, BackendError> {
        match &self.inner {
            Some(conn) => conn.exists(object).await,
            None => Ok(false),
        }
    }

    async fn run(&self, stmt: &Stmt) -> Result<(), BackendError> {
        if self.mode == RunMode::Apply {
            let Some(conn) = &self.inner else {
                return Err("no connection to execute statement on".into());
            };
            conn.execute(stmt).await?;
        }
        self.record(stmt);
        Ok(())
    }
}

impl<C: AdminConnection> AdminConnection for Recorder<C> {
    fn exists<'a>(&'a self, object: &'a CatalogObject) -> BoxFuture<'a, Result<bool, BackendError>> {
        Box::pin(self.probe(object))
    }

    fn execute<'a>(&'a self, stmt: &'a Stmt) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(self.run(stmt))
    }

    fn close<'a>(self) -> BoxFuture<'a, ()>
    where
        Self: 'a,
    {
        match self.inner {
            Some(conn) => conn.close(),
            None => Box::pin(async {}),
        }
    }
}
