//! The administrative connection seam, and a traced wrapper around it.
//!
//! Provisioners only ever ask two things of a connection: does a catalog
//! object exist, and execute this statement. Everything that talks to a
//! server (or pretends to) implements [`AdminConnection`].

use std::future::Future;
use std::pin::Pin;

use pgstrap_sql::{CatalogObject, Stmt, render_redacted};
use tracing::Instrument;

use crate::BackendError;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A connection able to run catalog probes and administrative statements.
pub trait AdminConnection: Send + Sync {
    /// Whether `object` exists, as seen from this connection's database.
    fn exists<'a>(&'a self, object: &'a CatalogObject) -> BoxFuture<'a, Result<bool, BackendError>>;

    /// Execute a statement.
    fn execute<'a>(&'a self, stmt: &'a Stmt) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Close the connection once a stage is done with it.
    ///
    /// Dropping a connection also closes it; this lets an implementation wait
    /// for its shutdown to finish.
    fn close<'a>(self) -> BoxFuture<'a, ()>
    where
        Self: Sized + 'a,
    {
        Box::pin(async move { drop(self) })
    }
}

/// Opens administrative connections.
///
/// Connections are closed when dropped, or explicitly via
/// [`AdminConnection::close`].
pub trait Connector: Send + Sync {
    type Conn: AdminConnection;

    /// Connect to `database`, or to the default database when `None`.
    fn connect<'a>(
        &'a self,
        database: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Self::Conn, BackendError>>;
}

/// A wrapper around an [`AdminConnection`] that logs every call via tracing.
///
/// Statements are logged in redacted form, so passwords never reach the logs.
pub struct TracedConn<'a, C: AdminConnection> {
    conn: &'a C,
}

impl<'a, C: AdminConnection> TracedConn<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn exists(&self, object: &CatalogObject) -> Result<bool, BackendError> {
        let span = tracing::debug_span!(
            "db.exists",
            kind = %object.kind,
            name = %object.name,
            exists = tracing::field::Empty,
        );
        let exists = self.conn.exists(object).instrument(span.clone()).await?;
        span.record("exists", exists);
        Ok(exists)
    }

    pub async fn execute(&self, stmt: &Stmt) -> Result<(), BackendError> {
        let sql = render_redacted(stmt).sql;
        let span = tracing::debug_span!("db.execute", sql = %sql);
        self.conn.execute(stmt).instrument(span).await
    }
}

/// Extension trait to get a traced wrapper from a connection.
pub trait ConnectionExt: AdminConnection + Sized {
    fn traced(&self) -> TracedConn<'_, Self> {
        TracedConn::new(self)
    }
}

impl<C: AdminConnection> ConnectionExt for C {}
