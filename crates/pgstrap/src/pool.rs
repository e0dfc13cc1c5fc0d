//! Live connections over tokio-postgres.

use std::time::Duration;

use pgstrap_sql::{CatalogObject, Stmt, render};
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Config, NoTls};

use crate::traced::{AdminConnection, BoxFuture, Connector};
use crate::BackendError;

/// Connects to a Postgres server described by a connection URL.
///
/// Per-database connections reuse every setting but the database name.
#[derive(Clone)]
pub struct PgConnector {
    config: Config,
}

impl PgConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Parse a `postgres://` URL or a key/value connection string.
    pub fn from_url(url: &str) -> Result<Self, tokio_postgres::Error> {
        Ok(Self::new(url.parse()?))
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout(timeout);
        self
    }

    async fn open(&self, database: Option<&str>) -> Result<PgSession, BackendError> {
        let mut config = self.config.clone();
        if let Some(database) = database {
            config.dbname(database);
        }

        let (client, connection) = config.connect(NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "database connection error");
            }
        });

        Ok(PgSession { client, driver })
    }
}

impl Connector for PgConnector {
    type Conn = PgSession;

    fn connect<'a>(
        &'a self,
        database: Option<&'a str>,
    ) -> BoxFuture<'a, Result<PgSession, BackendError>> {
        Box::pin(self.open(database))
    }
}

/// One open connection.
///
/// Dropping it closes the connection and detaches the driver task;
/// [`AdminConnection::close`] also waits for the driver to finish.
pub struct PgSession {
    client: Client,
    driver: JoinHandle<()>,
}

impl PgSession {
    async fn probe(&self, object: &CatalogObject) -> Result<bool, BackendError> {
        let row = self
            .client
            .query_one(object.exists_sql(), &[&object.name])
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn run(&self, stmt: &Stmt) -> Result<(), BackendError> {
        // DDL goes over the simple query protocol: no parameters, and
        // CREATE DATABASE must not run inside an implicit transaction.
        self.client.batch_execute(&render(stmt).sql).await?;
        Ok(())
    }
}

impl AdminConnection for PgSession {
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
        let PgSession { client, driver } = self;
        Box::pin(async move {
            drop(client);
            // The driver logs its own errors; a join error only means it was aborted.
            let _ = driver.await;
        })
    }
}
