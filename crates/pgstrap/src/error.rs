use std::fmt;

use pgstrap_sql::{CatalogObject, InvalidPrivilege};
use thiserror::Error;

/// Error produced by whatever sits behind an [`AdminConnection`](crate::AdminConnection).
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// The pipeline stage an error happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Secrets,
    Roles,
    Databases,
    Extensions { database: String },
    Schemas { database: String },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Secrets => write!(f, "secrets"),
            Stage::Roles => write!(f, "roles"),
            Stage::Databases => write!(f, "databases"),
            Stage::Extensions { database } => write!(f, "extensions ({database})"),
            Stage::Schemas { database } => write!(f, "schemas ({database})"),
        }
    }
}

/// A failed bootstrap step, tagged with the stage and the object being processed.
///
/// Display includes the kind; `source()` continues with the kind's own cause,
/// so printing the chain never repeats a message.
#[derive(Debug)]
pub struct Error {
    pub stage: Stage,
    pub object: String,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(stage: Stage, object: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            stage,
            object: object.into(),
            kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stage failed for {:?}: {}",
            self.stage, self.object, self.kind
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("could not connect to database {database}")]
    Connection {
        database: String,
        #[source]
        source: BackendError,
    },

    #[error("could not check whether {object} exists")]
    ExistenceCheck {
        object: CatalogObject,
        #[source]
        source: BackendError,
    },

    #[error("could not create {object}")]
    Creation {
        object: CatalogObject,
        #[source]
        source: BackendError,
    },

    #[error("could not grant to {subject}: {sql}")]
    Grant {
        subject: String,
        sql: String,
        #[source]
        source: BackendError,
    },

    #[error("role can log in but has no resolved credential")]
    MissingCredential,

    #[error("secret {reference:?} is not set or empty")]
    MissingSecret { reference: String },

    #[error("{0}")]
    InvalidGrant(String),

    #[error(transparent)]
    InvalidPrivilege(#[from] InvalidPrivilege),
}
