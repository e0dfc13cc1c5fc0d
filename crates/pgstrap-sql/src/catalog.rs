//! Catalog existence probes.

use std::fmt;

/// Kind of catalog object an existence probe looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Role,
    Database,
    Schema,
    Extension,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Role => "role",
            ObjectKind::Database => "database",
            ObjectKind::Schema => "schema",
            ObjectKind::Extension => "extension",
        }
    }

    /// The parameterised query answering "does an object of this kind named $1 exist".
    ///
    /// Roles and databases are cluster-wide; schemas and extensions are answered
    /// by whatever database the connection is scoped to.
    pub fn exists_sql(self) -> &'static str {
        match self {
            ObjectKind::Role => "SELECT EXISTS(SELECT 1 FROM pg_roles WHERE rolname = $1)",
            ObjectKind::Database => "SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)",
            ObjectKind::Schema => {
                "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)"
            }
            ObjectKind::Extension => "SELECT EXISTS(SELECT 1 FROM pg_extension WHERE extname = $1)",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named object to look up in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogObject {
    pub kind: ObjectKind,
    pub name: String,
}

impl CatalogObject {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn role(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Role, name)
    }

    pub fn database(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Database, name)
    }

    pub fn schema(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Schema, name)
    }

    pub fn extension(name: impl Into<String>) -> Self {
        Self::new(ObjectKind::Extension, name)
    }

    pub fn exists_sql(&self) -> &'static str {
        self.kind.exists_sql()
    }
}

impl fmt::Display for CatalogObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}
