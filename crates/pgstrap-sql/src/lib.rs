//! Administrative SQL as typed values.
//!
//! Every command pgstrap sends to a server is built as a [`Stmt`] and only
//! turned into text by [`render`] (or [`render_redacted`] for logs). Quoting
//! of identifiers and literals happens in one place, here.

mod catalog;
pub use catalog::*;

mod privilege;
pub use privilege::*;

mod render;
pub use render::*;

mod stmt;
pub use stmt::*;

/// Result of rendering a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSql {
    /// The SQL string, ready to send.
    pub sql: String,

    /// Whether a secret was replaced by a placeholder while rendering.
    pub redacted: bool,
}

/// A PostgreSQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use pgstrap_sql::Lit;
/// assert_eq!(format!("{}", Lit("UTF8")), "'UTF8'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "'")
    }
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use pgstrap_sql::Ident;
/// assert_eq!(format!("{}", Ident("uuid-ossp")), "\"uuid-ossp\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// Escape a string literal for SQL.
pub fn escape_string(s: &str) -> String {
    format!("{}", Lit(s))
}

/// Quote a PostgreSQL identifier.
///
/// Always quotes, so role names like `user` or extension names like
/// `uuid-ossp` survive intact. Doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}
