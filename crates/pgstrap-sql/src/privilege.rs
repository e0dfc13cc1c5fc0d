//! Privilege tokens.

use std::fmt;

/// A privilege keyword such as `SELECT`, `USAGE` or `ALL PRIVILEGES`.
///
/// Privileges are rendered verbatim (upper-cased), so they are validated on
/// construction: ASCII letters and underscores, optionally separated by single
/// spaces. Column lists such as `SELECT (id)` are not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Privilege(String);

/// A privilege token that can't be rendered safely.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "invalid privilege {token:?}: expected a keyword like SELECT or ALL PRIVILEGES (column lists are not supported)"
)]
pub struct InvalidPrivilege {
    pub token: String,
}

impl Privilege {
    pub fn new(token: &str) -> Result<Self, InvalidPrivilege> {
        let trimmed = token.trim();
        if trimmed.is_empty() || !trimmed.split(' ').all(is_keyword) {
            return Err(InvalidPrivilege {
                token: token.to_string(),
            });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Parse a list of tokens, keeping their order.
    pub fn parse_all<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Self>, InvalidPrivilege> {
        tokens.iter().map(|t| Self::new(t.as_ref())).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_keyword(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
