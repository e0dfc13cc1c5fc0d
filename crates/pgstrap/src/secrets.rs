//! Secret resolution.

use std::fmt;

use indexmap::IndexMap;
use pgstrap_sql::Password;

use crate::model::given;
use crate::{DesiredState, Error, ErrorKind, Stage};

/// Resolved secrets, keyed by the reference a role's `password_env` names.
///
/// Supplied by the caller; nothing in this crate reads the process
/// environment. Debug output lists the references only.
#[derive(Clone, Default)]
pub struct Secrets {
    values: IndexMap<String, String>,
}

impl Secrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, value: impl Into<String>) {
        self.values.insert(reference.into(), value.into());
    }

    pub fn with(mut self, reference: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(reference, value);
        self
    }

    /// The value for `reference`, if present and non-empty.
    pub fn get(&self, reference: &str) -> Option<&str> {
        self.values
            .get(reference)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Secrets {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut secrets = Secrets::new();
        for (k, v) in iter {
            secrets.insert(k, v);
        }
        secrets
    }
}

impl DesiredState {
    /// Fill in every role's credential from `secrets`.
    ///
    /// Fails on the first role whose reference has no non-empty value. Roles
    /// without a reference are left alone.
    pub fn resolve_secrets(&mut self, secrets: &Secrets) -> Result<(), Error> {
        for role in &mut self.users {
            let Some(reference) = given(&role.password_env) else {
                continue;
            };
            let Some(value) = secrets.get(reference) else {
                return Err(Error::new(
                    Stage::Secrets,
                    &role.name,
                    ErrorKind::MissingSecret {
                        reference: reference.to_string(),
                    },
                ));
            };
            role.password = Some(Password::new(value));
        }
        Ok(())
    }
}
