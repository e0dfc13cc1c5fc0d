//! Bootstrap document loading, and the secrets it refers to.
//!
//! The document path defaults to `bootstrap.yaml` in the current directory.
//! Secret references are environment variable names.

use std::path::{Path, PathBuf};

use pgstrap::{DesiredState, Secrets};

/// Load and parse the bootstrap document at `path`.
pub fn load(path: &Path) -> Result<DesiredState, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(path, &source)
}

/// Parse a bootstrap document; `path` is only used in errors.
pub fn parse(path: &Path, source: &str) -> Result<DesiredState, ConfigError> {
    DesiredState::from_yaml(source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect the secrets `state` refers to from the process environment.
///
/// References with no variable set are left out; resolving them later
/// reports which role needed them.
pub fn secrets_from_env(state: &DesiredState) -> Secrets {
    secrets_from(state, |key| std::env::var(key).ok())
}

fn secrets_from(state: &DesiredState, lookup: impl Fn(&str) -> Option<String>) -> Secrets {
    state
        .secret_references()
        .filter_map(|reference| lookup(reference).map(|value| (reference, value)))
        .collect()
}

/// Errors that can occur when loading a bootstrap document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
