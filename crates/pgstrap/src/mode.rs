use std::fmt;

use crate::Secrets;

/// Whether commands are sent to the server or only planned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Apply,
    /// Existence checks still run where a connection is available; every
    /// command that would be issued is recorded instead of executed.
    DryRun,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        self == RunMode::DryRun
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Apply => f.write_str("apply"),
            RunMode::DryRun => f.write_str("dry-run"),
        }
    }
}

/// Everything a [`Bootstrap`](crate::Bootstrap) needs besides a connector.
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    pub mode: RunMode,
    pub secrets: Secrets,
}

impl BootstrapOptions {
    pub fn new(mode: RunMode, secrets: Secrets) -> Self {
        Self { mode, secrets }
    }
}
