//! The `pgstrap` command.
//!
//! Reads a bootstrap document and reconciles a Postgres cluster with it.
//! A `.env` file in the current directory is loaded first, so every option
//! backed by an environment variable can live there too.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use pgstrap::{
    Bootstrap, BootstrapOptions, DesiredState, MemoryConnector, PgConnector, Report, RunMode,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Declarative Postgres cluster bootstrap.
#[derive(Parser, Debug)]
#[command(name = "pgstrap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log every probe and command (pgstrap=debug); RUST_LOG overrides
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create missing roles, databases, extensions and schemas, and apply grants
    Run(RunArgs),

    /// Load and lint a bootstrap document without connecting
    Check {
        /// Bootstrap document
        #[arg(short, long, env = "BOOTSTRAP_CONFIG", default_value = "bootstrap.yaml")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Bootstrap document
    #[arg(short, long, env = "BOOTSTRAP_CONFIG", default_value = "bootstrap.yaml")]
    config: PathBuf,

    /// Administrative connection URL; per-database stages reuse it with another database name
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Print the commands that would be issued instead of running them
    #[arg(long, env = "BOOTSTRAP_DRY_RUN", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    dry_run: bool,

    #[arg(long, env = "BOOTSTRAP_RENDER_ONLY", hide = true, action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    render_only: bool,

    /// Seconds to wait when opening each connection
    #[arg(long, value_name = "SECS")]
    connect_timeout: Option<u64>,
}

impl RunArgs {
    fn mode(&self) -> RunMode {
        if self.dry_run || self.render_only {
            RunMode::DryRun
        } else {
            RunMode::Apply
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("invalid database URL")]
    DatabaseUrl(#[source] tokio_postgres::Error),

    #[error("DATABASE_URL (or --database-url) must be set unless --dry-run is given")]
    MissingDatabaseUrl,

    #[error(transparent)]
    Bootstrap(#[from] pgstrap::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "failed to load .env");
        }
    }

    let result = match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Check { config } => check(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,pgstrap={level}")));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

/// Print an error and every cause below it.
fn report_error(error: &(dyn std::error::Error + 'static)) {
    eprintln!("error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

async fn run(args: RunArgs) -> Result<(), CliError> {
    let state = config::load(&args.config)?;
    info!(config = %args.config.display(), "loaded bootstrap document");
    log_lints(&state);

    let mode = args.mode();
    let options = BootstrapOptions::new(mode, config::secrets_from_env(&state));

    let report = match &args.database_url {
        Some(url) => {
            let mut connector = PgConnector::from_url(url).map_err(CliError::DatabaseUrl)?;
            if let Some(secs) = args.connect_timeout {
                connector = connector.connect_timeout(Duration::from_secs(secs));
            }
            info!(url = %mask_password(url), %mode, "connecting");
            Bootstrap::new(connector, options).run(&state).await?
        }
        None if mode.is_dry_run() => {
            info!("no database URL: planning against an empty cluster");
            Bootstrap::new(MemoryConnector::new(), options)
                .run(&state)
                .await?
        }
        None => return Err(CliError::MissingDatabaseUrl),
    };

    print_report(&report);
    Ok(())
}

fn check(path: &std::path::Path) -> Result<(), CliError> {
    let state = config::load(path)?;
    let lints = state.lint();
    for lint in &lints {
        println!("warning[{}]: {}", lint.code, lint.message);
    }
    println!(
        "{}: {} roles, {} databases, {} warnings",
        path.display(),
        state.users.len(),
        state.databases.len(),
        lints.len()
    );
    Ok(())
}

fn log_lints(state: &DesiredState) {
    for lint in state.lint() {
        warn!(code = lint.code, "{}", lint.message);
    }
}

fn print_report(report: &Report) {
    if report.mode.is_dry_run() {
        print!("{report}");
    }
    println!(
        "{}: {} created, {} already present, {} commands",
        report.mode,
        report.created(),
        report.present(),
        report.statements().count()
    );
}

/// Mask the password in a database URL for display.
fn mask_password(url: &str) -> String {
    if let Some(start) = url.find("://") {
        if let Some(at) = url.rfind('@') {
            if at > start {
                let prefix = &url[..start + 3];
                let suffix = &url[at..];
                if let Some(colon) = url[start + 3..at].find(':') {
                    let user = &url[start + 3..start + 3 + colon];
                    return format!("{prefix}{user}:***{suffix}");
                }
            }
        }
    }
    url.to_string()
}
