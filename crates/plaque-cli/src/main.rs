//! Plaque CLI - Incremental script notebooks.

mod check;
mod colors;
mod output;
mod query;
mod run;
mod watch;
mod watcher;

use clap::{Args, Parser, Subcommand};
use plaque_core::SessionConfig;

#[derive(Parser)]
#[command(name = "plaque")]
#[command(about = "Incremental notebooks for plain scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Interpreter settings shared by the commands that execute cells.
#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// Maximum nesting of function calls inside a cell
    #[arg(long)]
    max_depth: Option<usize>,

    /// Longest value repr shown for results and variables
    #[arg(long)]
    repr_limit: Option<usize>,
}

impl SessionArgs {
    fn config(&self) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        if let Some(repr_limit) = self.repr_limit {
            config.repr_limit = repr_limit;
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a notebook once and print its outputs
    Run {
        /// Path to the notebook script
        notebook: String,

        /// Only print the output of this cell
        #[arg(long)]
        cell: Option<usize>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Watch a notebook and re-run stale cells on every save
    Watch {
        /// Path to the notebook script
        notebook: String,

        /// Clear screen before each run
        #[arg(long)]
        clear: bool,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Split and analyze a notebook without running it
    Check {
        /// Path to the notebook script
        notebook: String,

        /// Fail when a cell reads a name no earlier cell defines
        #[arg(long)]
        strict: bool,

        /// Print cells and edges as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a notebook and print a JSON projection of its state
    Query {
        /// Path to the notebook script
        notebook: String,

        /// Resource path, e.g. `state`, `cells`, `cell/2/output`
        #[arg(default_value = "state")]
        resource: String,

        /// List the available resources instead
        #[arg(long)]
        list: bool,

        #[command(flatten)]
        session: SessionArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format plaque-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(plaque_err) = err.downcast_ref::<plaque_core::Error>() {
            anyhow::anyhow!("{}", plaque_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            notebook,
            cell,
            session,
        } => run::execute(&notebook, cell, session.config()).map_err(format_error)?,

        Commands::Watch {
            notebook,
            clear,
            session,
        } => {
            watch::execute(&notebook, session.config(), clear)
                .await
                .map_err(format_error)?;
        }

        Commands::Check {
            notebook,
            strict,
            json,
        } => check::execute(&notebook, strict, json).map_err(format_error)?,

        Commands::Query {
            notebook,
            resource,
            list,
            session,
        } => query::execute(&notebook, &resource, list, session.config()).map_err(format_error)?,
    }

    Ok(())
}
