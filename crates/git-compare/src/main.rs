//! CLI entry point for git-compare.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use git_compare_app::AppConfig;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;

const DEFAULT_LIMIT: usize = 20;

/// Compare git references across providers.
#[derive(Parser, Debug)]
#[command(
    name = "git-compare",
    version,
    about = "git-compare: list the commits between two references of any configured repository"
)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "git-compare.toml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Keep the cache warm until interrupted.
    Serve,

    /// List repositories matching a filter.
    Repos {
        /// Fuzzy filter; empty lists every repository.
        #[arg(default_value = "")]
        filter: String,
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// List references of a repository.
    Refs {
        /// Repository name, fuzzy matched.
        repository: String,
        /// Fuzzy filter; empty lists every reference.
        #[arg(default_value = "")]
        filter: String,
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Show the commits reachable from `to` but not from `from`.
    Compare {
        /// Repository name, fuzzy matched.
        repository: String,
        /// Base reference, fuzzy matched.
        from: String,
        /// Head reference, fuzzy matched.
        to: String,
    },
}

fn main() -> Result<()> {
    let Cli { config, cmd } = Cli::parse();
    install_tracing();

    let config = AppConfig::load(&config)?;
    tokio::runtime::Runtime::new()?.block_on(commands::run(config, cmd))
}

fn install_tracing() {
    // RUST_LOG is honoured; INFO by default.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .try_init();
}
