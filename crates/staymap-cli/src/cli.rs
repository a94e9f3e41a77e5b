#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

use crate::clusters::{ClustersArgs, run_clusters};
use crate::config::{ConfigArgs, run_config};
use crate::error::Result;
use crate::render::{RenderArgs, run_render};
use crate::replay::{ReplayArgs, run_replay};

#[derive(Debug, Parser)]
#[command(
    name = "staymap",
    about = "Render, inspect, and replay clustered listing maps",
    version
)]
pub struct Cli {
    /// Log level (`info`, `debug`, ...) or a full filter directive.
    /// `RUST_LOG` takes precedence.
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Emit logs and errors as JSON on stderr.
    #[arg(long = "log-json", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write the self-contained sandbox page for an entity list.
    Render(RenderArgs),

    /// Print the markers an entity list clusters into.
    Clusters(ClustersArgs),

    /// Replay a scripted session against the headless sandbox.
    Replay(ReplayArgs),

    /// Validate or print a search config.
    Config(ConfigArgs),
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.log_level.as_deref(), cli.log_json);
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Render(args) => run_render(args),
        Commands::Clusters(args) => run_clusters(args),
        Commands::Replay(args) => run_replay(args),
        Commands::Config(args) => run_config(args),
    }
}
