#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::Args;
use staymap::SearchConfig;
use tracing::info;

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Config file to validate (TOML, or JSON by extension).
    pub file: Option<PathBuf>,

    /// Print the default config as TOML.
    #[arg(long = "print-default")]
    pub print_default: bool,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    if args.print_default {
        print!("{}", SearchConfig::default().to_toml_string()?);
        return Ok(());
    }
    let Some(path) = args.file else {
        return Err(CliError::invalid("pass a config file or --print-default"));
    };
    let config = SearchConfig::from_file(&path)?;
    info!(path = %path.display(), "config is valid");
    print!("{}", config.to_toml_string()?);
    Ok(())
}
