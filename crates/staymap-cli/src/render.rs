#![forbid(unsafe_code)]

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::error::{CliError, Result};
use crate::input::{load_config, read_entities, resolve_currency};

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Entity list as a JSON array; `-` reads stdin.
    pub entities: PathBuf,

    /// Display currency code. Defaults to the config's initial currency.
    #[arg(long)]
    pub currency: Option<String>,

    /// Search config (TOML, or JSON by extension).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output file. Prints to stdout when omitted.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

pub fn run_render(args: RenderArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let currency = resolve_currency(&config, args.currency.as_deref())?;
    let entities = read_entities(&args.entities)?;
    let html = staymap::render_entities(&config, &entities, &currency)?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, &html).map_err(CliError::io(path))?;
            info!(path = %path.display(), bytes = html.len(), currency, "wrote sandbox page");
        }
        None => println!("{html}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_page_with_converted_labels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let entities = dir.path().join("entities.json");
        std::fs::write(
            &entities,
            r#"[{"id": "a", "coordinates": {"lat": 41.99, "lng": 21.43}, "basePrice": 1000, "title": "Loft"}]"#,
        )
        .expect("write");
        let out = dir.path().join("map.html");

        run_render(RenderArgs {
            entities,
            currency: Some("EUR".into()),
            config: None,
            out: Some(out.clone()),
        })
        .expect("render");

        let html = std::fs::read_to_string(out).expect("read");
        assert!(html.contains("window.__STAYMAP__ = "));
        assert!(html.contains("€16.20"));
    }

    #[test]
    fn unknown_currency_is_an_argument_error() {
        let err = run_render(RenderArgs {
            entities: PathBuf::from("unused.json"),
            currency: Some("XXX".into()),
            config: None,
            out: None,
        })
        .expect_err("unknown currency");
        assert_eq!(err.exit_code(), 2);
    }
}
