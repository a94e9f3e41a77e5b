#![forbid(unsafe_code)]

//! Reading entity lists and configs from disk or stdin.

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use staymap::{Entity, SearchConfig};

use crate::error::{CliError, Result};

/// Read `path` as text; `-` reads stdin.
pub fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(CliError::io(path))?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).map_err(CliError::io(path))
}

/// Read a JSON document of type `T` from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    Ok(serde_json::from_str(&read_text(path)?)?)
}

/// Read the backend entity list: a JSON array of
/// `{ id, coordinates?, basePrice, title, distance? }`.
pub fn read_entities(path: &Path) -> Result<Vec<Entity>> {
    let entities: Vec<Entity> = read_json(path)?;
    tracing::debug!(count = entities.len(), path = %path.display(), "loaded entities");
    Ok(entities)
}

/// Load a config file, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<SearchConfig> {
    match path {
        Some(path) => Ok(SearchConfig::from_file(path)?),
        None => Ok(SearchConfig::default()),
    }
}

/// Currency to render in: the explicit choice, else the config's initial
/// currency. Unknown codes are rejected.
pub fn resolve_currency(config: &SearchConfig, requested: Option<&str>) -> Result<String> {
    let code = requested.unwrap_or_else(|| config.initial_currency_code());
    let known =
        code == config.base_currency.code || config.currencies.iter().any(|c| c.code == code);
    if known {
        Ok(code.to_string())
    } else {
        Err(CliError::invalid(format!("unknown currency {code}")))
    }
}
