#![forbid(unsafe_code)]

//! Configuration for the search-results screen.
//!
//! [`SearchConfig`] gathers every tunable in one place and loads from TOML
//! or JSON. Missing fields take their defaults, so an empty file is a valid
//! config.
//!
//! ```toml
//! tolerance = 0.0005
//! popup_cap = 10
//! price_workers = 4
//!
//! [base_currency]
//! code = "MKD"
//! symbol = "MKD"
//!
//! [[currencies]]
//! code = "EUR"
//! symbol = "€"
//! rate = 0.0162
//!
//! [panel]
//! distance_threshold = 50.0
//! velocity_threshold = 0.5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use staymap_core::{Currency, RateTable};
use staymap_panel::PanelConfig;
use staymap_render::{DEFAULT_POPUP_CAP, MapOptions};

use crate::price_loader::DEFAULT_PRICE_WORKERS;

/// Default clustering tolerance in degrees (roughly 50 m).
pub const DEFAULT_TOLERANCE: f64 = 0.0005;

/// A display currency and its rate from the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRate {
    pub code: String,
    pub symbol: String,
    pub rate: f64,
}

impl CurrencyRate {
    #[must_use]
    pub fn new(code: impl Into<String>, symbol: impl Into<String>, rate: f64) -> Self {
        Self {
            code: code.into(),
            symbol: symbol.into(),
            rate,
        }
    }
}

/// Every tunable of the search-results screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Clustering tolerance in degrees, per axis.
    pub tolerance: f64,
    /// Most members listed in a cluster popup.
    pub popup_cap: usize,
    /// Background threads loading live prices.
    pub price_workers: usize,
    /// Currency all base prices are expressed in. Its symbol is rendered as
    /// a suffix.
    pub base_currency: Currency,
    /// Currency selected at mount. Defaults to the base currency.
    pub initial_currency: Option<String>,
    /// Display currencies other than the base.
    pub currencies: Vec<CurrencyRate>,
    pub panel: PanelConfig,
    pub map: MapOptions,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            popup_cap: DEFAULT_POPUP_CAP,
            price_workers: DEFAULT_PRICE_WORKERS,
            base_currency: Currency::new("MKD", "MKD"),
            initial_currency: None,
            currencies: vec![
                CurrencyRate::new("EUR", "€", 0.0162),
                CurrencyRate::new("USD", "$", 0.0175),
            ],
            panel: PanelConfig::default(),
            map: MapOptions::default(),
        }
    }
}

impl SearchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.checked()
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read(path.as_ref())?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.checked()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&read(path.as_ref())?)
    }

    /// Load by file extension: `.json` as JSON, anything else as TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Serialize as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Human-readable problems; empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            errors.push(format!("tolerance must be > 0, got {}", self.tolerance));
        }
        if self.popup_cap == 0 {
            errors.push("popup_cap must be > 0".into());
        }
        if self.price_workers == 0 {
            errors.push("price_workers must be > 0".into());
        }
        if self.base_currency.code.trim().is_empty() {
            errors.push("base_currency.code must not be empty".into());
        }

        let mut seen = std::collections::BTreeSet::new();
        for currency in &self.currencies {
            if currency.code.trim().is_empty() {
                errors.push("currencies: code must not be empty".into());
            } else if !seen.insert(currency.code.as_str()) {
                errors.push(format!("currencies: duplicate code {}", currency.code));
            }
            if currency.code == self.base_currency.code {
                errors.push(format!(
                    "currencies: {} is the base currency and must not have a rate",
                    currency.code
                ));
            }
            if !currency.rate.is_finite() || currency.rate <= 0.0 {
                errors.push(format!(
                    "currencies: rate for {} must be > 0, got {}",
                    currency.code, currency.rate
                ));
            }
        }

        if let Some(initial) = &self.initial_currency {
            let known = *initial == self.base_currency.code
                || self.currencies.iter().any(|c| c.code == *initial);
            if !known {
                errors.push(format!("initial_currency {initial} is not configured"));
            }
        }

        errors.extend(self.panel.validate());

        if self.map.max_fit_zoom > 19 {
            errors.push(format!(
                "map.max_fit_zoom must be <= 19, got {}",
                self.map.max_fit_zoom
            ));
        }
        if !self.map.tile_url.contains("{z}") {
            errors.push("map.tile_url must contain a {z} placeholder".into());
        }

        errors
    }

    /// The configured currencies as a conversion service.
    #[must_use]
    pub fn rate_table(&self) -> RateTable {
        self.currencies.iter().fold(
            RateTable::new(self.base_currency.clone()),
            |table, c| table.with_rate(Currency::new(c.code.clone(), c.symbol.clone()), c.rate),
        )
    }

    /// Currency code active at mount.
    #[must_use]
    pub fn initial_currency_code(&self) -> &str {
        self.initial_currency
            .as_deref()
            .unwrap_or(&self.base_currency.code)
    }

    fn checked(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors from loading a [`SearchConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use staymap_core::CurrencyService;

    #[test]
    fn default_validates_clean() {
        let errors = SearchConfig::default().validate();
        assert!(errors.is_empty(), "default should validate: {errors:?}");
    }

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = SearchConfig::default();
        assert_eq!(cfg.tolerance, 0.0005);
        assert_eq!(cfg.popup_cap, 10);
        assert_eq!(cfg.price_workers, 4);
        assert_eq!(cfg.panel.distance_threshold, 50.0);
        assert_eq!(cfg.panel.velocity_threshold, 0.5);
        assert_eq!(cfg.initial_currency_code(), "MKD");
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(SearchConfig::from_toml_str("").expect("empty"), SearchConfig::default());
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let cfg = SearchConfig::from_toml_str(
            r#"
            tolerance = 0.001
            initial_currency = "EUR"

            [panel]
            distance_threshold = 80.0
            "#,
        )
        .expect("valid");
        assert_eq!(cfg.tolerance, 0.001);
        assert_eq!(cfg.initial_currency_code(), "EUR");
        assert_eq!(cfg.panel.distance_threshold, 80.0);
        assert_eq!(cfg.panel.velocity_threshold, 0.5);
    }

    #[test]
    fn json_loads_too() {
        let cfg = SearchConfig::from_json_str(r#"{"popup_cap": 5}"#).expect("valid");
        assert_eq!(cfg.popup_cap, 5);
    }

    #[test]
    fn invalid_values_are_rejected_on_load() {
        let err = SearchConfig::from_toml_str("tolerance = -1.0\npopup_cap = 0\nprice_workers = 0")
            .expect_err("invalid");
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn duplicate_and_base_currencies_are_reported() {
        let cfg = SearchConfig {
            currencies: vec![
                CurrencyRate::new("EUR", "€", 0.016),
                CurrencyRate::new("EUR", "€", 0.017),
                CurrencyRate::new("MKD", "MKD", 1.0),
            ],
            ..SearchConfig::default()
        };
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.contains("duplicate code EUR")));
        assert!(errors.iter().any(|e| e.contains("MKD is the base currency")));
    }

    #[test]
    fn unknown_initial_currency_is_reported() {
        let cfg = SearchConfig {
            initial_currency: Some("JPY".into()),
            ..SearchConfig::default()
        };
        assert_eq!(cfg.validate(), vec!["initial_currency JPY is not configured"]);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            SearchConfig::from_toml_str("tolerance = ["),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn rate_table_reflects_config() {
        let table = SearchConfig::default().rate_table();
        assert!(table.is_base("MKD"));
        assert!((table.convert(1000.0, "EUR") - 16.2).abs() < 1e-9);
        assert_eq!(table.symbol("USD").as_deref(), Some("$"));
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let cfg = SearchConfig::default();
        let text = cfg.to_toml_string().expect("encode");
        assert_eq!(SearchConfig::from_toml_str(&text).expect("decode"), cfg);
    }

    #[test]
    fn files_load_by_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let toml_path = dir.path().join("search.toml");
        std::fs::write(&toml_path, "popup_cap = 3").expect("write");
        assert_eq!(SearchConfig::from_file(&toml_path).expect("toml").popup_cap, 3);

        let json_path = dir.path().join("search.json");
        std::fs::write(&json_path, r#"{"popup_cap": 4}"#).expect("write");
        assert_eq!(SearchConfig::from_file(&json_path).expect("json").popup_cap, 4);

        assert!(matches!(
            SearchConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
