#![forbid(unsafe_code)]

//! Currency model and the injected conversion service.
//!
//! The search-results map never owns exchange rates. It receives a
//! [`CurrencyService`] from the host application and only asks it three
//! things: convert a base amount into a target currency, look up a symbol,
//! and tell whether a code is the base currency.
//!
//! [`RateTable`] is the fixed-rate implementation used by configuration
//! files, the CLI, and tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A display currency: ISO-style code plus the symbol shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
}

impl Currency {
    #[must_use]
    pub fn new(code: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            symbol: symbol.into(),
        }
    }
}

/// Conversion service supplied by the host application.
pub trait CurrencyService: Send + Sync {
    /// The currency all base prices are expressed in.
    fn base(&self) -> Currency;

    /// Convert `amount` (in the base currency) into `target`.
    fn convert(&self, amount: f64, target: &str) -> f64;

    /// Display symbol for `code`, if the service knows it.
    fn symbol(&self, code: &str) -> Option<String>;

    /// Whether `code` names the base currency.
    fn is_base(&self, code: &str) -> bool {
        self.base().code == code
    }
}

/// Fixed conversion rates keyed by currency code.
#[derive(Debug, Clone)]
pub struct RateTable {
    base: Currency,
    rates: BTreeMap<String, (String, f64)>,
}

impl RateTable {
    /// Create a table containing only the base currency.
    #[must_use]
    pub fn new(base: Currency) -> Self {
        Self {
            base,
            rates: BTreeMap::new(),
        }
    }

    /// Register `currency` with the rate applied to base amounts (builder
    /// pattern). Re-registering a code replaces its entry.
    #[must_use]
    pub fn with_rate(mut self, currency: Currency, rate: f64) -> Self {
        self.insert(currency, rate);
        self
    }

    pub fn insert(&mut self, currency: Currency, rate: f64) {
        self.rates.insert(currency.code, (currency.symbol, rate));
    }

    /// All known currencies, base first, then by code.
    #[must_use]
    pub fn currencies(&self) -> Vec<Currency> {
        let mut out = vec![self.base.clone()];
        out.extend(
            self.rates
                .iter()
                .filter(|(code, _)| **code != self.base.code)
                .map(|(code, (symbol, _))| Currency::new(code.clone(), symbol.clone())),
        );
        out
    }
}

impl CurrencyService for RateTable {
    fn base(&self) -> Currency {
        self.base.clone()
    }

    fn convert(&self, amount: f64, target: &str) -> f64 {
        if target == self.base.code {
            return amount;
        }
        match self.rates.get(target) {
            Some((_, rate)) => amount * rate,
            None => {
                debug!(target, "no rate for currency; converting at 1.0");
                amount
            }
        }
    }

    fn symbol(&self, code: &str) -> Option<String> {
        if code == self.base.code {
            return Some(self.base.symbol.clone());
        }
        self.rates.get(code).map(|(symbol, _)| symbol.clone())
    }
}
