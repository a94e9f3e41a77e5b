#![forbid(unsafe_code)]

//! Display prices for entities and clusters.
//!
//! # Formatting rules
//!
//! - Base currency: the amount rounded to an integer, no decimals, followed
//!   by the base-currency suffix (`"2500 MKD"`).
//! - Any other currency: the converted amount with exactly two decimals,
//!   prefixed by the target symbol (`"€40.65"`).
//!
//! # Cluster ranges
//!
//! A cluster's label is derived from the minimum and maximum converted price
//! of its members: equal bounds render a single value, different bounds
//! render `"from <minimum>"`. Ranges are recomputed from scratch on every
//! call; nothing here is cached across renders.
//!
//! # Failure Modes
//!
//! - A conversion that yields NaN or infinity is formatted as `0`. Price
//!   correctness belongs to the conversion service, but a bad rate must not
//!   poison the min/max derivation of a whole cluster.

use crate::cluster::Cluster;
use crate::currency::{Currency, CurrencyService};
use crate::entity::Entity;
use crate::geo::Coordinates;

/// How amounts are rendered for the currently selected currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFormat {
    pub currency: Currency,
    pub is_base: bool,
}

impl PriceFormat {
    #[must_use]
    pub fn base(currency: Currency) -> Self {
        Self {
            currency,
            is_base: true,
        }
    }

    #[must_use]
    pub fn foreign(currency: Currency) -> Self {
        Self {
            currency,
            is_base: false,
        }
    }

    /// Resolve the format for `code` through the conversion service.
    ///
    /// Codes without a known symbol fall back to the code itself followed by
    /// a space, so `"GBP"` renders as `"GBP 12.00"`.
    #[must_use]
    pub fn resolve(service: &dyn CurrencyService, code: &str) -> Self {
        if service.is_base(code) {
            return Self::base(service.base());
        }
        let symbol = service
            .symbol(code)
            .unwrap_or_else(|| format!("{code} "));
        Self::foreign(Currency::new(code, symbol))
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.currency.code
    }

    /// Render an amount already expressed in this currency.
    #[must_use]
    pub fn format(&self, amount: f64) -> String {
        let amount = sanitize(amount);
        if self.is_base {
            format!("{} {}", amount.round() as i64, self.currency.symbol)
        } else {
            format!("{}{:.2}", self.currency.symbol, amount)
        }
    }
}

#[inline]
fn sanitize(amount: f64) -> f64 {
    if amount.is_finite() { amount } else { 0.0 }
}

/// An entity with its price resolved for one render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedEntity {
    pub entity: Entity,
    pub converted_price: f64,
    pub display_string: String,
}

/// Annotate a single entity.
///
/// `convert` is only consulted for non-base currencies.
#[must_use]
pub fn annotate_entity(
    entity: &Entity,
    format: &PriceFormat,
    convert: impl Fn(f64) -> f64,
) -> AnnotatedEntity {
    let converted = if format.is_base {
        entity.base_price
    } else {
        convert(entity.base_price)
    };
    let converted_price = sanitize(converted);
    AnnotatedEntity {
        entity: entity.clone(),
        converted_price,
        display_string: format.format(converted_price),
    }
}

/// Annotate every member of `cluster`, preserving member order.
#[must_use]
pub fn annotate(
    cluster: &Cluster,
    format: &PriceFormat,
    convert: impl Fn(f64) -> f64,
) -> Vec<AnnotatedEntity> {
    cluster
        .members
        .iter()
        .map(|member| annotate_entity(member, format, &convert))
        .collect()
}

/// Minimum and maximum converted price across a set of members.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    /// `None` for an empty slice.
    #[must_use]
    pub fn of(members: &[AnnotatedEntity]) -> Option<Self> {
        let mut iter = members.iter().map(|m| m.converted_price);
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { min, max })
    }

    #[inline]
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.min == self.max
    }

    /// `"<value>"` when both bounds agree, `"from <min>"` otherwise.
    #[must_use]
    pub fn label(&self, format: &PriceFormat) -> String {
        if self.is_single() {
            format.format(self.min)
        } else {
            format!("from {}", format.format(self.min))
        }
    }
}

/// A cluster with all member prices resolved and its marker label derived.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedCluster {
    pub anchor: Coordinates,
    pub members: Vec<AnnotatedEntity>,
    pub range: PriceRange,
    pub label: String,
}

impl AnnotatedCluster {
    #[inline]
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Annotate `cluster` and derive its price range and label.
#[must_use]
pub fn annotate_cluster(
    cluster: &Cluster,
    format: &PriceFormat,
    convert: impl Fn(f64) -> f64,
) -> AnnotatedCluster {
    let members = annotate(cluster, format, convert);
    // Clusters are never empty; the fallback keeps this total anyway.
    let range = PriceRange::of(&members).unwrap_or(PriceRange { min: 0.0, max: 0.0 });
    let label = range.label(format);
    AnnotatedCluster {
        anchor: cluster.anchor,
        members,
        range,
        label,
    }
}
