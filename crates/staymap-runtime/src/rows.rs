#![forbid(unsafe_code)]

//! Result list rows and the live-price ledger behind them.
//!
//! The list shows every entity, mappable or not, in input order. Each row's
//! price starts as the entity's base price and is patched when its live
//! load resolves. A failed load keeps the base price and marks the row as
//! [`PriceStatus::Fallback`].

use std::collections::HashMap;

use serde::Serialize;
use staymap_core::{Entity, EntityId, PriceFormat, annotate_entity, format_distance};
use tracing::{debug, warn};

use crate::price_loader::{PriceLoadError, PriceUpdate};

/// Where a row's price currently comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PriceStatus {
    /// Live load still running; showing the base price.
    Pending,
    /// Showing the live price.
    Loaded,
    /// Live load failed; showing the base price.
    Fallback,
}

/// One line of the result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub entity_id: EntityId,
    pub title: String,
    pub display_price: String,
    pub converted_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    /// Whether the entity has a marker on the map.
    pub on_map: bool,
    pub selected: bool,
    pub price_status: PriceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    status: PriceStatus,
    price: f64,
}

/// Effective price per entity for the current entity list.
#[derive(Debug, Default)]
pub(crate) struct PriceBook {
    entries: HashMap<EntityId, Entry>,
}

impl PriceBook {
    /// Forget everything and mark every entity pending at its base price.
    pub(crate) fn reset(&mut self, entities: &[Entity]) {
        self.entries = entities
            .iter()
            .map(|e| {
                (
                    e.id.clone(),
                    Entry {
                        status: PriceStatus::Pending,
                        price: e.base_price,
                    },
                )
            })
            .collect();
    }

    /// Record a finished load. Returns `true` if the effective price of a
    /// current entity changed.
    pub(crate) fn apply(&mut self, update: &PriceUpdate, base_price: f64) -> bool {
        let Some(entry) = self.entries.get_mut(&update.entity_id) else {
            debug!(id = %update.entity_id, "price for entity no longer listed");
            return false;
        };
        let next = match &update.result {
            Ok(price) if price.is_finite() && *price >= 0.0 => Entry {
                status: PriceStatus::Loaded,
                price: *price,
            },
            Ok(price) => {
                warn!(
                    id = %update.entity_id,
                    price,
                    error = %PriceLoadError::NotFinite,
                    "falling back to base price"
                );
                Entry {
                    status: PriceStatus::Fallback,
                    price: base_price,
                }
            }
            Err(error) => {
                warn!(
                    id = %update.entity_id,
                    %error,
                    "price load failed; falling back to base price"
                );
                Entry {
                    status: PriceStatus::Fallback,
                    price: base_price,
                }
            }
        };
        let changed = entry.price != next.price;
        *entry = next;
        changed
    }

    #[must_use]
    pub(crate) fn status(&self, id: &EntityId) -> PriceStatus {
        self.entries
            .get(id)
            .map_or(PriceStatus::Pending, |e| e.status)
    }

    /// `entity` with its base price replaced by the effective price.
    #[must_use]
    pub(crate) fn effective(&self, entity: &Entity) -> Entity {
        let mut out = entity.clone();
        if let Some(entry) = self.entries.get(&entity.id) {
            out.base_price = entry.price;
        }
        out
    }

    /// Whether any load is still outstanding.
    #[must_use]
    pub(crate) fn has_pending(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.status == PriceStatus::Pending)
    }
}

/// Build list rows for `entities` under `format`.
pub(crate) fn build_rows(
    entities: &[Entity],
    prices: &PriceBook,
    format: &PriceFormat,
    convert: impl Fn(f64) -> f64,
    selected: Option<&EntityId>,
) -> Vec<ResultRow> {
    entities
        .iter()
        .map(|entity| {
            let annotated = annotate_entity(&prices.effective(entity), format, &convert);
            ResultRow {
                entity_id: entity.id.clone(),
                title: entity.title.clone(),
                display_price: annotated.display_string,
                converted_price: annotated.converted_price,
                distance: entity.distance.and_then(format_distance),
                on_map: entity.map_position().is_some(),
                selected: selected == Some(&entity.id),
                price_status: prices.status(&entity.id),
            }
        })
        .collect()
}
