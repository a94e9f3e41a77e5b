#![forbid(unsafe_code)]

//! Geolocated listings as delivered by the backend.
//!
//! The wire shape is `{ id, coordinates?, basePrice, title, distance? }`.
//! Entities are immutable for one render cycle; the runtime replaces the
//! whole list rather than editing members in place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

/// Unique listing identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A lodging or vehicle listing eligible for map display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// Price in the base currency.
    pub base_price: f64,
    pub title: String,
    /// Precomputed distance from the search origin, in kilometres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl Entity {
    #[must_use]
    pub fn new(id: impl Into<EntityId>, title: impl Into<String>, base_price: f64) -> Self {
        Self {
            id: id.into(),
            coordinates: None,
            base_price,
            title: title.into(),
            distance: None,
        }
    }

    #[must_use]
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.coordinates = Some(Coordinates::new(lat, lng));
        self
    }

    #[must_use]
    pub fn with_distance(mut self, km: f64) -> Self {
        self.distance = Some(km);
        self
    }

    /// Coordinates if present and valid for clustering.
    #[must_use]
    pub fn map_position(&self) -> Option<Coordinates> {
        self.coordinates.filter(Coordinates::is_valid)
    }
}
