#![forbid(unsafe_code)]

//! Core: listing model, coordinate clustering, and price annotation.
//!
//! # Role in staymap
//! `staymap-core` holds the pure, deterministic half of the search-results
//! map. It owns the [`Entity`] model handed over by the backend, groups
//! entities that sit at effectively the same location into [`Cluster`]s, and
//! turns base-currency prices into display strings for the selected
//! currency.
//!
//! # How it fits in the system
//! `staymap-render` consumes [`AnnotatedCluster`] values to build the
//! document shown inside the sandbox. `staymap-runtime` drives the pipeline
//! whenever entities, currency, or tolerance change. Nothing in this crate
//! performs I/O or holds state across calls.

pub mod cluster;
pub mod currency;
pub mod entity;
pub mod geo;
pub mod price;

pub use cluster::{Cluster, cluster};
pub use currency::{Currency, CurrencyService, RateTable};
pub use entity::{Entity, EntityId};
pub use geo::{Coordinates, format_distance};
pub use price::{
    AnnotatedCluster, AnnotatedEntity, PriceFormat, PriceRange, annotate, annotate_cluster,
    annotate_entity,
};
