#![forbid(unsafe_code)]

//! Staymap public facade crate.
//!
//! Re-exports the stable surface of the internal crates and offers a
//! prelude for embedding the search-results map in a host application.

// --- Core re-exports -------------------------------------------------------

pub use staymap_core::{
    AnnotatedCluster, Cluster, Coordinates, Currency, CurrencyService, Entity, EntityId,
    PriceFormat, PriceRange, RateTable, annotate, annotate_cluster, cluster, format_distance,
};

// --- Render re-exports -----------------------------------------------------

pub use staymap_render::{
    DocumentBuilder, DocumentEnvelope, MAP_UNAVAILABLE, MapOptions, Marker, Popup, RenderDocument,
    render_page,
};

// --- Sandbox re-exports ----------------------------------------------------

pub use staymap_sandbox::{
    HeadlessSandbox, MessageBridge, PeerHandle, SandboxError, SandboxOutbox, SandboxPage,
    SandboxSurface, SurfaceStatus,
};

// --- Panel re-exports ------------------------------------------------------

pub use staymap_panel::{PanelConfig, PanelController, PanelEvent, PanelState, RestingTarget};

// --- Runtime re-exports ----------------------------------------------------

pub use staymap_runtime::{
    BasePriceSource, ConfigError, PriceLoadError, PriceSource, PriceStatus, PumpReport,
    ResultRow, SearchConfig, SearchResultsCoordinator, Subscription, TablePriceSource,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error for embedders that want one error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error("page generation failed: {0}")]
    Page(#[from] serde_json::Error),
}

/// Standard result type for staymap APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// Build the sandbox page for `entities` in one call, without mounting a
/// coordinator.
pub fn render_entities(
    config: &SearchConfig,
    entities: &[Entity],
    currency: &str,
) -> Result<String> {
    let rates = config.rate_table();
    let builder = DocumentBuilder::new(config.popup_cap);
    let document =
        staymap_runtime::build_document(entities, &rates, currency, config.tolerance, &builder);
    let envelope = DocumentEnvelope {
        version: 1,
        document,
    };
    Ok(render_page(&envelope, &config.map)?)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Entity, EntityId, Error, HeadlessSandbox, PanelController, RestingTarget, Result,
        SandboxSurface, SearchConfig, SearchResultsCoordinator,
    };

    pub use crate::{core, panel, render, runtime, sandbox};
}

pub use staymap_core as core;
pub use staymap_panel as panel;
pub use staymap_render as render;
pub use staymap_runtime as runtime;
pub use staymap_sandbox as sandbox;
