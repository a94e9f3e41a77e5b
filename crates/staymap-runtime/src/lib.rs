#![forbid(unsafe_code)]

//! Runtime for the search-results screen.
//!
//! # Role in staymap
//! `staymap-runtime` is where the pure pieces meet the asynchronous ones.
//! [`SearchResultsCoordinator`] owns the inputs (entities, currency,
//! tolerance) and the selection, fans live price loads out through a
//! [`PriceLoader`], keeps the sandbox map in step through a
//! [`SandboxRenderer`](staymap_sandbox::SandboxRenderer), and feeds sandbox
//! selections into the [`PanelController`](staymap_panel::PanelController).
//!
//! # Threading
//! The coordinator and its [`Observable`] store are single-threaded
//! (`!Send`). Price workers and the sandbox peer run elsewhere and talk to
//! the coordinator only through channels drained by
//! [`SearchResultsCoordinator::pump`].

pub mod cancellation;
pub mod config;
pub mod coordinator;
pub mod observable;
pub mod price_loader;
pub mod rows;

pub use cancellation::{CancellationSource, CancellationToken};
pub use config::{ConfigError, CurrencyRate, DEFAULT_TOLERANCE, SearchConfig};
pub use coordinator::{EntitySelectedCallback, PumpReport, SearchResultsCoordinator, build_document};
pub use observable::{Observable, Subscription};
pub use price_loader::{
    BasePriceSource, DEFAULT_PRICE_WORKERS, PriceLoadError, PriceLoader, PriceSource, PriceUpdate,
    TablePriceSource,
};
pub use rows::{PriceStatus, ResultRow};
