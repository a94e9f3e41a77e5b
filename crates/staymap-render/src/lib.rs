#![forbid(unsafe_code)]

//! Render: declarative map documents and the sandbox page that draws them.
//!
//! # Role in staymap
//! `staymap-render` turns annotated clusters into a [`RenderDocument`]: one
//! marker per cluster, each with its label, optional member-count badge, and
//! popup content. [`page::render_page`] wraps a versioned document into a
//! self-contained HTML page for the isolated sandbox surface.
//!
//! # How it fits in the system
//! Documents are always rebuilt whole. `staymap-sandbox` hands each new page
//! to the surface as a unit and never patches a live document, so there is
//! no marker diffing anywhere in this crate.

pub mod document;
pub mod page;

pub use document::{
    DEFAULT_POPUP_CAP, DocumentBuilder, DocumentEnvelope, Marker, Popup, PopupEntry,
    RenderDocument,
};
pub use page::{MAP_UNAVAILABLE, MapOptions, popup_html, render_page};
