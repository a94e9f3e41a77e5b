#![forbid(unsafe_code)]

//! The isolated rendering surface, as seen from the host.
//!
//! A surface accepts whole pages and can be released. It reports selections
//! only through the [`SandboxOutbox`](crate::bridge::SandboxOutbox) it was
//! created with, never through return values, so the host cannot observe or
//! step through what happens inside.

use std::sync::Arc;

use staymap_render::RenderDocument;

/// Errors raised while handing a page to the surface.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The surface could not be created or has stopped responding.
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
    /// The surface was already released.
    #[error("sandbox already released")]
    Released,
    /// The page could not be generated.
    #[error("page generation failed: {0}")]
    Page(#[from] serde_json::Error),
}

/// A complete page ready to replace whatever the surface shows.
#[derive(Debug, Clone)]
pub struct SandboxPage {
    pub version: u64,
    pub html: Arc<str>,
    /// The document the page was generated from.
    pub document: Arc<RenderDocument>,
}

/// An isolated map surface.
pub trait SandboxSurface {
    /// Replace the current page. Must not wait for the page to finish
    /// drawing.
    fn load(&mut self, page: SandboxPage) -> Result<(), SandboxError>;

    /// Tear the surface down. Further loads fail with
    /// [`SandboxError::Released`]. Idempotent.
    fn release(&mut self);
}

impl<S: SandboxSurface + ?Sized> SandboxSurface for Box<S> {
    fn load(&mut self, page: SandboxPage) -> Result<(), SandboxError> {
        (**self).load(page)
    }

    fn release(&mut self) {
        (**self).release();
    }
}
