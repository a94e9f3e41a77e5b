#![forbid(unsafe_code)]

//! Keeps the sandbox surface in step with its inputs.
//!
//! [`SandboxRenderer::sync`] is called after every state change with a
//! [`RenderKey`] summarising the inputs. When the key differs from the one
//! last rendered, the document is rebuilt from scratch, stamped with the next
//! version, rendered to a page, and handed to the surface as a unit.
//!
//! # Invariants
//!
//! 1. Versions increase by exactly one per regeneration and never repeat.
//! 2. An unchanged key never triggers a reload.
//! 3. A failed load leaves the renderer in [`SurfaceStatus::Unavailable`]
//!    with a textual fallback; the next key change retries.
//! 4. After [`SandboxRenderer::release`], `sync` does nothing.

use std::sync::Arc;

use staymap_render::{DocumentEnvelope, MAP_UNAVAILABLE, MapOptions, RenderDocument, render_page};
use tracing::{debug, info, warn};

use crate::surface::{SandboxPage, SandboxSurface};

/// Everything a regeneration depends on.
///
/// Tolerances compare by bit pattern, so a key always equals itself.
#[derive(Debug, Clone)]
pub struct RenderKey {
    pub entities_version: u64,
    /// Bumped whenever a loaded price changes an entity's effective price.
    pub prices_version: u64,
    pub currency: String,
    pub tolerance: f64,
}

impl PartialEq for RenderKey {
    fn eq(&self, other: &Self) -> bool {
        self.entities_version == other.entities_version
            && self.prices_version == other.prices_version
            && self.currency == other.currency
            && self.tolerance.to_bits() == other.tolerance.to_bits()
    }
}

/// Health of the surface as last observed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// Nothing loaded yet.
    Pending,
    Live { version: u64 },
    Unavailable { reason: String },
    Released,
}

/// Result of one [`SandboxRenderer::sync`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    Replaced { version: u64, markers: usize },
    /// The page could not be loaded; the fallback text applies.
    Fallback { version: u64 },
    Released,
}

/// Drives whole-document replacement on a [`SandboxSurface`].
#[derive(Debug)]
pub struct SandboxRenderer<S> {
    surface: S,
    options: MapOptions,
    version: u64,
    last_key: Option<RenderKey>,
    status: SurfaceStatus,
    current: Option<Arc<RenderDocument>>,
}

impl<S: SandboxSurface> SandboxRenderer<S> {
    #[must_use]
    pub fn new(surface: S, options: MapOptions) -> Self {
        Self {
            surface,
            options,
            version: 0,
            last_key: None,
            status: SurfaceStatus::Pending,
            current: None,
        }
    }

    /// Regenerate and reload if `key` changed since the last sync.
    ///
    /// `build` is only invoked when a regeneration actually happens.
    pub fn sync(&mut self, key: RenderKey, build: impl FnOnce() -> RenderDocument) -> SyncOutcome {
        if self.status == SurfaceStatus::Released {
            return SyncOutcome::Released;
        }
        if self.last_key.as_ref() == Some(&key) {
            return SyncOutcome::Unchanged;
        }

        self.version += 1;
        let version = self.version;
        debug!(version, ?key, "regenerating sandbox document");
        self.last_key = Some(key);

        let envelope = DocumentEnvelope {
            version,
            document: build(),
        };
        let html = match render_page(&envelope, &self.options) {
            Ok(html) => html,
            Err(error) => {
                warn!(version, %error, "sandbox page generation failed");
                self.status = SurfaceStatus::Unavailable {
                    reason: error.to_string(),
                };
                return SyncOutcome::Fallback { version };
            }
        };

        let document = Arc::new(envelope.document);
        let markers = document.markers.len();
        let page = SandboxPage {
            version,
            html: html.into(),
            document: Arc::clone(&document),
        };

        match self.surface.load(page) {
            Ok(()) => {
                info!(version, markers, "sandbox document replaced");
                self.status = SurfaceStatus::Live { version };
                self.current = Some(document);
                SyncOutcome::Replaced { version, markers }
            }
            Err(error) => {
                warn!(version, %error, "sandbox failed to load document");
                self.status = SurfaceStatus::Unavailable {
                    reason: error.to_string(),
                };
                self.current = None;
                SyncOutcome::Fallback { version }
            }
        }
    }

    /// Latest issued document version (0 before the first regeneration).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn status(&self) -> &SurfaceStatus {
        &self.status
    }

    /// The document the surface is currently showing.
    #[must_use]
    pub fn document(&self) -> Option<&RenderDocument> {
        self.current.as_deref()
    }

    /// Text to show instead of the map when the surface is unusable.
    #[must_use]
    pub fn fallback_text(&self) -> Option<&'static str> {
        match self.status {
            SurfaceStatus::Unavailable { .. } => Some(MAP_UNAVAILABLE),
            _ => None,
        }
    }

    /// Release the surface. Idempotent.
    pub fn release(&mut self) {
        if self.status == SurfaceStatus::Released {
            return;
        }
        self.surface.release();
        self.status = SurfaceStatus::Released;
        self.current = None;
        info!(last_version = self.version, "sandbox released");
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SandboxError;

    #[derive(Default)]
    struct Recording {
        loads: Vec<u64>,
        fail: bool,
        released: bool,
    }

    impl SandboxSurface for Recording {
        fn load(&mut self, page: SandboxPage) -> Result<(), SandboxError> {
            if self.released {
                return Err(SandboxError::Released);
            }
            if self.fail {
                return Err(SandboxError::Unavailable("webview crashed".into()));
            }
            assert!(page.html.contains("window.__STAYMAP__"));
            self.loads.push(page.version);
            Ok(())
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    fn key(entities_version: u64, currency: &str) -> RenderKey {
        RenderKey {
            entities_version,
            prices_version: 0,
            currency: currency.into(),
            tolerance: 0.0005,
        }
    }

    fn doc() -> RenderDocument {
        RenderDocument::empty("MKD")
    }

    #[test]
    fn first_sync_loads_version_one() {
        let mut r = SandboxRenderer::new(Recording::default(), MapOptions::default());
        assert_eq!(
            r.sync(key(1, "MKD"), doc),
            SyncOutcome::Replaced { version: 1, markers: 0 }
        );
        assert_eq!(r.status(), &SurfaceStatus::Live { version: 1 });
        assert_eq!(r.surface().loads, vec![1]);
    }

    #[test]
    fn unchanged_key_does_not_reload_or_build() {
        let mut r = SandboxRenderer::new(Recording::default(), MapOptions::default());
        r.sync(key(1, "MKD"), doc);
        let outcome = r.sync(key(1, "MKD"), || panic!("must not rebuild"));
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(r.surface().loads, vec![1]);
    }

    #[test]
    fn any_input_change_reloads_whole_document() {
        let mut r = SandboxRenderer::new(Recording::default(), MapOptions::default());
        r.sync(key(1, "MKD"), doc);
        r.sync(key(1, "EUR"), doc);
        r.sync(key(2, "EUR"), doc);
        let mut tolerance_changed = key(2, "EUR");
        tolerance_changed.tolerance = 0.01;
        r.sync(tolerance_changed, doc);
        assert_eq!(r.surface().loads, vec![1, 2, 3, 4]);
        assert_eq!(r.version(), 4);
    }

    #[test]
    fn load_failure_falls_back_and_retries_on_change() {
        let surface = Recording {
            fail: true,
            ..Recording::default()
        };
        let mut r = SandboxRenderer::new(surface, MapOptions::default());
        assert_eq!(r.sync(key(1, "MKD"), doc), SyncOutcome::Fallback { version: 1 });
        assert_eq!(r.fallback_text(), Some("map unavailable"));
        assert!(r.document().is_none());

        r.surface.fail = false;
        assert_eq!(r.sync(key(1, "MKD"), doc), SyncOutcome::Unchanged);
        assert!(matches!(r.sync(key(2, "MKD"), doc), SyncOutcome::Replaced { version: 2, .. }));
        assert_eq!(r.fallback_text(), None);
    }

    #[test]
    fn nan_tolerance_key_still_equals_itself() {
        let mut r = SandboxRenderer::new(Recording::default(), MapOptions::default());
        let mut nan = key(1, "MKD");
        nan.tolerance = f64::NAN;
        r.sync(nan.clone(), doc);
        for _ in 0..3 {
            assert_eq!(r.sync(nan.clone(), || panic!("must not rebuild")), SyncOutcome::Unchanged);
        }
        assert_eq!(r.surface().loads, vec![1]);
    }

    #[test]
    fn released_renderer_ignores_sync() {
        let mut r = SandboxRenderer::new(Recording::default(), MapOptions::default());
        r.sync(key(1, "MKD"), doc);
        r.release();
        r.release();
        assert!(r.surface().released);
        assert_eq!(r.sync(key(2, "MKD"), doc), SyncOutcome::Released);
        assert_eq!(r.surface().loads, vec![1]);
    }
}
