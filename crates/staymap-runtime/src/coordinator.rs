#![forbid(unsafe_code)]

//! Top-level orchestration of the search-results screen.
//!
//! [`SearchResultsCoordinator`] owns the entity list, currency and selection,
//! and wires together:
//!
//! - the [`PriceLoader`], whose results patch effective prices,
//! - the [`SandboxRenderer`], which reloads the whole map document whenever
//!   an input changes,
//! - the [`MessageBridge`], whose selections update the selection and force
//!   the panel open,
//! - the [`PanelController`], driven by gesture passthrough.
//!
//! Everything runs on the owner's thread. Background work (price loads, the
//! sandbox peer) only reaches state through channels that are drained in
//! [`SearchResultsCoordinator::pump`].
//!
//! # Lifecycle
//!
//! ```text
//! mount ──▶ set_* / pump / gestures ... ──▶ teardown (or drop)
//! ```
//!
//! # Invariants
//!
//! 1. A selection naming an entity absent from the current list is a no-op.
//! 2. A selection is authoritative at receipt even if it was made on an
//!    older document; the staleness is only logged.
//! 3. The map reflects the latest inputs after every mutator and after every
//!    `pump`, regenerating at most once per call.
//! 4. After teardown nothing mutates state: pending loads are cancelled, the
//!    bridge is closed, the surface is released, and every mutator is a
//!    no-op.

use std::sync::Arc;
use std::time::Duration;

use staymap_core::{CurrencyService, Entity, EntityId, PriceFormat, annotate_cluster, cluster};
use staymap_panel::{PanelController, PanelState, RestingTarget};
use staymap_render::{DocumentBuilder, MAP_UNAVAILABLE, RenderDocument};
use staymap_sandbox::{
    BridgeStats, MessageBridge, RenderKey, SandboxError, SandboxOutbox, SandboxRenderer,
    SandboxSurface, SurfaceStatus, SyncOutcome,
};
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::observable::{Observable, Subscription};
use crate::price_loader::{PriceLoader, PriceSource};
use crate::rows::{PriceBook, ResultRow, build_rows};

/// Callback fired when the user asks for an entity's details.
pub type EntitySelectedCallback = Box<dyn FnMut(&Entity)>;

/// What one [`SearchResultsCoordinator::pump`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpReport {
    pub prices_applied: usize,
    pub selections_applied: usize,
    pub selections_ignored: usize,
    /// `None` when nothing was synced (torn down or no surface).
    pub sync: Option<SyncOutcome>,
}

/// Owns and coordinates the search-results screen.
pub struct SearchResultsCoordinator<S: SandboxSurface> {
    config: SearchConfig,
    currencies: Arc<dyn CurrencyService>,
    entities: Observable<Vec<Entity>>,
    currency: Observable<String>,
    selection: Observable<Option<EntityId>>,
    tolerance: f64,
    prices: PriceBook,
    prices_version: u64,
    loader: PriceLoader,
    bridge: MessageBridge,
    renderer: Option<SandboxRenderer<S>>,
    surface_error: Option<String>,
    panel: PanelController,
    builder: DocumentBuilder,
    on_entity_selected: Option<EntitySelectedCallback>,
    live: bool,
}

impl<S: SandboxSurface> std::fmt::Debug for SearchResultsCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchResultsCoordinator")
            .field("entities", &self.entities.with(Vec::len))
            .field("currency", &self.currency.get())
            .field("selection", &self.selection.get())
            .field("document_version", &self.document_version())
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

impl<S: SandboxSurface> SearchResultsCoordinator<S> {
    /// Create the screen and open its sandbox.
    ///
    /// `open_surface` receives the outbox the sandbox must post selections
    /// through. If it fails, the coordinator still mounts and reports the
    /// map as unavailable.
    pub fn mount<F>(
        config: SearchConfig,
        currencies: Arc<dyn CurrencyService>,
        prices: Arc<dyn PriceSource>,
        open_surface: F,
    ) -> Self
    where
        F: FnOnce(SandboxOutbox) -> Result<S, SandboxError>,
    {
        let (bridge, outbox) = MessageBridge::new();
        let (renderer, surface_error) = match open_surface(outbox) {
            Ok(surface) => (Some(SandboxRenderer::new(surface, config.map.clone())), None),
            Err(error) => {
                warn!(%error, "sandbox failed to initialize");
                (None, Some(error.to_string()))
            }
        };

        let mut coordinator = Self {
            currencies,
            entities: Observable::new(Vec::new()),
            currency: Observable::new(config.initial_currency_code().to_owned()),
            selection: Observable::new(None),
            tolerance: config.tolerance,
            prices: PriceBook::default(),
            prices_version: 0,
            loader: PriceLoader::with_workers(prices, config.price_workers),
            bridge,
            renderer,
            surface_error,
            panel: PanelController::new(config.panel),
            builder: DocumentBuilder::new(config.popup_cap),
            on_entity_selected: None,
            live: true,
            config,
        };
        info!(
            currency = %coordinator.currency.get(),
            tolerance = coordinator.tolerance,
            "search results mounted"
        );
        coordinator.sync();
        coordinator
    }

    /// Register the navigation callback fired by [`view_details`](Self::view_details).
    pub fn on_entity_selected(&mut self, callback: impl FnMut(&Entity) + 'static) {
        self.on_entity_selected = Some(Box::new(callback));
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    /// Replace the entity list, restart price loads and redraw.
    pub fn set_entities(&mut self, entities: Vec<Entity>) {
        if !self.guard("set_entities") {
            return;
        }
        if !self.entities.set(entities) {
            return;
        }
        let entities = self.entities.get();
        self.prices.reset(&entities);
        self.loader.start(&entities);
        info!(
            count = entities.len(),
            version = self.entities.version(),
            "entity list replaced"
        );
        self.sync();
    }

    /// Switch the display currency and redraw.
    pub fn set_currency(&mut self, code: impl Into<String>) {
        if !self.guard("set_currency") {
            return;
        }
        let code = code.into();
        if self.currency.set(code.clone()) {
            debug!(currency = %code, "currency changed");
            self.sync();
        }
    }

    /// Change the clustering tolerance (degrees) and redraw.
    ///
    /// Non-finite or non-positive tolerances are ignored.
    pub fn set_tolerance(&mut self, tolerance: f64) {
        if !self.guard("set_tolerance") {
            return;
        }
        if !tolerance.is_finite() || tolerance <= 0.0 {
            debug!(tolerance, "invalid tolerance; ignored");
            return;
        }
        if tolerance != self.tolerance {
            self.tolerance = tolerance;
            debug!(tolerance, "tolerance changed");
            self.sync();
        }
    }

    /// Apply finished price loads and sandbox messages, then redraw if
    /// anything changed.
    pub fn pump(&mut self) -> PumpReport {
        let mut report = PumpReport::default();
        if !self.live {
            return report;
        }

        for update in self.loader.drain() {
            let base = self
                .entities
                .with(|list| list.iter().find(|e| e.id == update.entity_id).map(|e| e.base_price));
            let Some(base) = base else {
                continue;
            };
            if self.prices.apply(&update, base) {
                self.prices_version += 1;
            }
            report.prices_applied += 1;
        }

        for event in self.bridge.drain() {
            if self.apply_selection(&event.entity_id, event.document_version) {
                report.selections_applied += 1;
            } else {
                report.selections_ignored += 1;
            }
        }

        report.sync = self.sync();
        report
    }

    /// Pump until every price load has resolved or `timeout` elapses.
    /// Returns `true` if nothing is left pending.
    pub fn pump_until_prices_settle(&mut self, timeout: Duration) -> bool {
        let deadline = web_time::Instant::now() + timeout;
        loop {
            self.pump();
            if !self.live || !self.prices.has_pending() {
                return true;
            }
            if web_time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn apply_selection(&mut self, id: &EntityId, document_version: Option<u64>) -> bool {
        let listed = self.entities.with(|list| list.iter().any(|e| &e.id == id));
        if !listed {
            debug!(%id, "selection for entity not in current list; ignored");
            return false;
        }
        let current = self.document_version();
        if let Some(version) = document_version {
            if version < current {
                debug!(%id, version, current, "selection from an older document");
            }
        }
        self.selection.set(Some(id.clone()));
        self.panel.expand();
        info!(%id, "entity selected");
        true
    }

    /// Clear the selection. The panel stays where it is.
    pub fn clear_selection(&mut self) {
        if self.guard("clear_selection") && self.selection.set(None) {
            debug!("selection cleared");
        }
    }

    /// Explicit close action: collapse the panel.
    pub fn close_panel(&mut self) {
        if self.guard("close_panel") {
            self.panel.close();
        }
    }

    /// Hand the selected entity to the navigation callback. Returns `true` if
    /// the callback ran.
    pub fn view_details(&mut self) -> bool {
        if !self.guard("view_details") {
            return false;
        }
        let Some(entity) = self.selected_entity() else {
            debug!("view details without a listed selection");
            return false;
        };
        match self.on_entity_selected.as_mut() {
            Some(callback) => {
                info!(id = %entity.id, "opening entity details");
                callback(&entity);
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Panel passthrough
    // ------------------------------------------------------------------

    pub fn gesture_start(&mut self) {
        if self.guard("gesture_start") {
            self.panel.gesture_start();
        }
    }

    pub fn gesture_move(&mut self, delta_y: f64) {
        if self.guard("gesture_move") {
            self.panel.gesture_move(delta_y);
        }
    }

    pub fn gesture_end(&mut self, delta_y: f64, velocity_y: f64) -> RestingTarget {
        if !self.guard("gesture_end") {
            return self.panel.resting_target();
        }
        self.panel.gesture_end(delta_y, velocity_y)
    }

    /// Advance the panel animation. Returns `true` while it is moving.
    pub fn tick(&mut self, dt: Duration) -> bool {
        self.live && self.panel.tick(dt)
    }

    /// Finish any panel animation at its resting position.
    pub fn settle_panel(&mut self) {
        if self.guard("settle_panel") {
            self.panel.settle();
        }
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Rows for the list view, in input order.
    #[must_use]
    pub fn rows(&self) -> Vec<ResultRow> {
        let code = self.currency.get();
        let format = PriceFormat::resolve(self.currencies.as_ref(), &code);
        let selected = self.selection.get();
        let currencies = &self.currencies;
        self.entities.with(|list| {
            build_rows(
                list,
                &self.prices,
                &format,
                |p| currencies.convert(p, &code),
                selected.as_ref(),
            )
        })
    }

    #[must_use]
    pub fn selection(&self) -> Option<EntityId> {
        self.selection.get()
    }

    /// The selected entity as listed, if it is still in the current list.
    /// Live prices are only reflected in [`rows`](Self::rows).
    #[must_use]
    pub fn selected_entity(&self) -> Option<Entity> {
        let id = self.selection.get()?;
        self.entities
            .with(|list| list.iter().find(|e| e.id == id).cloned())
    }

    /// Subscribe to selection changes.
    pub fn subscribe_selection(
        &self,
        callback: impl Fn(&Option<EntityId>) + 'static,
    ) -> Subscription {
        self.selection.subscribe(callback)
    }

    #[must_use]
    pub fn panel_state(&self) -> PanelState {
        self.panel.state()
    }

    #[must_use]
    pub fn currency(&self) -> String {
        self.currency.get()
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Version of the latest generated document (0 before the first one).
    #[must_use]
    pub fn document_version(&self) -> u64 {
        self.renderer.as_ref().map_or(0, SandboxRenderer::version)
    }

    /// The document currently shown by the sandbox.
    #[must_use]
    pub fn document(&self) -> Option<&RenderDocument> {
        self.renderer.as_ref().and_then(SandboxRenderer::document)
    }

    #[must_use]
    pub fn surface_status(&self) -> SurfaceStatus {
        match (&self.renderer, &self.surface_error) {
            (Some(renderer), _) => renderer.status().clone(),
            (None, Some(reason)) => SurfaceStatus::Unavailable {
                reason: reason.clone(),
            },
            (None, None) => SurfaceStatus::Released,
        }
    }

    /// Text to show instead of the map, if it cannot be shown.
    #[must_use]
    pub fn fallback_text(&self) -> Option<&'static str> {
        match &self.renderer {
            Some(renderer) => renderer.fallback_text(),
            None if self.surface_error.is_some() => Some(MAP_UNAVAILABLE),
            None => None,
        }
    }

    #[must_use]
    pub fn bridge_stats(&self) -> BridgeStats {
        self.bridge.stats()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Release the sandbox and cancel every pending load. Idempotent.
    pub fn teardown(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.loader.shutdown();
        self.bridge.close();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.release();
        }
        let stats = self.bridge.stats();
        info!(
            accepted = stats.accepted,
            discarded = stats.discarded,
            last_version = self.document_version(),
            "search results torn down"
        );
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn guard(&self, op: &'static str) -> bool {
        if !self.live {
            debug!(op, "coordinator torn down; ignored");
        }
        self.live
    }

    fn render_key(&self) -> RenderKey {
        RenderKey {
            entities_version: self.entities.version(),
            prices_version: self.prices_version,
            currency: self.currency.get(),
            tolerance: self.tolerance,
        }
    }

    fn sync(&mut self) -> Option<SyncOutcome> {
        if !self.live {
            return None;
        }
        let key = self.render_key();
        let Self {
            renderer,
            entities,
            prices,
            currencies,
            builder,
            tolerance,
            ..
        } = self;
        let renderer = renderer.as_mut()?;
        let outcome = renderer.sync(key.clone(), || {
            let effective: Vec<Entity> =
                entities.with(|list| list.iter().map(|e| prices.effective(e)).collect());
            build_document(&effective, currencies.as_ref(), &key.currency, *tolerance, builder)
        });
        Some(outcome)
    }
}

impl<S: SandboxSurface> Drop for SearchResultsCoordinator<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Cluster, annotate and lay out `entities` for `currency`.
#[must_use]
pub fn build_document(
    entities: &[Entity],
    currencies: &dyn CurrencyService,
    currency: &str,
    tolerance: f64,
    builder: &DocumentBuilder,
) -> RenderDocument {
    let format = PriceFormat::resolve(currencies, currency);
    let annotated: Vec<_> = cluster(entities, tolerance)
        .iter()
        .map(|c| annotate_cluster(c, &format, |p| currencies.convert(p, currency)))
        .collect();
    builder.build(format.code(), &annotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use staymap_core::RateTable;
    use staymap_sandbox::SandboxPage;

    use crate::price_loader::{BasePriceSource, TablePriceSource};

    #[derive(Clone, Default)]
    struct Probe {
        loads: Rc<RefCell<Vec<u64>>>,
        released: Rc<RefCell<bool>>,
    }

    struct FakeSurface(Probe);

    impl SandboxSurface for FakeSurface {
        fn load(&mut self, page: SandboxPage) -> Result<(), SandboxError> {
            self.0.loads.borrow_mut().push(page.version);
            Ok(())
        }

        fn release(&mut self) {
            *self.0.released.borrow_mut() = true;
        }
    }

    fn listings() -> Vec<Entity> {
        vec![
            Entity::new("a", "Loft", 100.0).at(41.99, 21.43),
            Entity::new("b", "Studio", 100.0).at(41.99, 21.43),
            Entity::new("c", "Villa", 300.0).at(41.99, 21.43),
            Entity::new("d", "Cabin", 2500.0).at(42.10, 21.60),
            Entity::new("e", "Unmapped", 700.0),
        ]
    }

    fn mount() -> (SearchResultsCoordinator<FakeSurface>, SandboxOutbox, Probe) {
        mount_with(Arc::new(BasePriceSource))
    }

    fn mount_with(
        prices: Arc<dyn PriceSource>,
    ) -> (SearchResultsCoordinator<FakeSurface>, SandboxOutbox, Probe) {
        let config = SearchConfig::default();
        let rates = Arc::new(config.rate_table());
        let probe = Probe::default();
        let mut outbox = None;
        let surface_probe = probe.clone();
        let coordinator = SearchResultsCoordinator::mount(config, rates, prices, |o| {
            outbox = Some(o);
            Ok(FakeSurface(surface_probe))
        });
        (coordinator, outbox.expect("outbox handed to surface"), probe)
    }

    fn select(outbox: &SandboxOutbox, id: &str) {
        assert!(outbox.post(format!(r#"{{"type":"entitySelected","entityId":"{id}"}}"#)));
    }

    #[test]
    fn mount_renders_an_empty_document() {
        let (coordinator, _outbox, probe) = mount();
        assert_eq!(*probe.loads.borrow(), vec![1]);
        assert!(coordinator.document().expect("document").is_empty());
        assert_eq!(coordinator.fallback_text(), None);
    }

    #[test]
    fn entities_cluster_into_markers() {
        let (mut coordinator, _outbox, _probe) = mount();
        coordinator.set_entities(listings());
        let doc = coordinator.document().expect("document");
        assert_eq!(doc.markers.len(), 2);
        assert_eq!(doc.markers[0].label, "from 100 MKD");
        assert_eq!(doc.markers[0].badge, Some(3));
        assert_eq!(coordinator.rows().len(), 5);
    }

    #[test]
    fn currency_change_regenerates_whole_document() {
        let (mut coordinator, _outbox, probe) = mount();
        coordinator.set_entities(listings());
        coordinator.set_currency("EUR");
        coordinator.set_currency("EUR");
        assert_eq!(*probe.loads.borrow(), vec![1, 2, 3]);
        assert_eq!(coordinator.document().expect("document").currency, "EUR");
        assert_eq!(coordinator.rows()[3].display_price, "€40.50");
    }

    #[test]
    fn selection_expands_panel() {
        let (mut coordinator, outbox, _probe) = mount();
        coordinator.set_entities(listings());
        select(&outbox, "d");
        let report = coordinator.pump();
        assert_eq!(report.selections_applied, 1);
        assert_eq!(coordinator.selection(), Some(EntityId::new("d")));
        assert_eq!(coordinator.panel_state().resting_target, RestingTarget::Expanded);
    }

    #[test]
    fn stale_selection_is_a_no_op() {
        let (mut coordinator, outbox, _probe) = mount();
        coordinator.set_entities(listings());
        select(&outbox, "a");
        coordinator.pump();
        select(&outbox, "gone");
        let report = coordinator.pump();
        assert_eq!(report.selections_ignored, 1);
        assert_eq!(coordinator.selection(), Some(EntityId::new("a")));
    }

    #[test]
    fn malformed_messages_are_discarded() {
        let (mut coordinator, outbox, _probe) = mount();
        coordinator.set_entities(listings());
        outbox.post("{oops");
        outbox.post(r#"{"type":"entitySelected"}"#);
        let report = coordinator.pump();
        assert_eq!(report.selections_applied + report.selections_ignored, 0);
        assert_eq!(coordinator.bridge_stats().discarded, 2);
        assert_eq!(coordinator.selection(), None);
    }

    #[test]
    fn older_document_selection_still_applies() {
        let (mut coordinator, outbox, _probe) = mount();
        coordinator.set_entities(listings());
        coordinator.set_currency("USD");
        assert!(outbox.post(r#"{"type":"entitySelected","entityId":"b","documentVersion":1}"#));
        coordinator.pump();
        assert_eq!(coordinator.selection(), Some(EntityId::new("b")));
    }

    #[test]
    fn clearing_selection_keeps_panel_expanded() {
        let (mut coordinator, outbox, _probe) = mount();
        coordinator.set_entities(listings());
        select(&outbox, "a");
        coordinator.pump();
        coordinator.clear_selection();
        assert_eq!(coordinator.selection(), None);
        assert_eq!(coordinator.panel_state().resting_target, RestingTarget::Expanded);
        coordinator.close_panel();
        assert_eq!(coordinator.panel_state().resting_target, RestingTarget::Collapsed);
    }

    #[test]
    fn view_details_fires_navigation_callback() {
        let (mut coordinator, outbox, _probe) = mount();
        let opened = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&opened);
        coordinator.on_entity_selected(move |e| sink.borrow_mut().push(e.id.clone()));
        coordinator.set_entities(listings());
        assert!(!coordinator.view_details());
        select(&outbox, "c");
        coordinator.pump();
        assert!(coordinator.view_details());
        assert_eq!(*opened.borrow(), vec![EntityId::new("c")]);
    }

    #[test]
    fn selection_survives_list_change_but_entity_lookup_does_not() {
        let (mut coordinator, outbox, _probe) = mount();
        coordinator.set_entities(listings());
        select(&outbox, "a");
        coordinator.pump();
        coordinator.set_entities(vec![Entity::new("z", "Other", 1.0).at(41.0, 21.0)]);
        assert_eq!(coordinator.selection(), Some(EntityId::new("a")));
        assert!(coordinator.selected_entity().is_none());
        assert!(!coordinator.view_details());
    }

    #[test]
    fn loaded_prices_patch_rows_and_map() {
        let table = std::collections::HashMap::from([(EntityId::new("d"), 3000.0)]);
        let (mut coordinator, _outbox, probe) = mount_with(Arc::new(TablePriceSource::new(table)));
        coordinator.set_entities(listings());
        assert!(coordinator.pump_until_prices_settle(Duration::from_secs(5)));

        let rows = coordinator.rows();
        assert_eq!(rows[3].display_price, "3000 MKD");
        assert_eq!(rows[3].price_status, crate::rows::PriceStatus::Loaded);
        assert_eq!(rows[0].price_status, crate::rows::PriceStatus::Fallback);
        assert_eq!(rows[0].display_price, "100 MKD");
        let doc = coordinator.document().expect("document");
        assert_eq!(doc.markers[1].label, "3000 MKD");
        assert!(probe.loads.borrow().len() >= 3);
    }

    #[test]
    fn surface_failure_shows_fallback_text() {
        let config = SearchConfig::default();
        let rates: Arc<dyn CurrencyService> =
            Arc::new(RateTable::new(config.base_currency.clone()));
        let mut coordinator: SearchResultsCoordinator<FakeSurface> =
            SearchResultsCoordinator::mount(config, rates, Arc::new(BasePriceSource), |_| {
                Err(SandboxError::Unavailable("no web view".into()))
            });
        assert_eq!(coordinator.fallback_text(), Some("map unavailable"));
        coordinator.set_entities(listings());
        assert_eq!(coordinator.rows().len(), 5);
        assert_eq!(coordinator.pump().sync, None);
    }

    #[test]
    fn teardown_blocks_late_messages_and_prices() {
        let slow = TablePriceSource::default().with_latency(Duration::from_millis(20));
        let (mut coordinator, outbox, probe) = mount_with(Arc::new(slow));
        coordinator.set_entities(listings());
        coordinator.teardown();
        coordinator.teardown();
        assert!(*probe.released.borrow());

        assert!(!outbox.post(r#"{"type":"entitySelected","entityId":"a"}"#));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(coordinator.pump(), PumpReport::default());
        coordinator.set_currency("EUR");
        coordinator.gesture_start();
        assert_eq!(coordinator.selection(), None);
        assert_eq!(coordinator.currency(), "MKD");
        assert_eq!(coordinator.panel_state().phase, staymap_panel::PanelPhase::Resting);
        assert!(
            coordinator
                .rows()
                .iter()
                .all(|r| r.price_status == crate::rows::PriceStatus::Pending)
        );
    }

    #[test]
    fn selection_subscribers_are_notified() {
        let (mut coordinator, outbox, _probe) = mount();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = coordinator.subscribe_selection(move |s| sink.borrow_mut().push(s.clone()));
        coordinator.set_entities(listings());
        select(&outbox, "b");
        coordinator.pump();
        coordinator.clear_selection();
        assert_eq!(*seen.borrow(), vec![Some(EntityId::new("b")), None]);
    }

    #[test]
    fn invalid_tolerances_are_ignored_and_idle_pumps_stay_quiet() {
        let (mut coordinator, _outbox, probe) = mount();
        coordinator.set_entities(listings());
        assert!(coordinator.pump_until_prices_settle(Duration::from_secs(5)));
        let loads = probe.loads.borrow().len();

        for bad in [f64::NAN, f64::INFINITY, 0.0, -0.001] {
            coordinator.set_tolerance(bad);
        }
        assert_eq!(coordinator.tolerance(), 0.0005);
        for _ in 0..5 {
            assert_eq!(coordinator.pump().sync, Some(SyncOutcome::Unchanged));
        }
        assert_eq!(probe.loads.borrow().len(), loads);
    }

    #[test]
    fn details_receive_the_entity_as_listed() {
        let live = TablePriceSource::new(std::collections::HashMap::from([(
            EntityId::new("d"),
            3100.0,
        )]));
        let (mut coordinator, outbox, _probe) = mount_with(Arc::new(live));
        let opened = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&opened);
        coordinator.on_entity_selected(move |e| sink.borrow_mut().push(e.clone()));
        coordinator.set_entities(listings());
        assert!(coordinator.pump_until_prices_settle(Duration::from_secs(5)));
        select(&outbox, "d");
        coordinator.pump();

        assert!(coordinator.view_details());
        assert_eq!(*opened.borrow(), vec![listings()[3].clone()]);
        assert_eq!(coordinator.rows()[3].converted_price, 3100.0);
    }

    #[test]
    fn gestures_pass_through_to_panel() {
        let (mut coordinator, _outbox, _probe) = mount();
        coordinator.gesture_start();
        coordinator.gesture_move(-80.0);
        assert_eq!(coordinator.gesture_end(-80.0, -0.2), RestingTarget::Expanded);
        while coordinator.tick(Duration::from_millis(16)) {}
        assert_eq!(coordinator.panel_state().position, 80.0);
    }
}
