#![forbid(unsafe_code)]

//! Drag-to-snap state machine for the results panel.
//!
//! The panel has two resting targets, collapsed and expanded, and a
//! dragging phase in between:
//!
//! ```text
//!   Resting(collapsed) ──gestureStart──▶ Dragging ──gestureEnd──▶ Resting(target)
//!   Resting(expanded)  ──gestureStart──▶ Dragging
//!   any                ──expand / close──────────────────────────▶ Resting(expanded / collapsed)
//! ```
//!
//! `deltaY` values are cumulative since `gestureStart`, so the panel sits at
//! `baseline + deltaY` while dragging. The baseline is wherever the panel
//! was when the gesture started, including mid-animation.
//!
//! # Snap rule
//!
//! Evaluated in order on `gestureEnd(deltaY, velocityY)`:
//!
//! 1. `deltaY < -distance` or `velocityY < -velocity` → expanded
//! 2. `deltaY > distance` or `velocityY > velocity` → collapsed
//! 3. otherwise the target whose position is nearer the current position
//!
//! # Invariants
//!
//! 1. The position never leaves `[expanded_position, collapsed_position]`
//!    while dragging or at rest.
//! 2. Moves and ends received outside a drag are ignored.
//! 3. NaN or infinite deltas count as zero movement.
//! 4. The controller reports the resting target immediately; the spring
//!    animation toward it is advanced separately by [`PanelController::tick`].

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::PanelConfig;
use crate::spring::SnapSpring;

/// One of the two stable panel positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RestingTarget {
    Collapsed,
    Expanded,
}

impl RestingTarget {
    /// Pixel position of this target under `config`.
    #[must_use]
    pub fn position(self, config: &PanelConfig) -> f64 {
        match self {
            Self::Collapsed => config.collapsed_position,
            Self::Expanded => config.expanded_position,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collapsed => "collapsed",
            Self::Expanded => "expanded",
        }
    }
}

impl std::fmt::Display for RestingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelPhase {
    Resting,
    Dragging,
}

/// Snapshot of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelState {
    pub position: f64,
    pub phase: PanelPhase,
    /// The target the panel rests at or is animating toward. During a drag
    /// this is the target it came from.
    pub resting_target: RestingTarget,
}

/// Discrete panel inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelEvent {
    GestureStart,
    GestureMove { delta_y: f64 },
    GestureEnd { delta_y: f64, velocity_y: f64 },
    /// Forced by a selection.
    Expand,
    /// Explicit close action.
    Close,
}

/// Decide where a released drag should snap.
///
/// `position` is the panel position at release.
#[must_use]
pub fn snap_target(
    config: &PanelConfig,
    position: f64,
    delta_y: f64,
    velocity_y: f64,
) -> RestingTarget {
    let delta_y = sanitize(delta_y);
    let velocity_y = sanitize(velocity_y);

    if delta_y < -config.distance_threshold || velocity_y < -config.velocity_threshold {
        return RestingTarget::Expanded;
    }
    if delta_y > config.distance_threshold || velocity_y > config.velocity_threshold {
        return RestingTarget::Collapsed;
    }

    let to_expanded = (position - config.expanded_position).abs();
    let to_collapsed = (position - config.collapsed_position).abs();
    if to_expanded < to_collapsed {
        RestingTarget::Expanded
    } else {
        RestingTarget::Collapsed
    }
}

/// Platform recognizers occasionally report NaN; treat it as no movement.
#[inline]
fn sanitize(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Gesture-driven panel state machine.
#[derive(Debug, Clone)]
pub struct PanelController {
    config: PanelConfig,
    phase: PanelPhase,
    target: RestingTarget,
    baseline: f64,
    position: f64,
    spring: SnapSpring,
}

impl Default for PanelController {
    fn default() -> Self {
        Self::new(PanelConfig::default())
    }
}

impl PanelController {
    /// A controller resting collapsed.
    #[must_use]
    pub fn new(config: PanelConfig) -> Self {
        let position = config.collapsed_position;
        Self {
            spring: SnapSpring::resting(position, config.spring_stiffness, config.spring_damping),
            config,
            phase: PanelPhase::Resting,
            target: RestingTarget::Collapsed,
            baseline: position,
            position,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> PanelState {
        PanelState {
            position: self.position,
            phase: self.phase,
            resting_target: self.target,
        }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> PanelPhase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn resting_target(&self) -> RestingTarget {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.phase == PanelPhase::Dragging
    }

    /// Whether the snap animation is still running.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.phase == PanelPhase::Resting && !self.spring.is_at_rest()
    }

    /// Apply one event; returns the resting target afterwards.
    pub fn handle(&mut self, event: PanelEvent) -> RestingTarget {
        match event {
            PanelEvent::GestureStart => self.gesture_start(),
            PanelEvent::GestureMove { delta_y } => self.gesture_move(delta_y),
            PanelEvent::GestureEnd {
                delta_y,
                velocity_y,
            } => return self.gesture_end(delta_y, velocity_y),
            PanelEvent::Expand => self.expand(),
            PanelEvent::Close => self.close(),
        }
        self.target
    }

    /// Begin a drag from wherever the panel currently is.
    pub fn gesture_start(&mut self) {
        if self.is_dragging() {
            debug!("gesture start while already dragging; ignored");
            return;
        }
        self.phase = PanelPhase::Dragging;
        self.baseline = self.position;
        self.spring.jump(self.position);
        trace!(baseline = self.baseline, "panel drag started");
    }

    /// Follow the finger. `delta_y` is cumulative since the drag began.
    pub fn gesture_move(&mut self, delta_y: f64) {
        if !self.is_dragging() {
            trace!("gesture move outside a drag; ignored");
            return;
        }
        self.position = self.clamp(self.baseline + sanitize(delta_y));
        trace!(delta_y, position = self.position, "panel drag moved");
    }

    /// Release the drag and pick a resting target.
    pub fn gesture_end(&mut self, delta_y: f64, velocity_y: f64) -> RestingTarget {
        if !self.is_dragging() {
            trace!("gesture end outside a drag; ignored");
            return self.target;
        }
        self.position = self.clamp(self.baseline + sanitize(delta_y));
        let target = snap_target(&self.config, self.position, delta_y, velocity_y);
        debug!(
            delta_y,
            velocity_y,
            position = self.position,
            target = %target,
            "panel drag released"
        );
        // px/ms from the recognizer, px/s for the spring.
        self.snap_to(target, sanitize(velocity_y) * 1000.0);
        target
    }

    /// Force the panel open, ending any drag in progress.
    pub fn expand(&mut self) {
        self.snap_to(RestingTarget::Expanded, 0.0);
    }

    /// Force the panel closed, ending any drag in progress.
    pub fn close(&mut self) {
        self.snap_to(RestingTarget::Collapsed, 0.0);
    }

    /// Advance the snap animation. Returns `true` while still moving.
    pub fn tick(&mut self, dt: Duration) -> bool {
        if self.is_dragging() {
            return false;
        }
        self.spring.advance(dt);
        self.position = self.clamp(self.spring.position());
        !self.spring.is_at_rest()
    }

    /// Finish the snap animation immediately.
    pub fn settle(&mut self) {
        if self.is_dragging() {
            return;
        }
        let resting = self.target.position(&self.config);
        self.spring.jump(resting);
        self.position = resting;
    }

    fn snap_to(&mut self, target: RestingTarget, velocity: f64) {
        self.phase = PanelPhase::Resting;
        self.target = target;
        let resting = target.position(&self.config);
        self.spring.retarget(self.position, resting, velocity);
    }

    fn clamp(&self, position: f64) -> f64 {
        let (lo, hi) = self.config.bounds();
        position.clamp(lo, hi)
    }
}
