#![forbid(unsafe_code)]

//! Damped spring used to animate the panel into its resting position.
//!
//! Positions are in pixels and velocities in pixels per second. The spring
//! follows
//!
//!   F = -stiffness × (position - target) - damping × velocity
//!
//! integrated with semi-implicit Euler in steps of at most 4 ms.
//!
//! # Invariants
//!
//! 1. A spring at rest stays at rest until [`SnapSpring::retarget`] or
//!    [`SnapSpring::jump`] is called.
//! 2. Settling snaps the position exactly onto the target.
//! 3. Stiffness is at least 0.1 and damping at least 0.0.

use std::time::Duration;

const MAX_STEP_SECS: f64 = 0.004;

/// Within half a pixel of the target counts as there.
const REST_THRESHOLD_PX: f64 = 0.5;

const VELOCITY_THRESHOLD_PX_S: f64 = 1.0;

const MIN_STIFFNESS: f64 = 0.1;

/// Spring that carries the panel from wherever the drag ended to a resting
/// target.
#[derive(Debug, Clone)]
pub struct SnapSpring {
    position: f64,
    velocity: f64,
    target: f64,
    stiffness: f64,
    damping: f64,
    at_rest: bool,
}

impl SnapSpring {
    /// A spring resting at `position`.
    #[must_use]
    pub fn resting(position: f64, stiffness: f64, damping: f64) -> Self {
        Self {
            position,
            velocity: 0.0,
            target: position,
            stiffness: stiffness.max(MIN_STIFFNESS),
            damping: damping.max(0.0),
            at_rest: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> f64 {
        self.target
    }

    #[inline]
    #[must_use]
    pub fn is_at_rest(&self) -> bool {
        self.at_rest
    }

    /// Start moving from `from` toward `target` with an initial velocity.
    pub fn retarget(&mut self, from: f64, target: f64, velocity: f64) {
        self.position = from;
        self.target = target;
        self.velocity = if velocity.is_finite() { velocity } else { 0.0 };
        self.at_rest = false;
        self.settle_if_close();
    }

    /// Place the spring at `position` and stop it there.
    pub fn jump(&mut self, position: f64) {
        self.position = position;
        self.target = position;
        self.velocity = 0.0;
        self.at_rest = true;
    }

    fn step(&mut self, dt: f64) {
        let displacement = self.position - self.target;
        let acceleration = -self.stiffness * displacement - self.damping * self.velocity;
        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;
    }

    /// Advance by `dt`, subdividing into small steps.
    pub fn advance(&mut self, dt: Duration) {
        if self.at_rest {
            return;
        }
        let mut remaining = dt.as_secs_f64();
        while remaining > 0.0 {
            let step_dt = remaining.min(MAX_STEP_SECS);
            self.step(step_dt);
            remaining -= step_dt;
        }
        self.settle_if_close();
    }

    fn settle_if_close(&mut self) {
        if (self.position - self.target).abs() < REST_THRESHOLD_PX
            && self.velocity.abs() < VELOCITY_THRESHOLD_PX_S
        {
            self.position = self.target;
            self.velocity = 0.0;
            self.at_rest = true;
        }
    }
}
