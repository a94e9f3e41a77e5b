#![forbid(unsafe_code)]

//! Results panel that the user drags between a collapsed and an expanded
//! position.
//!
//! [`PanelController`] turns discrete gesture events into a resting target
//! and runs a [`SnapSpring`](spring::SnapSpring) toward it. It knows nothing
//! about the map or the selection; the coordinator drives
//! [`PanelController::expand`] when a selection arrives.

pub mod config;
pub mod controller;
pub mod spring;

pub use config::PanelConfig;
pub use controller::{
    PanelController, PanelEvent, PanelPhase, PanelState, RestingTarget, snap_target,
};
pub use spring::SnapSpring;
