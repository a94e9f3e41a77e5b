#![forbid(unsafe_code)]

//! `staymap-sandbox` owns the boundary between the host and the isolated map
//! surface.
//!
//! Design goals:
//! - **Whole-document replacement**: host → sandbox traffic is a complete
//!   page, never a patch.
//! - **Untrusted inbound channel**: sandbox → host traffic is raw text that
//!   is decoded strictly; anything that is not a well-formed selection is
//!   dropped.
//! - **No blocking**: the host hands a page over and moves on; it never
//!   waits for the sandbox to finish drawing.
//!
//! [`HeadlessSandbox`] is a thread-backed surface that behaves like a real
//! embedded map from the host's point of view and is used by tests and the
//! command-line driver.

pub mod bridge;
pub mod headless;
pub mod protocol;
pub mod renderer;
pub mod surface;

pub use bridge::{BridgeStats, MessageBridge, SandboxOutbox, SelectionEvent};
pub use headless::{HeadlessSandbox, PeerHandle};
pub use protocol::{ENTITY_SELECTED, ProtocolError, SandboxMessage, parse_sandbox_message};
pub use renderer::{RenderKey, SandboxRenderer, SurfaceStatus, SyncOutcome};
pub use surface::{SandboxError, SandboxPage, SandboxSurface};
