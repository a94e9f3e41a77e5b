#![forbid(unsafe_code)]

//! Inbound message channel from the sandbox to the host.
//!
//! The sandbox holds a [`SandboxOutbox`] and posts raw strings whenever it
//! likes; it never waits for the host. The host owns the [`MessageBridge`]
//! and drains it on its own schedule, decoding each message independently.
//!
//! # Invariants
//!
//! 1. Messages are decoded in arrival order; each is handled on its own.
//! 2. A message that fails to decode is counted and dropped. It never stops
//!    the drain and never reaches the caller.
//! 3. After [`MessageBridge::close`], draining yields nothing and
//!    [`SandboxOutbox::post`] reports `false`. Nothing posted after close can
//!    reach host state.
//! 4. No acknowledgement travels back to the sandbox.

use std::sync::mpsc;

use staymap_core::EntityId;
use tracing::{debug, trace};

use crate::protocol::{SandboxMessage, parse_sandbox_message};

/// Sending half handed to the sandbox surface.
#[derive(Debug, Clone)]
pub struct SandboxOutbox {
    sender: mpsc::Sender<String>,
}

impl SandboxOutbox {
    /// Post a raw message. Returns `false` once the host side is gone.
    pub fn post(&self, raw: impl Into<String>) -> bool {
        self.sender.send(raw.into()).is_ok()
    }
}

/// A decoded selection, as delivered to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub entity_id: EntityId,
    /// Version of the document the sandbox was showing, if it said so.
    pub document_version: Option<u64>,
}

/// Running counters for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BridgeStats {
    pub accepted: u64,
    pub discarded: u64,
}

/// Host-side receiver for sandbox messages.
#[derive(Debug)]
pub struct MessageBridge {
    receiver: Option<mpsc::Receiver<String>>,
    stats: BridgeStats,
}

impl MessageBridge {
    /// Create a bridge and the outbox the sandbox will post through.
    #[must_use]
    pub fn new() -> (Self, SandboxOutbox) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                receiver: Some(receiver),
                stats: BridgeStats::default(),
            },
            SandboxOutbox { sender },
        )
    }

    /// Decode every pending message, dropping anything malformed.
    pub fn drain(&mut self) -> Vec<SelectionEvent> {
        let Some(receiver) = self.receiver.as_ref() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        while let Ok(raw) = receiver.try_recv() {
            match parse_sandbox_message(&raw) {
                Ok(SandboxMessage::EntitySelected {
                    entity_id,
                    document_version,
                }) => {
                    trace!(%entity_id, ?document_version, "sandbox selection received");
                    self.stats.accepted += 1;
                    events.push(SelectionEvent {
                        entity_id,
                        document_version,
                    });
                }
                Err(error) => {
                    self.stats.discarded += 1;
                    debug!(%error, len = raw.len(), "discarding sandbox message");
                }
            }
        }
        events
    }

    #[must_use]
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Stop accepting messages. Idempotent.
    pub fn close(&mut self) {
        if self.receiver.take().is_some() {
            debug!(
                accepted = self.stats.accepted,
                discarded = self.stats.discarded,
                "message bridge closed"
            );
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_messages_are_delivered_in_order() {
        let (mut bridge, outbox) = MessageBridge::new();
        assert!(outbox.post(r#"{"type":"entitySelected","entityId":"a"}"#));
        assert!(outbox.post(r#"{"type":"entitySelected","entityId":"b","documentVersion":2}"#));
        let events = bridge.drain();
        let ids: Vec<_> = events.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(events[1].document_version, Some(2));
        assert_eq!(bridge.stats(), BridgeStats { accepted: 2, discarded: 0 });
    }

    #[test]
    fn malformed_messages_are_counted_and_skipped() {
        let (mut bridge, outbox) = MessageBridge::new();
        outbox.post("garbage");
        outbox.post(r#"{"type":"zoom"}"#);
        outbox.post(r#"{"type":"entitySelected"}"#);
        outbox.post(r#"{"type":"entitySelected","entityId":"ok"}"#);
        let events = bridge.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity_id.as_str(), "ok");
        assert_eq!(bridge.stats(), BridgeStats { accepted: 1, discarded: 3 });
    }

    #[test]
    fn closed_bridge_rejects_posts_and_drains_nothing() {
        let (mut bridge, outbox) = MessageBridge::new();
        outbox.post(r#"{"type":"entitySelected","entityId":"before"}"#);
        bridge.close();
        bridge.close();
        assert!(bridge.is_closed());
        assert!(!outbox.post(r#"{"type":"entitySelected","entityId":"after"}"#));
        assert!(bridge.drain().is_empty());
    }

    #[test]
    fn outbox_works_from_another_thread() {
        let (mut bridge, outbox) = MessageBridge::new();
        let handle = std::thread::spawn(move || {
            outbox.post(r#"{"type":"entitySelected","entityId":"remote"}"#)
        });
        assert!(handle.join().expect("thread joins"));
        assert_eq!(bridge.drain().len(), 1);
    }
}
