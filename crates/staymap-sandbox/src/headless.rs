#![forbid(unsafe_code)]

//! A headless sandbox peer running on its own thread.
//!
//! [`HeadlessSandbox`] stands in for an embedded web view: it accepts pages
//! through [`SandboxSurface`], keeps the last loaded document, and turns
//! simulated taps into `entitySelected` messages posted through the
//! [`SandboxOutbox`]. Nothing it does is visible to the host except those
//! messages, which keeps the host honest about the isolation boundary.
//!
//! Taps are driven from a [`PeerHandle`], which plays the role of the user
//! touching the map.
//!
//! # Failure Modes
//!
//! - Tapping before any page is loaded, or tapping a marker or row index
//!   that does not exist, does nothing.
//! - Tapping a multi-member marker only opens its popup; no message is
//!   posted until a row inside it is tapped.
//! - Once the peer has shut down, loads fail with
//!   [`SandboxError::Unavailable`] and handle methods return `false`.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use staymap_render::RenderDocument;
use tracing::{debug, trace, warn};

use crate::bridge::SandboxOutbox;
use crate::protocol::SandboxMessage;
use crate::surface::{SandboxError, SandboxPage, SandboxSurface};

enum PeerCommand {
    Load(SandboxPage),
    TapMarker(usize),
    TapEntry { marker: usize, entry: usize },
    PostRaw(String),
    Flush(mpsc::Sender<()>),
    Shutdown,
}

#[derive(Debug, Default)]
struct PeerState {
    loaded_version: Option<u64>,
    loads: u64,
    document: Option<Arc<RenderDocument>>,
}

fn lock(state: &Mutex<PeerState>) -> MutexGuard<'_, PeerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Surface side of the headless peer.
#[derive(Debug)]
pub struct HeadlessSandbox {
    commands: mpsc::Sender<PeerCommand>,
    thread: Option<JoinHandle<()>>,
    released: bool,
}

/// Drives user interaction inside a [`HeadlessSandbox`].
#[derive(Debug, Clone)]
pub struct PeerHandle {
    commands: mpsc::Sender<PeerCommand>,
    state: Arc<Mutex<PeerState>>,
}

impl std::fmt::Debug for PeerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(page) => write!(f, "Load(v{})", page.version),
            Self::TapMarker(i) => write!(f, "TapMarker({i})"),
            Self::TapEntry { marker, entry } => write!(f, "TapEntry({marker}, {entry})"),
            Self::PostRaw(raw) => write!(f, "PostRaw({} bytes)", raw.len()),
            Self::Flush(_) => f.write_str("Flush"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl HeadlessSandbox {
    /// Start the peer thread. Selections are posted through `outbox`.
    ///
    /// Returns an error if the OS refuses to start the thread.
    pub fn spawn(outbox: SandboxOutbox) -> Result<(Self, PeerHandle), SandboxError> {
        let (commands, inbox) = mpsc::channel();
        let state = Arc::new(Mutex::new(PeerState::default()));
        let peer_state = Arc::clone(&state);
        let thread = std::thread::Builder::new()
            .name("staymap-sandbox".into())
            .spawn(move || run_peer(&inbox, &outbox, &peer_state))
            .map_err(|e| SandboxError::Unavailable(e.to_string()))?;
        debug!("headless sandbox started");

        Ok((
            Self {
                commands: commands.clone(),
                thread: Some(thread),
                released: false,
            },
            PeerHandle { commands, state },
        ))
    }
}

impl SandboxSurface for HeadlessSandbox {
    fn load(&mut self, page: SandboxPage) -> Result<(), SandboxError> {
        if self.released {
            return Err(SandboxError::Released);
        }
        self.commands
            .send(PeerCommand::Load(page))
            .map_err(|_| SandboxError::Unavailable("headless peer stopped".into()))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = self.commands.send(PeerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("headless sandbox thread panicked");
            }
        }
        debug!("headless sandbox released");
    }
}

impl Drop for HeadlessSandbox {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.commands.send(PeerCommand::Shutdown);
        }
    }
}

impl PeerHandle {
    /// Tap a marker. Singletons post a selection; clusters open their popup.
    pub fn tap_marker(&self, marker: usize) -> bool {
        self.commands.send(PeerCommand::TapMarker(marker)).is_ok()
    }

    /// Tap row `entry` of the popup attached to `marker`.
    pub fn tap_entry(&self, marker: usize, entry: usize) -> bool {
        self.commands
            .send(PeerCommand::TapEntry { marker, entry })
            .is_ok()
    }

    /// Post an arbitrary string, as a misbehaving page might.
    pub fn post_raw(&self, raw: impl Into<String>) -> bool {
        self.commands.send(PeerCommand::PostRaw(raw.into())).is_ok()
    }

    /// Wait until every command sent so far has been processed.
    ///
    /// Returns `false` if the peer is gone or did not answer within
    /// `timeout`.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (reply, done) = mpsc::channel();
        if self.commands.send(PeerCommand::Flush(reply)).is_err() {
            return false;
        }
        done.recv_timeout(timeout).is_ok()
    }

    /// Version of the page the peer is currently showing.
    #[must_use]
    pub fn loaded_version(&self) -> Option<u64> {
        lock(&self.state).loaded_version
    }

    /// Number of pages loaded since start.
    #[must_use]
    pub fn load_count(&self) -> u64 {
        lock(&self.state).loads
    }

    /// The document behind the current page.
    #[must_use]
    pub fn document(&self) -> Option<Arc<RenderDocument>> {
        lock(&self.state).document.clone()
    }
}

fn run_peer(inbox: &mpsc::Receiver<PeerCommand>, outbox: &SandboxOutbox, state: &Mutex<PeerState>) {
    while let Ok(command) = inbox.recv() {
        trace!(?command, "sandbox peer command");
        match command {
            PeerCommand::Load(page) => {
                let mut state = lock(state);
                state.loaded_version = Some(page.version);
                state.loads += 1;
                state.document = Some(page.document);
            }
            PeerCommand::TapMarker(marker) => {
                let (version, document) = current(state);
                let Some(marker) = document.as_ref().and_then(|d| d.markers.get(marker)) else {
                    continue;
                };
                match marker.entity_ids.as_slice() {
                    [only] => select(outbox, only.clone(), version),
                    ids => trace!(members = ids.len(), "cluster popup opened"),
                }
            }
            PeerCommand::TapEntry { marker, entry } => {
                let (version, document) = current(state);
                let Some(row) = document
                    .as_ref()
                    .and_then(|d| d.markers.get(marker))
                    .and_then(|m| m.popup.entries().get(entry))
                else {
                    continue;
                };
                select(outbox, row.entity_id.clone(), version);
            }
            PeerCommand::PostRaw(raw) => {
                outbox.post(raw);
            }
            PeerCommand::Flush(reply) => {
                let _ = reply.send(());
            }
            PeerCommand::Shutdown => break,
        }
    }
    debug!("headless sandbox stopped");
}

fn current(state: &Mutex<PeerState>) -> (Option<u64>, Option<Arc<RenderDocument>>) {
    let state = lock(state);
    (state.loaded_version, state.document.clone())
}

fn select(outbox: &SandboxOutbox, entity_id: staymap_core::EntityId, version: Option<u64>) {
    let message = SandboxMessage::EntitySelected {
        entity_id,
        document_version: version,
    };
    if !outbox.post(message.to_json_string()) {
        debug!("host bridge closed; selection dropped");
    }
}
