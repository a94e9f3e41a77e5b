#![forbid(unsafe_code)]

//! Cooperative cancellation for background price loads.
//!
//! Each batch of loads shares one [`CancellationSource`]. Workers hold a
//! [`CancellationToken`] and check it before reporting back; a source that
//! should wait on I/O can block in [`CancellationToken::wait_timeout`] and
//! wake as soon as the batch is cancelled.
//!
//! Dropping a source does not cancel it. Call
//! [`CancellationSource::cancel`] explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use web_time::{Duration, Instant};

struct Shared {
    cancelled: AtomicBool,
    wake: (Mutex<()>, Condvar),
}

/// Read side of a cancellation signal. Cheap to clone, `Send + Sync`.
#[derive(Clone)]
pub struct CancellationToken {
    shared: Arc<Shared>,
}

/// Control side of a cancellation signal.
pub struct CancellationSource {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl std::fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancellationSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                wake: (Mutex::new(()), Condvar::new()),
            }),
        }
    }

    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancel every token from this source and wake any waiters.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        let (lock, cvar) = &self.shared.wake;
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// A token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        CancellationSource::new().token()
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Sleep for up to `duration`, returning early on cancellation.
    ///
    /// Returns `true` if cancelled, `false` if the full duration elapsed.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        let (lock, cvar) = &self.shared.wake;
        let mut guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let start = Instant::now();
        loop {
            if self.is_cancelled() {
                return true;
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            let (next, _) = cvar
                .wait_timeout(guard, duration - elapsed)
                .unwrap_or_else(|e| e.into_inner());
            guard = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_token_is_live() {
        let source = CancellationSource::new();
        assert!(!source.token().is_cancelled());
        assert!(!source.is_cancelled());
    }

    #[test]
    fn cancel_reaches_every_clone() {
        let source = CancellationSource::new();
        let a = source.token();
        let b = a.clone();
        source.cancel();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }

    #[test]
    fn dropping_source_leaves_tokens_live() {
        let source = CancellationSource::new();
        let token = source.token();
        drop(source);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn wait_returns_immediately_when_cancelled() {
        let source = CancellationSource::new();
        source.cancel();
        assert!(source.token().wait_timeout(Duration::from_secs(30)));
    }

    #[test]
    fn wait_times_out_when_live() {
        assert!(!CancellationToken::never().wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn cancel_wakes_a_waiting_worker() {
        let source = CancellationSource::new();
        let token = source.token();
        let worker = thread::spawn(move || token.wait_timeout(Duration::from_secs(30)));
        thread::sleep(std::time::Duration::from_millis(10));
        source.cancel();
        assert!(worker.join().expect("worker joins"));
    }
}
