#![forbid(unsafe_code)]

//! Asynchronous per-entity price loads.
//!
//! Every call to [`PriceLoader::start`] opens a new generation: the previous
//! generation is cancelled and one job per entity is queued for a fixed pool
//! of background workers, which ask the [`PriceSource`] for that entity's
//! live price. Results come back over a channel and are collected by
//! [`PriceLoader::drain`] on the owner's thread.
//!
//! # Invariants
//!
//! 1. `drain` only yields results for the current generation; anything
//!    older is dropped.
//! 2. Loads are independent: one failing entity never fails the others.
//! 3. At most `workers` loads run at once, however often the list changes.
//!    Queued jobs of a cancelled generation are skipped without calling the
//!    source.
//! 4. After [`PriceLoader::shutdown`], no result can reach the owner. A worker
//!    that finishes late finds its token cancelled or its channel closed and
//!    exits quietly.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, mpsc};

use staymap_core::{Entity, EntityId};
use tracing::{debug, trace, warn};
use web_time::Duration;

use crate::cancellation::{CancellationSource, CancellationToken};

/// Why a price could not be loaded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PriceLoadError {
    #[error("no live price for {0}")]
    Unavailable(EntityId),
    #[error("price load cancelled")]
    Cancelled,
    #[error("price source failed: {0}")]
    Source(String),
    #[error("price source returned a non-finite value")]
    NotFinite,
}

/// Default size of the worker pool.
pub const DEFAULT_PRICE_WORKERS: usize = 4;

/// Where live prices come from.
pub trait PriceSource: Send + Sync {
    /// Load the current price of `entity`, in the base currency.
    ///
    /// Long-running sources should watch `cancel` and give up early. A
    /// source that ignores it keeps one pool worker busy until it returns.
    fn load_price(
        &self,
        entity: &Entity,
        cancel: &CancellationToken,
    ) -> Result<f64, PriceLoadError>;
}

/// Serves each entity's own base price.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasePriceSource;

impl PriceSource for BasePriceSource {
    fn load_price(
        &self,
        entity: &Entity,
        _cancel: &CancellationToken,
    ) -> Result<f64, PriceLoadError> {
        Ok(entity.base_price)
    }
}

/// Serves prices from a fixed table, optionally after a delay.
///
/// Entities missing from the table fail with
/// [`PriceLoadError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct TablePriceSource {
    prices: HashMap<EntityId, f64>,
    latency: Duration,
}

impl TablePriceSource {
    #[must_use]
    pub fn new(prices: HashMap<EntityId, f64>) -> Self {
        Self {
            prices,
            latency: Duration::ZERO,
        }
    }

    /// Delay every answer by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl PriceSource for TablePriceSource {
    fn load_price(
        &self,
        entity: &Entity,
        cancel: &CancellationToken,
    ) -> Result<f64, PriceLoadError> {
        if !self.latency.is_zero() && cancel.wait_timeout(self.latency) {
            return Err(PriceLoadError::Cancelled);
        }
        self.prices
            .get(&entity.id)
            .copied()
            .ok_or_else(|| PriceLoadError::Unavailable(entity.id.clone()))
    }
}

/// One completed load.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub generation: u64,
    pub entity_id: EntityId,
    pub result: Result<f64, PriceLoadError>,
}

struct Job {
    generation: u64,
    entity: Entity,
    token: CancellationToken,
}

/// Fans price loads out to a fixed pool of background workers.
pub struct PriceLoader {
    jobs: Option<mpsc::Sender<Job>>,
    sender: mpsc::Sender<PriceUpdate>,
    receiver: Option<mpsc::Receiver<PriceUpdate>>,
    generation: u64,
    cancel: CancellationSource,
    in_flight: Arc<AtomicUsize>,
    workers: usize,
}

impl std::fmt::Debug for PriceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceLoader")
            .field("generation", &self.generation)
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl PriceLoader {
    /// Loader with [`DEFAULT_PRICE_WORKERS`] workers.
    #[must_use]
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self::with_workers(source, DEFAULT_PRICE_WORKERS)
    }

    /// Loader with a pool of `workers` threads (at least one).
    #[must_use]
    pub fn with_workers(source: Arc<dyn PriceSource>, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel();
        let (jobs, queue) = mpsc::channel::<Job>();
        let queue = Arc::new(Mutex::new(queue));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut spawned = 0;
        for index in 0..workers.max(1) {
            let source = Arc::clone(&source);
            let queue = Arc::clone(&queue);
            let results = sender.clone();
            let in_flight = Arc::clone(&in_flight);
            let worker = std::thread::Builder::new()
                .name(format!("staymap-price-{index}"))
                .spawn(move || run_worker(source.as_ref(), &queue, &results, &in_flight));
            match worker {
                Ok(_) => spawned += 1,
                Err(error) => warn!(index, %error, "could not start price worker"),
            }
        }
        debug!(workers = spawned, "price loader ready");

        Self {
            jobs: Some(jobs),
            sender,
            receiver: Some(receiver),
            generation: 0,
            cancel: CancellationSource::new(),
            in_flight,
            workers: spawned,
        }
    }

    /// Cancel outstanding loads and queue one per entity. Returns the new
    /// generation, or `None` after shutdown.
    pub fn start(&mut self, entities: &[Entity]) -> Option<u64> {
        if self.is_shut_down() {
            debug!("price loader shut down; start ignored");
            return None;
        }
        self.cancel.cancel();
        self.cancel = CancellationSource::new();
        self.generation += 1;
        let generation = self.generation;
        debug!(generation, count = entities.len(), "starting price loads");

        for entity in entities {
            self.enqueue(generation, entity.clone());
        }
        Some(generation)
    }

    fn enqueue(&self, generation: u64, entity: Entity) {
        let job = Job {
            generation,
            entity,
            token: self.cancel.token(),
        };
        let queued = match self.jobs.as_ref() {
            Some(jobs) if self.workers > 0 => {
                self.in_flight.fetch_add(1, Ordering::AcqRel);
                jobs.send(job).map_err(|mpsc::SendError(job)| {
                    self.in_flight.fetch_sub(1, Ordering::AcqRel);
                    job
                })
            }
            _ => Err(job),
        };
        if let Err(job) = queued {
            warn!(id = %job.entity.id, "no price worker available");
            let _ = self.sender.send(PriceUpdate {
                generation,
                entity_id: job.entity.id,
                result: Err(PriceLoadError::Source("no price worker available".into())),
            });
        }
    }

/// Collect every finished load of the current generation.
    pub fn drain(&mut self) -> Vec<PriceUpdate> {
        let Some(receiver) = self.receiver.as_ref() else {
            return Vec::new();
        };
        let mut updates = Vec::new();
        while let Ok(update) = receiver.try_recv() {
            if update.generation == self.generation {
                updates.push(update);
            } else {
                trace!(
                    id = %update.entity_id,
                    generation = update.generation,
                    current = self.generation,
                    "dropping superseded price"
                );
            }
        }
        updates
    }

    /// Cancel everything and stop accepting results. Idempotent.
    pub fn shutdown(&mut self) {
        if self.receiver.take().is_some() {
            self.cancel.cancel();
            self.jobs = None;
            debug!(
                generation = self.generation,
                in_flight = self.in_flight(),
                "price loader shut down"
            );
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.receiver.is_none()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queued or running loads, across all generations.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Size of the worker pool.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

fn run_worker(
    source: &dyn PriceSource,
    queue: &Mutex<mpsc::Receiver<Job>>,
    results: &mpsc::Sender<PriceUpdate>,
    in_flight: &AtomicUsize,
) {
    loop {
        // The lock is released before the load runs.
        let job = queue.lock().unwrap_or_else(|e| e.into_inner()).recv();
        let Ok(job) = job else {
            break;
        };
        if job.token.is_cancelled() {
            trace!(
                id = %job.entity.id,
                generation = job.generation,
                "skipping superseded price load"
            );
            in_flight.fetch_sub(1, Ordering::AcqRel);
            continue;
        }
        let result = source.load_price(&job.entity, &job.token);
        in_flight.fetch_sub(1, Ordering::AcqRel);
        if job.token.is_cancelled() {
            trace!(
                id = %job.entity.id,
                generation = job.generation,
                "price load finished after cancel"
            );
            continue;
        }
        if results
            .send(PriceUpdate {
                generation: job.generation,
                entity_id: job.entity.id,
                result,
            })
            .is_err()
        {
            break;
        }
    }
    trace!("price worker stopped");
}

impl Drop for PriceLoader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn entities() -> Vec<Entity> {
        vec![
            Entity::new("a", "A", 100.0),
            Entity::new("b", "B", 200.0),
            Entity::new("c", "C", 300.0),
        ]
    }

    fn drain_until(loader: &mut PriceLoader, want: usize) -> Vec<PriceUpdate> {
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        let mut out = Vec::new();
        while out.len() < want && Instant::now() < deadline {
            out.extend(loader.drain());
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        out.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        out
    }

    #[test]
    fn base_source_echoes_base_prices() {
        let mut loader = PriceLoader::new(Arc::new(BasePriceSource));
        assert_eq!(loader.start(&entities()), Some(1));
        let updates = drain_until(&mut loader, 3);
        let prices: Vec<_> = updates.iter().map(|u| u.result.clone()).collect();
        assert_eq!(prices, vec![Ok(100.0), Ok(200.0), Ok(300.0)]);
    }

    #[test]
    fn missing_prices_fail_individually() {
        let table = HashMap::from([(EntityId::new("b"), 250.0)]);
        let mut loader = PriceLoader::new(Arc::new(TablePriceSource::new(table)));
        loader.start(&entities());
        let updates = drain_until(&mut loader, 3);
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].result, Err(PriceLoadError::Unavailable(EntityId::new("a"))));
        assert_eq!(updates[1].result, Ok(250.0));
    }

    #[test]
    fn restart_supersedes_previous_generation() {
        let source = TablePriceSource::new(HashMap::from([(EntityId::new("a"), 1.0)]))
            .with_latency(Duration::from_millis(30));
        let mut loader = PriceLoader::new(Arc::new(source));
        loader.start(&entities());
        assert_eq!(loader.start(&entities()[..1]), Some(2));
        let updates = drain_until(&mut loader, 1);
        assert!(updates.iter().all(|u| u.generation == 2));
        assert_eq!(updates.len(), 1);
    }

    /// Blocks for a while without looking at its token.
    #[derive(Default)]
    struct Stubborn {
        running: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl PriceSource for Stubborn {
        fn load_price(
            &self,
            entity: &Entity,
            _cancel: &CancellationToken,
        ) -> Result<f64, PriceLoadError> {
            self.calls.fetch_add(1, Ordering::AcqRel);
            let now = self.running.fetch_add(1, Ordering::AcqRel) + 1;
            self.peak.fetch_max(now, Ordering::AcqRel);
            std::thread::sleep(std::time::Duration::from_millis(50));
            self.running.fetch_sub(1, Ordering::AcqRel);
            Ok(entity.base_price)
        }
    }

    #[test]
    fn pool_bounds_concurrency_and_skips_superseded_jobs() {
        let source = Arc::new(Stubborn::default());
        let mut loader = PriceLoader::with_workers(source.clone(), 2);
        let many: Vec<Entity> = (0..20_u32)
            .map(|i| Entity::new(format!("e{i}"), "E", f64::from(i)))
            .collect();
        loader.start(&many);
        loader.start(&many);
        assert_eq!(loader.start(&many), Some(3));

        let updates = drain_until(&mut loader, 20);
        assert_eq!(updates.len(), 20);
        assert!(updates.iter().all(|u| u.generation == 3));
        assert!(source.peak.load(Ordering::Acquire) <= 2);
        // Only jobs already picked up before a restart ran for old generations.
        assert!(source.calls.load(Ordering::Acquire) <= 24);
        assert_eq!(loader.workers(), 2);
    }

    #[test]
    fn shutdown_cancels_and_blocks_late_results() {
        let source = TablePriceSource::default().with_latency(Duration::from_secs(30));
        let mut loader = PriceLoader::new(Arc::new(source));
        loader.start(&entities());
        loader.shutdown();
        loader.shutdown();
        assert!(loader.is_shut_down());
        assert!(loader.drain().is_empty());
        assert_eq!(loader.start(&entities()), None);

        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        while loader.in_flight() > 0 && Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(loader.in_flight(), 0, "cancelled workers wake and exit");
    }
}
