// ==============================================================================
// batch.rs - Asynchronous Batch Processor
// ==============================================================================
// Description: Coalesces submitted variants into bounded batches, flushes
//              on size or wait-time triggers, and runs the per-batch
//              annotation pipeline on a bounded worker pool
// Author: Matt Barham
// Created: 2026-06-30
// Modified: 2026-07-30
// Version: 1.2.0
// ==============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use annotation_core::ml::PathogenicityScorer;
use annotation_core::variant::Variant;
use annotation_core::vep::{parse_response, ParsedBatch, VepClient};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::registry::PendingRegistry;
use crate::store::AnnotationStore;

/// One scheduling quantum of the flush loop. The wait-time trigger fires
/// within this of the configured deadline.
const FLUSH_TICK: Duration = Duration::from_millis(100);

/// Batch processor tuning knobs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Flush as soon as the queue reaches this depth
    pub max_batch_size: usize,
    /// Flush the oldest entry after at most this long
    pub max_wait_time: Duration,
    /// Concurrency cap for in-flight batches
    pub max_workers: usize,
    /// Attempts per variant before Failed is terminal
    pub max_retries: u32,
}

/// A formed batch on its way to a worker
struct Batch {
    id: String,
    variants: Vec<Variant>,
}

impl Batch {
    fn new(variants: Vec<Variant>) -> Self {
        let id = Uuid::new_v4().to_string()[..8].to_string();
        Self { id, variants }
    }
}

struct QueuedVariant {
    variant: Variant,
    enqueued_at: Instant,
}

/// FIFO accumulation queue. Duplicate keys cannot appear here - the
/// registry admission check in the facade rejects them first.
#[derive(Default)]
struct BatchQueue {
    items: VecDeque<QueuedVariant>,
}

impl BatchQueue {
    fn push(&mut self, variant: Variant) {
        self.push_at(variant, Instant::now());
    }

    fn push_at(&mut self, variant: Variant, enqueued_at: Instant) {
        self.items.push_back(QueuedVariant {
            variant,
            enqueued_at,
        });
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn oldest_age(&self) -> Option<Duration> {
        self.items.front().map(|q| q.enqueued_at.elapsed())
    }

    /// The flush disjunction: size threshold reached, or the oldest
    /// queued entry has waited out the time limit.
    fn should_flush(&self, max_batch_size: usize, max_wait_time: Duration) -> bool {
        if self.items.is_empty() {
            return false;
        }
        self.items.len() >= max_batch_size
            || self.oldest_age().is_some_and(|age| age >= max_wait_time)
    }

    /// Drain up to `max_batch_size` entries in FIFO order. Entries beyond
    /// the cap stay queued for the next trigger.
    fn drain_batch(&mut self, max_batch_size: usize) -> Vec<Variant> {
        let take = self.items.len().min(max_batch_size);
        self.items.drain(..take).map(|q| q.variant).collect()
    }
}

struct ProcessorInner {
    config: BatchConfig,
    queue: Mutex<BatchQueue>,
    size_trigger: Notify,
    shutdown_trigger: Notify,
    shutting_down: AtomicBool,
    dispatcher_live: AtomicBool,
    registry: Arc<PendingRegistry>,
    store: AnnotationStore,
    vep: VepClient,
    scorer: Arc<PathogenicityScorer>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Owns the queue, the flush trigger, and the worker pool. Submissions
/// enter through `enqueue`; results are published to the pending registry
/// and the cache store.
#[derive(Clone)]
pub struct BatchProcessor {
    inner: Arc<ProcessorInner>,
}

impl BatchProcessor {
    /// Spawn the dispatcher and worker tasks and return the handle used
    /// by the facade and the HTTP layer.
    pub fn start(
        config: BatchConfig,
        registry: Arc<PendingRegistry>,
        store: AnnotationStore,
        vep: VepClient,
        scorer: Arc<PathogenicityScorer>,
    ) -> Self {
        let max_workers = config.max_workers.max(1);

        let inner = Arc::new(ProcessorInner {
            config,
            queue: Mutex::new(BatchQueue::default()),
            size_trigger: Notify::new(),
            shutdown_trigger: Notify::new(),
            shutting_down: AtomicBool::new(false),
            dispatcher_live: AtomicBool::new(true),
            registry,
            store,
            vep,
            scorer,
            handles: Mutex::new(Vec::new()),
        });

        // Handoff channel between the dispatcher and the worker pool.
        // Formed batches wait here when every worker is busy while the
        // queue keeps accumulating the next batch.
        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(max_workers);
        let batch_rx = Arc::new(tokio::sync::Mutex::new(batch_rx));

        let mut handles = Vec::with_capacity(max_workers + 1);
        handles.push(tokio::spawn(dispatcher_loop(inner.clone(), batch_tx)));
        for worker_id in 0..max_workers {
            handles.push(tokio::spawn(worker_loop(
                inner.clone(),
                batch_rx.clone(),
                worker_id,
            )));
        }
        *inner.handles.lock().unwrap() = handles;

        info!(
            "Batch processor started (batch size {}, wait {:?}, {} workers)",
            inner.config.max_batch_size, inner.config.max_wait_time, max_workers
        );
        BatchProcessor { inner }
    }

    /// Push one admitted variant onto the accumulation queue. Fails only
    /// during shutdown.
    pub fn enqueue(&self, variant: Variant) -> Result<(), ()> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(());
        }
        let depth = {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.push(variant);
            queue.len()
        };
        if depth >= self.inner.config.max_batch_size {
            self.inner.size_trigger.notify_one();
        }
        Ok(())
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// True while the dispatcher loop is running; health reports 503
    /// otherwise.
    pub fn is_live(&self) -> bool {
        self.inner.dispatcher_live.load(Ordering::SeqCst)
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    pub fn max_retries(&self) -> u32 {
        self.inner.config.max_retries
    }

    /// Stop accepting work, flush the queue as one final set of batches,
    /// process them to completion, and join every task.
    pub async fn shutdown(&self) {
        info!("Batch processor shutdown requested");
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        self.inner.shutdown_trigger.notify_waiters();

        let handles: Vec<JoinHandle<()>> = self.inner.handles.lock().unwrap().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Batch task panicked during shutdown: {}", e);
            }
        }
        info!("Batch processor shutdown complete");
    }
}

/// Single dedicated flush loop: races the size-threshold signal against
/// the wait-time deadline, forming batches whenever either side of the
/// disjunction holds.
async fn dispatcher_loop(inner: Arc<ProcessorInner>, batch_tx: mpsc::Sender<Batch>) {
    loop {
        let ready = {
            let queue = inner.queue.lock().unwrap();
            queue.should_flush(inner.config.max_batch_size, inner.config.max_wait_time)
        };

        if ready {
            let variants = {
                let mut queue = inner.queue.lock().unwrap();
                queue.drain_batch(inner.config.max_batch_size)
            };
            if !variants.is_empty() {
                let batch = Batch::new(variants);
                info!("Dispatching batch {} ({} variants)", batch.id, batch.variants.len());
                if batch_tx.send(batch).await.is_err() {
                    break;
                }
            }
            // Re-check immediately: the backlog may hold further full
            // batches.
            continue;
        }

        if inner.shutting_down.load(Ordering::SeqCst) {
            break;
        }

        tokio::select! {
            _ = inner.size_trigger.notified() => {}
            _ = inner.shutdown_trigger.notified() => {}
            _ = tokio::time::sleep(FLUSH_TICK) => {}
        }
    }

    // Final drain: everything still queued goes out in max_batch_size
    // chunks before the handoff channel closes.
    loop {
        let variants = {
            let mut queue = inner.queue.lock().unwrap();
            queue.drain_batch(inner.config.max_batch_size)
        };
        if variants.is_empty() {
            break;
        }
        let batch = Batch::new(variants);
        info!(
            "Dispatching final batch {} ({} variants)",
            batch.id,
            batch.variants.len()
        );
        if batch_tx.send(batch).await.is_err() {
            break;
        }
    }

    inner.dispatcher_live.store(false, Ordering::SeqCst);
    // Dropping batch_tx here closes the channel; workers drain the
    // backlog and exit.
}

async fn worker_loop(
    inner: Arc<ProcessorInner>,
    batch_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Batch>>>,
    worker_id: usize,
) {
    loop {
        let batch = {
            let mut rx = batch_rx.lock().await;
            rx.recv().await
        };
        match batch {
            Some(batch) => process_batch(&inner, batch, worker_id).await,
            None => break,
        }
    }
    debug!("Worker {} stopped", worker_id);
}

/// The per-batch pipeline: mark -> VEP -> parse -> score -> persist ->
/// publish. Transient failures (upstream or database) fail the whole
/// batch and consume one attempt per member; parse failures are
/// per-variant and terminal.
async fn process_batch(inner: &ProcessorInner, batch: Batch, worker_id: usize) {
    let keys: Vec<String> = batch.variants.iter().map(Variant::key).collect();
    inner.registry.mark_processing(&keys);
    info!(
        "[worker-{}] Processing batch {} of {} variants",
        worker_id,
        batch.id,
        keys.len()
    );

    let blocks = match inner.vep.annotate(&batch.variants).await {
        Ok(blocks) => blocks,
        Err(e) => {
            warn!("[worker-{}] Batch {} VEP call failed: {}", worker_id, batch.id, e);
            if e.is_retriable() {
                // Timeout, connection reset, 5xx: one attempt consumed,
                // the client may resubmit.
                fail_batch_transient(inner, &keys, &format!("transient_upstream: {}", e));
            } else {
                // 4xx: the request itself was rejected; retrying the
                // same payload cannot succeed.
                fail_batch_terminal(inner, &keys, &format!("upstream_rejected: {}", e));
            }
            return;
        }
    };

    let ParsedBatch { mut parsed, failures } = parse_response(&blocks, &keys);

    for annotation in &mut parsed {
        annotation.record.ml_score = inner.scorer.score(annotation);
    }

    if !parsed.is_empty() {
        match inner.store.write_batch(&parsed).await {
            Ok(()) => {
                for annotation in &parsed {
                    inner.registry.complete(&annotation.record.variant_key);
                }
                info!(
                    "[worker-{}] Batch {} completed: {} stored, {} failed",
                    worker_id,
                    batch.id,
                    parsed.len(),
                    failures.len()
                );
            }
            Err(e) => {
                error!("[worker-{}] Batch {} persist failed: {}", worker_id, batch.id, e);
                let persisted_keys: Vec<String> = parsed
                    .iter()
                    .map(|a| a.record.variant_key.clone())
                    .collect();
                fail_batch_transient(inner, &persisted_keys, &format!("persist_error: {}", e));
            }
        }
    }

    for (key, parse_error) in failures {
        inner
            .registry
            .record_failure(&key, parse_error.reason(), false, inner.config.max_retries);
        debug!("[worker-{}] {} failed: {}", worker_id, key, parse_error.reason());
    }
}

/// Whole-batch transient failure: one attempt consumed per member,
/// RetryAvailable until the attempt budget is spent.
fn fail_batch_transient(inner: &ProcessorInner, keys: &[String], reason: &str) {
    for key in keys {
        let state = inner
            .registry
            .record_failure(key, reason, true, inner.config.max_retries);
        if let Some(state) = state {
            let attempts = inner.registry.get(key).map(|e| e.attempts).unwrap_or(0);
            debug!(
                "{} attempt {}/{} -> {:?}",
                key, attempts, inner.config.max_retries, state
            );
        }
    }
}

/// Whole-batch non-retriable failure: every member goes straight to
/// Failed without consuming attempts.
fn fail_batch_terminal(inner: &ProcessorInner, keys: &[String], reason: &str) {
    for key in keys {
        inner
            .registry
            .record_failure(key, reason, false, inner.config.max_retries);
        debug!("{} failed: {}", key, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(n: u64) -> Variant {
        Variant::parse("1", n as i64, "A", "G").unwrap()
    }

    #[test]
    fn test_queue_fifo_drain_respects_cap() {
        let mut queue = BatchQueue::default();
        for n in 1..=250 {
            queue.push(variant(n));
        }

        let batch = queue.drain_batch(200);
        assert_eq!(batch.len(), 200);
        assert_eq!(batch[0].key(), "1:1:A>G");
        assert_eq!(batch[199].key(), "1:200:A>G");

        // The remainder stays queued, still in arrival order
        assert_eq!(queue.len(), 50);
        let rest = queue.drain_batch(200);
        assert_eq!(rest[0].key(), "1:201:A>G");
        assert_eq!(rest.len(), 50);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_should_flush_on_size() {
        let mut queue = BatchQueue::default();
        for n in 1..=199 {
            queue.push(variant(n));
        }
        assert!(!queue.should_flush(200, Duration::from_secs(5)));

        queue.push(variant(200));
        assert!(queue.should_flush(200, Duration::from_secs(5)));
    }

    #[test]
    fn test_should_flush_on_oldest_age() {
        let mut queue = BatchQueue::default();
        let past = Instant::now()
            .checked_sub(Duration::from_secs(6))
            .expect("clock far enough from epoch");
        queue.push_at(variant(1), past);

        assert!(queue.should_flush(200, Duration::from_secs(5)));
        assert!(!queue.should_flush(200, Duration::from_secs(60)));
    }

    #[test]
    fn test_empty_queue_never_flushes() {
        let queue = BatchQueue::default();
        assert!(!queue.should_flush(1, Duration::ZERO));
        assert_eq!(queue.oldest_age(), None);
    }

    #[test]
    fn test_batch_id_is_short() {
        let batch = Batch::new(vec![variant(1)]);
        assert_eq!(batch.id.len(), 8);
    }
}
