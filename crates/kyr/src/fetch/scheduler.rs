//! Bounded-concurrency execution of a request tree.
//!
//! Seed requests go onto a pending queue drained by a fixed pool of workers.
//! Every resolved request may publish one result and any number of
//! follow-up requests. An outstanding-work counter tracks submitted requests
//! that have not yet published; when it hits zero the workers are cancelled
//! and the result stream ends.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use super::filter::RepoFilter;

/// Workers per file path when the set of repositories is not known upfront.
pub const DEFAULT_WORKERS_PER_PATH: usize = 100;

/// What resolving one request produced.
pub struct Resolution<R: Resolve> {
    pub result: Option<R::Output>,
    pub follow_ups: Vec<R>,
}

impl<R: Resolve> Resolution<R> {
    /// A terminal result with nothing further to do.
    pub fn done(result: R::Output) -> Self {
        Self {
            result: Some(result),
            follow_ups: Vec::new(),
        }
    }

    /// No result for this step, only more work.
    pub fn retry(follow_up: R) -> Self {
        Self {
            result: None,
            follow_ups: vec![follow_up],
        }
    }
}

/// A request the scheduler can execute.
#[async_trait]
pub trait Resolve: Send + Sized + 'static {
    type Context: Send + Sync + 'static;
    type Output: Send + 'static;

    /// Identifier used for in-flight bookkeeping.
    fn id(&self) -> String;

    async fn resolve(self, ctx: &Self::Context) -> Resolution<Self>;
}

/// Pool size for a fetch run: one worker per file path (at least one) per
/// expected repository.
#[must_use]
pub fn worker_count(file_paths: usize, filter: &RepoFilter) -> usize {
    let per_path = filter
        .exact_names()
        .map_or(DEFAULT_WORKERS_PER_PATH, |names| names.len());
    (file_paths.max(1) * per_path).max(1)
}

struct Shared<R: Resolve> {
    pending: AsyncMutex<mpsc::UnboundedReceiver<R>>,
    submit: mpsc::UnboundedSender<R>,
    results: mpsc::UnboundedSender<R::Output>,
    outstanding: AtomicUsize,
    drained: Notify,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<R: Resolve> Shared<R> {
    fn submit(&self, request: R) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        // The receiver lives in `self.pending`, so this cannot fail while
        // `self` is alive.
        let _ = self.submit.send(request);
    }

    fn finish_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_one();
        }
    }
}

pub struct FetchScheduler<R: Resolve> {
    ctx: Arc<R::Context>,
    workers: usize,
}

impl<R: Resolve> FetchScheduler<R> {
    pub fn new(ctx: Arc<R::Context>, workers: usize) -> Self {
        Self {
            ctx,
            workers: workers.max(1),
        }
    }

    /// Start executing `seeds`. Results arrive on the returned stream in
    /// completion order; the stream ends once all work has drained.
    pub fn run(self, seeds: Vec<R>) -> ResultStream<R::Output> {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(Mutex::new(HashSet::new()));

        let shared = Arc::new(Shared {
            pending: AsyncMutex::new(submit_rx),
            submit: submit_tx,
            results: results_tx,
            outstanding: AtomicUsize::new(0),
            drained: Notify::new(),
            in_flight: Arc::clone(&in_flight),
        });

        let supervisor = tokio::spawn(supervise(shared, self.ctx, self.workers, seeds));

        ResultStream {
            rx: results_rx,
            in_flight,
            supervisor,
        }
    }
}

async fn supervise<R: Resolve>(
    shared: Arc<Shared<R>>,
    ctx: Arc<R::Context>,
    workers: usize,
    seeds: Vec<R>,
) {
    if seeds.is_empty() {
        return;
    }

    tracing::debug!(seeds = seeds.len(), workers, "starting fetch workers");
    for seed in seeds {
        shared.submit(seed);
    }

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        pool.spawn(work(worker_id, Arc::clone(&shared), Arc::clone(&ctx)));
    }

    shared.drained.notified().await;
    pool.shutdown().await;
    tracing::debug!("fetch work drained");
}

async fn work<R: Resolve>(worker_id: usize, shared: Arc<Shared<R>>, ctx: Arc<R::Context>) {
    loop {
        let next = {
            let mut pending = shared.pending.lock().await;
            pending.recv().await
        };
        let Some(request) = next else {
            break;
        };

        let id = request.id();
        tracing::debug!(worker_id, request = %id, "resolving");
        lock_in_flight(&shared.in_flight).insert(id.clone());

        let Resolution { result, follow_ups } = request.resolve(&ctx).await;
        if let Some(result) = result {
            // A closed stream means the consumer went away; keep draining.
            let _ = shared.results.send(result);
        }
        for follow_up in follow_ups {
            shared.submit(follow_up);
        }

        lock_in_flight(&shared.in_flight).remove(&id);
        shared.finish_one();
    }
}

fn lock_in_flight(set: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|e| e.into_inner())
}

/// Results of a running scheduler. Dropping it cancels the remaining work.
pub struct ResultStream<T> {
    rx: mpsc::UnboundedReceiver<T>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    supervisor: JoinHandle<()>,
}

impl<T> ResultStream<T> {
    /// Next result, or `None` once all work has drained.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

}

impl<T> Drop for ResultStream<T> {
    fn drop(&mut self) {
        {
            let cancelled = lock_in_flight(&self.in_flight);
            if !cancelled.is_empty() {
                let mut ids: Vec<&String> = cancelled.iter().collect();
                ids.sort();
                tracing::debug!(?ids, "cancelling requests in flight");
            }
        }
        self.supervisor.abort();
    }
}
