//! The background work engine.
//!
//! A [`WorkEngine`] owns one dedicated worker thread that consumes a queue
//! of work items, produces results, and reports fractional progress. The
//! driver thread (the editor's render loop) enqueues items with
//! [`WorkEngine::add_item`], starts consumption with [`WorkEngine::kick`],
//! and drains results once per frame with [`WorkEngine::poll`].
//!
//! ## Job sets
//!
//! All items enqueued between one `kick` and its completion form a job set.
//! At most one job set is ever in flight; a second `kick` while working is
//! rejected. Within a job set, progress is monotonic and results are
//! delivered in the order items were enqueued.
//!
//! ## Chunked items
//!
//! The transform may return [`Step::Pending`] to indicate that the current
//! item needs more ticks; the engine re-invokes the transform on the same
//! item until it returns [`Step::Done`] or [`Step::Failed`].
//!
//! ## Reset vs. shutdown
//!
//! [`WorkEngine::clear`] is a soft reset: it empties the queues and aborts
//! the current job set, but the worker thread stays alive and a later
//! `kick` works. [`WorkEngine::stop`] (also run on drop) is terminal.

mod worker;

pub mod progress;

pub use progress::AtomicProgress;

use crate::engine::worker::Worker;
use mk_protocol::config_models::EngineSettings;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Outcome of one transform invocation on one work item.
#[derive(Debug)]
pub enum Step<R> {
    /// The item is not finished; invoke the transform on it again next
    /// tick. `delta` is the fraction of *this item* completed this tick.
    Pending { delta: f64 },

    /// The item is finished and produced a result.
    Done { result: R, delta: f64 },

    /// The item cannot be processed. The engine advances past it, produces
    /// no result, and accumulates the message for the current job set.
    Failed { message: String },
}

/// The client-supplied transform, invoked once per tick on the current
/// work item. Bound once per engine instance before the first kick.
pub type Transform<J, R> = Box<dyn FnMut(&mut J) -> Step<R> + Send>;

/// State guarded by the engine lock.
struct Inner<J, R> {
    /// Pending work items. Slots are `None` only while the worker has the
    /// item out for a transform call.
    pending: Vec<Option<J>>,

    /// Completed results awaiting collection, FIFO.
    results: VecDeque<R>,

    /// Cursor into `pending`; advances only when a tick completes an item.
    cursor: usize,

    /// Progress contribution of one fully completed item.
    per_item: f64,

    /// Bumped by `clear`; a tick whose epoch no longer matches discards
    /// its outcome.
    epoch: u64,

    /// The bound transform. Taken out by the worker for the duration of a
    /// transform call so the lock is never held while client code runs.
    transform: Option<Transform<J, R>>,

    /// True once a transform has ever been bound. Stays true while the
    /// worker has the transform out, so a kick racing a mid-tick clear is
    /// not spuriously rejected.
    transform_bound: bool,

    /// Failure messages accumulated during the current job set.
    error_text: String,
}

/// State shared between the client handle and the worker thread.
struct Shared<J, R> {
    inner: Mutex<Inner<J, R>>,

    /// Notified whenever the in-flight flag is lowered.
    settled: Condvar,

    /// Written by the worker outside the lock; see [`AtomicProgress`].
    progress: AtomicProgress,

    /// True while a job set is executing.
    in_flight: AtomicBool,

    /// Terminal shutdown signal. Deliberately separate from the reset path
    /// taken by `clear`, which must leave the worker running.
    stop: AtomicBool,
}

impl<J, R> Shared<J, R> {
    fn lock(&self) -> MutexGuard<'_, Inner<J, R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The background work engine.
///
/// See the [module documentation](self) for the execution model.
pub struct WorkEngine<J, R> {
    shared: Arc<Shared<J, R>>,
    worker: Worker,
}

impl<J, R> WorkEngine<J, R>
where
    J: Send + 'static,
    R: Send + 'static,
{
    /// Start an engine and its worker thread.
    ///
    /// Blocks until the worker has entered its run loop, so a `kick`
    /// issued immediately after this returns will be observed.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn start(settings: &EngineSettings) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                pending: Vec::new(),
                results: VecDeque::new(),
                cursor: 0,
                per_item: 0.0,
                epoch: 0,
                transform: None,
                transform_bound: false,
                error_text: String::new(),
            }),
            settled: Condvar::new(),
            progress: AtomicProgress::new(),
            in_flight: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        });

        let worker = Worker::spawn(Arc::clone(&shared), settings.clone())?;

        Ok(Self { shared, worker })
    }

    /// Bind the transform invoked on each work item.
    ///
    /// Returns `false` (and changes nothing) while the engine is working.
    pub fn bind_transform<F>(&self, transform: F) -> bool
    where
        F: FnMut(&mut J) -> Step<R> + Send + 'static,
    {
        if self.is_working() {
            log::debug!("bind_transform rejected: engine is working");
            return false;
        }
        let mut inner = self.shared.lock();
        inner.transform = Some(Box::new(transform));
        inner.transform_bound = true;
        true
    }

    /// Append a work item to the pending list.
    ///
    /// Silently ignored while the engine is working, so the list being
    /// iterated by the worker is never mutated mid-job-set.
    pub fn add_item(&self, item: J) {
        if self.is_working() {
            log::debug!("add_item ignored: engine is working");
            return;
        }
        self.shared.lock().pending.push(Some(item));
    }

    /// Start consuming the pending list as one job set.
    ///
    /// Fails (returns `false`, no state change) if a job set is already in
    /// flight, results are not yet drained, or no transform is bound. On
    /// success the result queue and cursor are reset and the in-flight
    /// flag raised; there is at most one job set in flight at a time.
    pub fn kick(&self) -> bool {
        if self.is_working() {
            log::debug!("kick rejected: engine is working");
            return false;
        }

        let mut inner = self.shared.lock();
        if !inner.transform_bound {
            log::debug!("kick rejected: no transform bound");
            return false;
        }

        inner.results.clear();
        inner.error_text.clear();
        inner.cursor = 0;
        inner.per_item = if inner.pending.is_empty() {
            0.0
        } else {
            1.0 / inner.pending.len() as f64
        };
        self.shared.progress.set(0.0);
        self.shared.in_flight.store(true, Ordering::Release);

        true
    }

    /// True while a job set is in flight or results remain undrained.
    pub fn is_working(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire) || !self.shared.lock().results.is_empty()
    }

    /// Pop at most one result (FIFO) and report the current progress.
    ///
    /// Safe to call while idle: returns `(None, progress)` unchanged.
    pub fn poll(&self) -> (Option<R>, f64) {
        let result = self.shared.lock().results.pop_front();
        (result, self.shared.progress.get())
    }

    /// Current progress in `[0, 1]`, without touching the result queue.
    pub fn progress(&self) -> f64 {
        self.shared.progress.get()
    }

    /// Number of items in the pending list.
    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Drain the failure text accumulated during the current job set.
    pub fn take_error_text(&self) -> String {
        std::mem::take(&mut self.shared.lock().error_text)
    }

    /// Soft reset between job sets.
    ///
    /// Empties the pending list and result queue, zeroes progress, and
    /// aborts the current job set if one is in flight. The worker thread
    /// keeps running; a later [`kick`](Self::kick) works normally. The
    /// bound transform survives.
    pub fn clear(&self) {
        let mut inner = self.shared.lock();
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.pending.clear();
        inner.results.clear();
        inner.error_text.clear();
        inner.cursor = 0;
        inner.per_item = 0.0;
        self.shared.progress.set(0.0);
        self.shared.in_flight.store(false, Ordering::Release);
        drop(inner);
        self.shared.settled.notify_all();
    }

    /// Block until no job set is in flight.
    ///
    /// Waits on the engine's condition variable rather than spinning.
    /// Results may still be queued afterwards; drain them with
    /// [`poll`](Self::poll).
    pub fn wait_settled(&self) {
        let mut inner = self.shared.lock();
        while self.shared.in_flight.load(Ordering::Acquire) {
            inner = self
                .shared
                .settled
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Terminal shutdown: stop the worker loop and join the thread.
    ///
    /// Only intended for subsystem teardown; use [`clear`](Self::clear)
    /// to reset between job sets.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.worker.join();
    }
}

impl<J, R> Drop for WorkEngine<J, R> {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.worker.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> EngineSettings {
        EngineSettings {
            tick_interval_ms: 1,
            idle_poll_ms: 1,
        }
    }

    #[test]
    fn test_kick_without_transform_fails() {
        let engine: WorkEngine<u32, u32> =
            WorkEngine::start(&test_settings()).expect("Failed to start engine");
        engine.add_item(1);

        assert!(!engine.kick());
        assert!(!engine.is_working());
    }

    #[test]
    fn test_poll_while_idle_is_safe() {
        let engine: WorkEngine<u32, u32> =
            WorkEngine::start(&test_settings()).expect("Failed to start engine");

        let (result, progress) = engine.poll();
        assert!(result.is_none());
        assert_eq!(progress, 0.0);
    }

    #[test]
    fn test_add_item_while_idle_grows_pending() {
        let engine: WorkEngine<u32, u32> =
            WorkEngine::start(&test_settings()).expect("Failed to start engine");

        engine.add_item(1);
        engine.add_item(2);
        assert_eq!(engine.pending_len(), 2);
    }

    #[test]
    fn test_stop_joins_worker() {
        let mut engine: WorkEngine<u32, u32> =
            WorkEngine::start(&test_settings()).expect("Failed to start engine");
        engine.stop();
        // A second stop (and the drop) must be harmless.
        engine.stop();
    }
}
