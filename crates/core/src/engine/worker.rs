//! The engine's worker thread.
//!
//! One platform thread runs the tick loop: while a job set is in flight it
//! processes one item step per tick at the configured interval, otherwise
//! it idles at the longer poll period. The spawner blocks until the thread
//! has started, so engine calls made right after construction are observed.

use crate::engine::{Shared, Step};
use mk_protocol::config_models::EngineSettings;

/// Slack for the job-set consistency checks. Summing `len` copies of
/// `1.0 / len` lands slightly off 1.0 for most lengths; only gaps larger
/// than accumulated rounding are worth a warning.
const PROGRESS_SLACK: f64 = 1e-6;

/// Progress claims more than the finished item count supports.
fn progress_overshoot(progress: f64, cursor: usize, len: usize) -> bool {
    progress > 1.0 + PROGRESS_SLACK && cursor < len
}

/// All items finished but the reported deltas fell short of 1.0.
fn progress_shortfall(progress: f64, cursor: usize, len: usize) -> bool {
    progress < 1.0 - PROGRESS_SLACK && cursor >= len
}
use std::sync::atomic::Ordering;
use std::sync::{Arc, MutexGuard};
use std::thread::{self, JoinHandle};

/// Handle to the spawned worker thread.
pub(super) struct Worker {
    join: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker and wait for it to enter its run loop.
    pub(super) fn spawn<J, R>(
        shared: Arc<Shared<J, R>>,
        settings: EngineSettings,
    ) -> std::io::Result<Self>
    where
        J: Send + 'static,
        R: Send + 'static,
    {
        // Rendezvous channel: the send blocks until the spawner receives,
        // so the startup handshake is a true synchronization point.
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<()>(0);

        let join = thread::Builder::new()
            .name("meshkit-engine".to_string())
            .spawn(move || {
                let _ = ready_tx.send(());
                shared.run_loop(&settings);
            })?;

        let _ = ready_rx.recv();

        Ok(Self { join: Some(join) })
    }

    /// Join the worker thread. Idempotent.
    pub(super) fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl<J, R> Shared<J, R> {
    /// The worker run loop. Exits only when the stop flag is raised;
    /// `clear` never reaches this flag.
    fn run_loop(&self, settings: &EngineSettings) {
        while !self.stop.load(Ordering::Acquire) {
            if self.in_flight.load(Ordering::Acquire) {
                self.tick();
                thread::sleep(settings.tick_interval());
            } else {
                thread::sleep(settings.idle_poll());
            }
        }
        log::debug!("engine worker stopping");
    }

    /// Process one step of the current job set.
    fn tick(&self) {
        // Take the cursor item and the transform out of the shared state so
        // the driver thread is never blocked behind a transform call.
        let (mut item, mut transform, epoch, cursor) = {
            let mut inner = self.lock();

            if inner.pending.is_empty() {
                // Trivial completion of an empty job set.
                self.finish(inner);
                return;
            }
            if inner.cursor >= inner.pending.len() {
                self.finish(inner);
                return;
            }

            let cursor = inner.cursor;
            let Some(item) = inner.pending[cursor].take() else {
                // Slot vacated by a concurrent reset; nothing to do.
                return;
            };
            let Some(transform) = inner.transform.take() else {
                inner.pending[cursor] = Some(item);
                return;
            };
            (item, transform, inner.epoch, cursor)
        };

        let step = transform(&mut item);

        let mut inner = self.lock();

        // Put the transform back unless a new one was bound meanwhile.
        if inner.transform.is_none() {
            inner.transform = Some(transform);
        }

        if inner.epoch != epoch {
            // The job set was cleared while the transform ran; the item and
            // its outcome belong to a dead job set.
            return;
        }

        let per_item = inner.per_item;
        match step {
            Step::Pending { delta } => {
                self.progress.add(delta * per_item);
                inner.pending[cursor] = Some(item);
            }
            Step::Done { result, delta } => {
                self.progress.add(delta * per_item);
                inner.results.push_back(result);
                inner.pending[cursor] = Some(item);
                inner.cursor += 1;
            }
            Step::Failed { message } => {
                log::warn!("work item {cursor} failed: {message}");
                if !inner.error_text.is_empty() {
                    inner.error_text.push('\n');
                }
                inner.error_text.push_str(&message);
                inner.pending[cursor] = Some(item);
                inner.cursor += 1;
            }
        }

        // Per-tick deltas come from client code and need not sum to 1 per
        // item; mismatches are diagnostic only.
        let len = inner.pending.len();
        let progress = self.progress.get();
        let cursor = inner.cursor;
        if progress_overshoot(progress, cursor, len) {
            log::warn!("progress {progress:.3} exceeds 1.0 with {cursor} of {len} items finished");
        }
        if progress_shortfall(progress, cursor, len) {
            log::warn!("progress {progress:.3} below 1.0 but all {len} items finished");
        }

        if cursor >= len {
            self.finish(inner);
        }
    }

    /// Complete the current job set: clamp progress, lower the in-flight
    /// flag, and wake anyone blocked in `wait_settled`.
    fn finish(&self, inner: MutexGuard<'_, super::Inner<J, R>>) {
        self.progress.set(1.0);
        self.in_flight.store(false, Ordering::Release);
        drop(inner);
        self.settled.notify_all();
    }
}
