//! The pass pipeline.
//!
//! A [`PassPipeline`] sequences a queue of passes over a host context.
//! Each pass, when invoked, typically binds a transform, enqueues work
//! items into the host's [`WorkEngine`], and kicks it; the pipeline then
//! waits (via per-frame polling) for that job set to complete before
//! advancing to the next pass.
//!
//! ## Driving
//!
//! The driver loop calls [`PassPipeline::poll_once`] exactly once per
//! external tick (one rendered frame in the editor shell). Passes execute
//! strictly in enqueue order and never concurrently; a pass that enqueues
//! no work is complete on the next poll.
//!
//! ## Failure and cancellation
//!
//! A pass returning an error aborts every remaining pass: the queue is
//! emptied and the terminated flag is sticky until the next
//! [`arm`](PassPipeline::arm). The failure is persisted through the
//! configured [`ErrorSink`] under the failing pass's sequence number, as
//! is any error text the engine accumulated during a pass's job set.
//! [`cancel`](PassPipeline::cancel) reaches the same terminal path without
//! shutting the engine's worker down.

pub mod sink;

pub use sink::{ErrorSink, FileErrorSink, MemoryErrorSink};

use crate::engine::WorkEngine;
use chrono::{DateTime, Utc};
use mk_protocol::pass_models::{PassFailure, RunOutcome, RunSummary};
use mk_protocol::status_models::{RunPhase, StatusLine};
use std::collections::VecDeque;
use uuid::Uuid;

/// Host context the passes and the pipeline operate on.
///
/// The host owns the engine plus whatever domain state the passes mutate
/// (in the editor shell: the imported asset and its derived buffers).
pub trait PassHost {
    /// Work item type fed to the engine.
    type Job: Send + 'static;

    /// Result type drained from the engine.
    type Output: Send + 'static;

    /// The engine the passes enqueue work into.
    fn engine(&self) -> &WorkEngine<Self::Job, Self::Output>;

    /// Reset processing state before a pass runs. Implementations should
    /// call [`WorkEngine::clear`] so the pass starts from a clean engine.
    fn reset(&mut self);

    /// Receive one drained engine result.
    fn absorb(&mut self, output: Self::Output);
}

type PassFn<H> = Box<dyn FnMut(&mut H) -> anyhow::Result<()> + Send>;

/// One pipeline stage: a named function invoked at most once per queue
/// position. Returning an error aborts the remaining pipeline.
pub struct Pass<H> {
    name: String,
    run: PassFn<H>,
}

impl<H> Pass<H> {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: FnMut(&mut H) -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Sequences passes over a [`PassHost`]; see the
/// [module documentation](self).
pub struct PassPipeline<H: PassHost> {
    queue: VecDeque<Pass<H>>,
    current_index: usize,
    progress: f64,
    working: bool,
    terminated: bool,
    cancelled: bool,
    status: StatusLine,
    phase: RunPhase,
    failure: Option<PassFailure>,
    run_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    summary: Option<RunSummary>,
    sink: Box<dyn ErrorSink + Send>,
    on_all_finished: Option<Box<dyn FnMut(&mut H) + Send>>,
}

impl<H: PassHost> PassPipeline<H> {
    /// A pipeline writing per-pass error logs through `sink`.
    pub fn new<S>(sink: S) -> Self
    where
        S: ErrorSink + Send + 'static,
    {
        Self {
            queue: VecDeque::new(),
            current_index: 0,
            progress: 0.0,
            working: false,
            terminated: false,
            cancelled: false,
            status: StatusLine::default(),
            phase: RunPhase::Idle,
            failure: None,
            run_id: None,
            started_at: None,
            summary: None,
            sink: Box::new(sink),
            on_all_finished: None,
        }
    }

    /// Callback invoked (with the host) when every pass completed
    /// successfully.
    pub fn set_on_all_finished<F>(&mut self, callback: F)
    where
        F: FnMut(&mut H) + Send + 'static,
    {
        self.on_all_finished = Some(Box::new(callback));
    }

    /// Arm a new run: clears any existing queue, enqueues `passes`, and
    /// resets progress, pass index, and the terminated flag.
    pub fn arm(&mut self, passes: Vec<Pass<H>>) {
        self.queue.clear();
        self.queue.extend(passes);
        self.current_index = 0;
        self.progress = 0.0;
        self.working = true;
        self.terminated = false;
        self.cancelled = false;
        self.failure = None;
        self.summary = None;
        self.phase = RunPhase::Running;
        self.run_id = Some(Uuid::new_v4());
        self.started_at = Some(Utc::now());
        self.status = StatusLine::normal("Armed");
    }

    /// Cancel the current run.
    ///
    /// Soft-clears the engine (the worker thread stays alive), drops all
    /// queued passes, and marks the run as cancelled; the next
    /// [`poll_once`](Self::poll_once) reports the terminal state.
    pub fn cancel(&mut self, host: &mut H) {
        if !self.working {
            return;
        }
        host.engine().clear();
        self.queue.clear();
        self.terminated = true;
        self.cancelled = true;
        self.status = StatusLine::normal("Cancelling");
    }

    /// Drive the pipeline by one external tick.
    ///
    /// Polls the engine (absorbing at most one result into the host), and
    /// when the engine has gone idle either finalizes the previous pass
    /// and launches the next one, or reports the terminal state. Returns
    /// the overall progress for display.
    pub fn poll_once(&mut self, host: &mut H) -> f64 {
        let (result, progress) = host.engine().poll();
        if let Some(output) = result {
            host.absorb(output);
        }
        self.progress = progress;

        if !host.engine().is_working() && self.working {
            if self.queue.is_empty() {
                self.report_terminal(host);
            } else {
                if self.current_index > 0 && self.progress == 1.0 {
                    self.finalize_pass(host);
                }
                self.launch_next_pass(host);
            }
        }

        self.progress
    }

    /// Status line for display. Read-only observer.
    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    /// Current run phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Overall progress of the current pass's job set, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// True while passes remain outstanding or queued.
    pub fn is_working(&self) -> bool {
        self.working
    }

    /// Sticky failure flag; reset only by [`arm`](Self::arm).
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// 1-based sequence number of the most recently launched pass.
    pub fn current_pass_index(&self) -> usize {
        self.current_index
    }

    /// Identifier of the current (or last) armed run.
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    /// The failure that terminated the run, if any.
    pub fn failure(&self) -> Option<&PassFailure> {
        self.failure.as_ref()
    }

    /// Summary of the finished run, available once the terminal state was
    /// reported.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Finalize the pass whose job set just completed: wait for the engine
    /// to settle, drain trailing results into the host, and persist any
    /// accumulated engine error text under this pass's sequence number.
    fn finalize_pass(&mut self, host: &mut H) {
        host.engine().wait_settled();
        loop {
            let (result, _) = host.engine().poll();
            match result {
                Some(output) => host.absorb(output),
                None => break,
            }
        }

        let errors = host.engine().take_error_text();
        if !errors.is_empty() {
            log::warn!(
                "pass {} finished with errors, writing error{}.log",
                self.current_index,
                self.current_index
            );
            self.write_error_log(self.current_index, &errors);
        }
    }

    /// Dequeue and invoke the next pass.
    fn launch_next_pass(&mut self, host: &mut H) {
        let Some(mut pass) = self.queue.pop_front() else {
            return;
        };

        host.reset();
        self.current_index += 1;

        match (pass.run)(host) {
            Ok(()) => {
                self.status = StatusLine::normal(format!("Running pass: {}", pass.name));
                self.progress = 0.0;
            }
            Err(error) => {
                let message = format!("{error:#}");
                log::error!("pass {} ({}) failed: {message}", self.current_index, pass.name);

                self.status = StatusLine::error(format!("Pass {} failed: {message}", pass.name));
                self.queue.clear();
                self.terminated = true;
                self.failure = Some(PassFailure {
                    pass_index: self.current_index,
                    pass_name: pass.name.clone(),
                    message: message.clone(),
                });
                self.write_error_log(self.current_index, &message);
            }
        }
    }

    /// Report the terminal state of the run and lower the working flag.
    fn report_terminal(&mut self, host: &mut H) {
        // The final pass has no successor to finalize it; drain its
        // leftovers here so its error log is not lost.
        if self.current_index > 0 {
            self.finalize_pass(host);
        }

        let outcome = if !self.terminated {
            self.status = StatusLine::normal("Completed.");
            self.phase = RunPhase::Completed;
            if let Some(callback) = self.on_all_finished.as_mut() {
                callback(host);
            }
            RunOutcome::Completed
        } else if self.cancelled {
            self.status = StatusLine::normal("Cancelled.");
            self.phase = RunPhase::Cancelled;
            RunOutcome::Cancelled
        } else {
            self.status = StatusLine::error("Terminated, see error logs.");
            self.phase = RunPhase::Failed;
            RunOutcome::Failed
        };

        self.working = false;
        if let (Some(run_id), Some(started_at)) = (self.run_id, self.started_at) {
            self.summary = Some(RunSummary {
                run_id,
                outcome,
                passes_run: self.current_index,
                started_at,
                finished_at: Utc::now(),
            });
        }
    }

    fn write_error_log(&mut self, pass_index: usize, text: &str) {
        if let Err(error) = self.sink.write(pass_index, text) {
            log::error!("failed to write error log for pass {pass_index}: {error}");
        }
    }
}
