//! Pass outcome records.
//!
//! This module defines the structures that describe how a pipeline run
//! ended: which pass failed (if any) and a summary of the whole run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal outcome of one pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// Every queued pass executed and reported success.
    Completed,

    /// A pass reported failure; the remaining passes were aborted.
    Failed,

    /// The run was cancelled before all passes executed.
    Cancelled,
}

/// Record of a single failed pass.
///
/// The pass index is the 1-based position of the pass in the armed queue,
/// matching the sequence number used to name the on-disk error log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PassFailure {
    /// 1-based sequence number of the failing pass.
    pub pass_index: usize,

    /// Name the pass was armed under.
    pub pass_name: String,

    /// Failure message reported by the pass.
    pub message: String,
}

/// Summary of one completed (or aborted) pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSummary {
    /// Unique identifier assigned when the run was armed.
    pub run_id: Uuid,

    /// How the run ended.
    pub outcome: RunOutcome,

    /// Number of passes that were actually invoked.
    pub passes_run: usize,

    /// When the run was armed.
    pub started_at: DateTime<Utc>,

    /// When the terminal state was reached.
    pub finished_at: DateTime<Utc>,
}
