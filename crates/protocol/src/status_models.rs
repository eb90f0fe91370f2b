//! Status models shown by the driver UI.
//!
//! The driver loop reads these once per rendered frame. They are plain
//! observers: reading them has no side effects on the pipeline or engine.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a pipeline run.
///
/// The phase progresses through these states during normal execution:
/// Idle -> Running -> Completed
///
/// Special states:
/// - Failed: a pass reported an error and the remaining passes were aborted
/// - Cancelled: the user aborted the run before it finished
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    /// No run armed, or the previous run's terminal state was observed.
    Idle,

    /// Passes are being executed.
    Running,

    /// All passes completed successfully.
    Completed,

    /// A pass failed; the remaining passes were never executed.
    Failed,

    /// The run was cancelled by an explicit cancellation signal.
    Cancelled,
}

/// One line of status text for the driver UI, with an error flag that the
/// UI maps to its normal/error styling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusLine {
    /// Human-readable status message.
    pub text: String,

    /// True when the message describes a failure.
    pub is_error: bool,
}

impl StatusLine {
    /// A status line with normal styling.
    pub fn normal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    /// A status line with error styling.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}
