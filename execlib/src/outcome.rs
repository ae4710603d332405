use crate::types::{JobId, OutputBlob};
use serde_json::Value;
use std::time::Duration;

/// How the child process ended, as seen by the runner.
///
/// The runner does not judge success: a child is expected to leave a result
/// artifact even when it exits non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerStatus {
    Exited { code: i32 },
    Killed { signal: i32 },
    TimedOut,
}

#[derive(Clone, Debug)]
pub enum Output {
    Stdout(OutputBlob),
    Stderr(OutputBlob),
}

/// Stdout and stderr of one child, fully buffered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturedStreams {
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream hit the capture cap.
    pub truncated: bool,
}

/// The classified result of one job. Exactly one variant applies.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionOutcome {
    Success { value: Value },
    ScriptError { message: String },
    Timeout,
    InfrastructureError { message: String },
}

impl ExecutionOutcome {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ExecutionOutcome::InfrastructureError {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success { .. } => "success",
            ExecutionOutcome::ScriptError { .. } => "script_error",
            ExecutionOutcome::Timeout => "timeout",
            ExecutionOutcome::InfrastructureError { .. } => "infrastructure_error",
        }
    }
}

/// Everything the caller gets back for one job.
#[derive(Clone, Debug)]
pub struct ExecutionReport {
    pub job_id: JobId,
    pub outcome: ExecutionOutcome,
    pub streams: CapturedStreams,
    /// `None` when the child never ran.
    pub status: Option<RunnerStatus>,
    pub elapsed: Duration,
}
