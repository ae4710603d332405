use std::{io, result};
use thiserror::Error;

/// Failures that keep a job from producing an `ExecutionOutcome` at all.
///
/// Everything that happens after a workspace is allocated is reported as an
/// outcome instead, see `crate::outcome::ExecutionOutcome`.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    InvalidScript(String),
    #[error("executor is at capacity")]
    Busy,
    #[error("executor has shut down")]
    Shutdown,
    #[error("scratch directory unavailable: {0}")]
    Scratch(#[source] io::Error),
}

pub type Result<T> = result::Result<T, ExecError>;
