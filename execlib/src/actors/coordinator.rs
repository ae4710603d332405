mod actor;
mod messages;

use self::{
    actor::JobCoordinator,
    messages::CoordinatorMessage::{self, Execute},
};
use crate::errors::{self, ExecError};
use crate::outcome::ExecutionReport;
use crate::pipeline::Pipeline;
use crate::types::Job;
use crate::validator;
use tokio::sync::{mpsc, oneshot};

/// An admission-controlled executor for jobs.
///
/// This struct is an actor handle. The actor spawned by `ExecutorHandle::spawn`
/// owns a bounded inbox and a fixed number of run slots; the handle can be
/// cloned freely across tasks without any extra synchronization.
#[derive(Clone, Debug)]
pub struct ExecutorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
}

impl ExecutorHandle {
    /// Spawn a new executor.
    ///
    /// At most `max_running` children run at once, and at most `queue_capacity`
    /// further jobs wait for a slot. Must be called from within a tokio runtime.
    pub fn spawn(pipeline: Pipeline, max_running: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        JobCoordinator::spawn(receiver, pipeline, max_running);
        Self { sender }
    }

    /// Run a job and wait for its report.
    ///
    /// Scripts that fail validation are rejected here, before they take a
    /// place in the queue. A full queue is reported as `Busy` rather than waited on.
    pub async fn execute(&self, job: Job) -> errors::Result<ExecutionReport> {
        validator::validate(&job.script)?;
        let (tx, rx) = oneshot::channel();
        self.sender
            .try_send(Execute { job, response: tx })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => ExecError::Busy,
                mpsc::error::TrySendError::Closed(_) => ExecError::Shutdown,
            })?;
        rx.await.map_err(|_| ExecError::Shutdown)?
    }
}
