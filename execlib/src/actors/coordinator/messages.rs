use crate::outcome::ExecutionReport;
use crate::types::Job;
use crate::errors;
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum CoordinatorMessage {
    Execute {
        job: Job,
        response: oneshot::Sender<errors::Result<ExecutionReport>>,
    },
}
