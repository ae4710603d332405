//! Validate, allocate, materialize, run, extract, release.

use crate::config::ExecConfig;
use crate::errors::Result;
use crate::extractor;
use crate::harness;
use crate::isolation::IsolationPolicy;
use crate::outcome::{CapturedStreams, ExecutionOutcome, ExecutionReport};
use crate::runner::Runner;
use crate::types::Job;
use crate::validator;
use crate::workspace::{Workspace, WorkspaceManager};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

#[derive(Clone, Debug)]
pub struct Pipeline {
    workspaces: WorkspaceManager,
    runner: Runner,
    timeout: Duration,
    max_result_bytes: u64,
}

impl Pipeline {
    pub fn new(config: &ExecConfig, isolation: Arc<dyn IsolationPolicy>) -> Result<Self> {
        Ok(Self {
            workspaces: WorkspaceManager::new(&config.scratch_dir)?,
            runner: Runner::new(config, isolation),
            timeout: config.timeout,
            max_result_bytes: config.max_result_bytes,
        })
    }

    /// Run one job end to end.
    ///
    /// Only a script rejected by the validator is an `Err`; every failure after
    /// that is reported in the outcome. The workspace is gone by the time this
    /// returns, and also if the returned future is dropped early.
    pub async fn execute(&self, job: Job) -> Result<ExecutionReport> {
        let span = tracing::info_span!("job", job_id = %job.id);
        self.execute_job(job).instrument(span).await
    }

    async fn execute_job(&self, job: Job) -> Result<ExecutionReport> {
        validator::validate(&job.script)?;

        let started = Instant::now();
        let mut workspace = self.workspaces.allocate(job.id);
        let mut report = self.execute_in(&workspace, &job).await;
        workspace.release();
        report.elapsed = started.elapsed();

        let outcome = report.outcome.kind();
        match &report.outcome {
            ExecutionOutcome::Success { .. } => {
                tracing::info!(outcome, elapsed = ?report.elapsed, "script finished");
            }
            ExecutionOutcome::ScriptError { message } => {
                tracing::info!(outcome, elapsed = ?report.elapsed, %message, "script raised");
            }
            ExecutionOutcome::Timeout => {
                tracing::warn!(outcome, timeout = ?self.timeout, "script timed out");
            }
            ExecutionOutcome::InfrastructureError { message } => {
                tracing::error!(outcome, status = ?report.status, %message, "execution failed");
            }
        }
        Ok(report)
    }

    async fn execute_in(&self, workspace: &Workspace, job: &Job) -> ExecutionReport {
        let failed = |message: &str| ExecutionReport {
            job_id: job.id,
            outcome: ExecutionOutcome::infrastructure(message),
            streams: CapturedStreams::default(),
            status: None,
            elapsed: Duration::ZERO,
        };

        if let Err(err) = harness::materialize(workspace, &job.script).await {
            tracing::error!(error = %err, "failed to write script");
            return failed("failed to write script");
        }

        let output = match self.runner.run(workspace, self.timeout).await {
            Ok(output) => output,
            Err(err) => {
                tracing::error!(error = %err, "failed to run script runtime");
                return failed("failed to start script runtime");
            }
        };
        tracing::debug!(status = ?output.status, "script runtime finished");

        ExecutionReport {
            job_id: job.id,
            outcome: extractor::extract(workspace, output.status, self.max_result_bytes).await,
            streams: output.streams,
            status: Some(output.status),
            elapsed: Duration::ZERO,
        }
    }
}
