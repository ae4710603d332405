//! Runs untrusted scripts in a child process under a deadline and reports a
//! structured outcome with the captured output.

mod actors;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod harness;
pub mod isolation;
pub mod outcome;
pub mod pipeline;
mod request;
pub mod runner;
pub mod types;
pub mod validator;
pub mod workspace;

// re-export the coordinator handle as if it is the executor itself.
pub use actors::coordinator::ExecutorHandle as Executor;
pub use config::ExecConfig;
pub use errors::ExecError;
pub use outcome::{CapturedStreams, ExecutionOutcome, ExecutionReport, RunnerStatus};
pub use pipeline::Pipeline;
pub use types::{Job, JobId};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolation::Unconfined;
    use crate::pipeline::tests::{python_available, test_config};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Executes scripts with `sh`. The second line keeps the validator happy
    /// and is a syntax error to sh, so nothing after it runs.
    fn sh_executor(scratch: &Path, max_running: usize, queue_capacity: usize) -> Executor {
        let config = ExecConfig {
            runtime: "sh".into(),
            runtime_args: vec![],
            ..test_config(scratch, Duration::from_secs(10))
        };
        let pipeline = Pipeline::new(&config, Arc::new(Unconfined)).unwrap();
        Executor::spawn(pipeline, max_running, queue_capacity)
    }

    fn sleeper(secs: f32) -> Job {
        Job::new(format!("sleep {}\ndef main(): pass\n", secs))
    }

    #[tokio::test]
    async fn basic() {
        if !python_available() {
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            &test_config(scratch.path(), Duration::from_secs(20)),
            Arc::new(Unconfined),
        )
        .unwrap();
        let executor = Executor::spawn(pipeline, 2, 4);
        let report = executor
            .execute(Job::new("def main():\n    print('hello world!')\n    return [1, 'two']\n"))
            .await
            .expect("execute err");
        assert_eq!(report.outcome, ExecutionOutcome::Success { value: json!([1, "two"]) });
        assert_eq!(report.streams.stdout, "hello world!\n");
    }

    #[tokio::test]
    async fn invalid_script_is_rejected_before_queueing() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(scratch.path(), 1, 1);
        let err = executor.execute(Job::new("x = 1")).await.unwrap_err();
        assert!(matches!(err, ExecError::InvalidScript(_)));
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn caps_running_jobs() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(scratch.path(), 2, 8);
        let started = Instant::now();
        let jobs = (0..4).map(|_| {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute(sleeper(1.0)).await })
        });
        for joined in futures::future::join_all(jobs).await {
            let report = joined.unwrap().unwrap();
            // sh never writes the artifact
            assert_eq!(
                report.outcome,
                ExecutionOutcome::infrastructure(extractor::NO_RESULT)
            );
        }
        // four one-second jobs, two at a time
        assert!(started.elapsed() >= Duration::from_millis(1900));
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn full_queue_is_busy() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(scratch.path(), 1, 1);

        let running = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute(sleeper(1.5)).await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;
        let queued = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.execute(sleeper(0.1)).await })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;

        let err = executor.execute(sleeper(0.1)).await.unwrap_err();
        assert!(matches!(err, ExecError::Busy));

        assert!(running.await.unwrap().is_ok());
        assert!(queued.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn abandoned_job_still_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(scratch.path(), 1, 1);
        let abandoned =
            tokio::time::timeout(Duration::from_millis(200), executor.execute(sleeper(0.5))).await;
        assert!(abandoned.is_err());

        // the slot frees up once the abandoned job is done
        let report = executor.execute(sleeper(0.0)).await.unwrap();
        assert!(matches!(report.status, Some(RunnerStatus::Exited { .. })));
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }
}
