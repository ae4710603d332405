use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use execlib::{ExecError, ExecutionOutcome, ExecutionReport, Executor, Job};
use serde::Serialize;
use serde_json::{json, Value};

// axum clones the state per request; the executor handle is cheap to clone
#[derive(Clone)]
pub struct ExecService {
    executor: Executor,
}

/// Body of every `/execute` response.
#[derive(Debug, Default, Serialize)]
pub struct ExecuteResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

pub fn router(executor: Executor, max_request_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/execute", post(execute))
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .with_state(ExecService { executor })
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn execute(State(service): State<ExecService>, body: Bytes) -> Response {
    let job = match Job::from_json(&body) {
        Ok(job) => job,
        Err(err) => return error_response(err),
    };
    let job_id = job.id;
    tracing::info!(%job_id, script_bytes = job.script.len(), "execute request");
    match service.executor.execute(job).await {
        Ok(report) => report_response(report),
        Err(err) => {
            tracing::info!(%job_id, error = %err, "execute request rejected");
            error_response(err)
        }
    }
}

/// Status and body for a job that ran.
pub fn report_response(report: ExecutionReport) -> Response {
    let ExecutionReport {
        outcome, streams, ..
    } = report;
    let mut body = ExecuteResponse {
        stdout: Some(streams.stdout),
        stderr: Some(streams.stderr).filter(|stderr| !stderr.is_empty()),
        truncated: streams.truncated,
        ..ExecuteResponse::default()
    };
    let status = match outcome {
        ExecutionOutcome::Success { value } => {
            body.result = Some(value);
            StatusCode::OK
        }
        // a script that raises is a normal outcome, not a server fault
        ExecutionOutcome::ScriptError { message } => {
            body.error = Some(format!("Script execution error: {}", message));
            StatusCode::OK
        }
        ExecutionOutcome::Timeout => {
            body.error = Some("Script execution timed out".into());
            StatusCode::REQUEST_TIMEOUT
        }
        // details are logged by the pipeline, not handed to the client
        ExecutionOutcome::InfrastructureError { .. } => {
            body.error = Some("Internal server error".into());
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(body)).into_response()
}

/// Status and body for a job that never ran.
pub fn error_response(err: ExecError) -> Response {
    let (status, message) = match &err {
        ExecError::InvalidRequest(msg) | ExecError::InvalidScript(msg) => {
            (StatusCode::BAD_REQUEST, msg.clone())
        }
        ExecError::Busy => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Server busy, retry later".to_string(),
        ),
        ExecError::Shutdown => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Server shutting down".to_string(),
        ),
        ExecError::Scratch(_) => {
            tracing::error!(error = %err, "scratch directory unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    let body = ExecuteResponse {
        error: Some(message),
        ..ExecuteResponse::default()
    };
    (status, Json(body)).into_response()
}
