//! Turns a runner status plus the workspace's result file into an outcome.
//!
//! Precedence: a timeout always wins, even over an artifact the child managed
//! to write just before it was killed. Then a missing artifact, then the
//! artifact's own `error` or `result` field.

use crate::outcome::{ExecutionOutcome, RunnerStatus};
use crate::workspace::Workspace;
use serde_json::Value;
use std::io;

pub const NO_RESULT: &str = "no result produced";
pub const MALFORMED_RESULT: &str = "malformed result";
pub const RESULT_TOO_LARGE: &str = "result too large";

pub async fn extract(
    workspace: &Workspace,
    status: RunnerStatus,
    max_bytes: u64,
) -> ExecutionOutcome {
    if status == RunnerStatus::TimedOut {
        return ExecutionOutcome::Timeout;
    }

    let path = workspace.result_path();
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return ExecutionOutcome::infrastructure(NO_RESULT)
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "cannot stat result artifact");
            return ExecutionOutcome::infrastructure(NO_RESULT);
        }
    };
    if metadata.len() > max_bytes {
        return ExecutionOutcome::infrastructure(RESULT_TOO_LARGE);
    }

    match tokio::fs::read(path).await {
        Ok(raw) => parse_artifact(&raw),
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "cannot read result artifact");
            ExecutionOutcome::infrastructure(MALFORMED_RESULT)
        }
    }
}

/// Classify the artifact's content. It must be a JSON object.
pub fn parse_artifact(raw: &[u8]) -> ExecutionOutcome {
    let mut fields = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(fields)) => fields,
        _ => return ExecutionOutcome::infrastructure(MALFORMED_RESULT),
    };
    if let Some(error) = fields.remove("error") {
        let message = match error {
            Value::String(message) => message,
            other => other.to_string(),
        };
        return ExecutionOutcome::ScriptError { message };
    }
    ExecutionOutcome::Success {
        value: fields.remove("result").unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceManager;
    use serde_json::json;
    use uuid::Uuid;

    const MAX: u64 = 1024;

    fn with_artifact(manager: &WorkspaceManager, content: Option<&str>) -> Workspace {
        let workspace = manager.allocate(Uuid::new_v4());
        if let Some(content) = content {
            std::fs::write(workspace.result_path(), content).unwrap();
        }
        workspace
    }

    #[tokio::test]
    async fn timeout_beats_a_stale_artifact() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let workspace = with_artifact(&manager, Some(r#"{"result": 1}"#));
        assert_eq!(
            extract(&workspace, RunnerStatus::TimedOut, MAX).await,
            ExecutionOutcome::Timeout
        );
    }

    #[tokio::test]
    async fn missing_artifact_is_infrastructure_error() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let workspace = with_artifact(&manager, None);
        assert_eq!(
            extract(&workspace, RunnerStatus::Exited { code: 0 }, MAX).await,
            ExecutionOutcome::infrastructure(NO_RESULT)
        );
        assert_eq!(
            extract(&workspace, RunnerStatus::Killed { signal: 9 }, MAX).await,
            ExecutionOutcome::infrastructure(NO_RESULT)
        );
    }

    #[tokio::test]
    async fn exit_code_does_not_decide_the_outcome() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let artifact = r#"{"error": "ZeroDivisionError: division by zero"}"#;
        let workspace = with_artifact(&manager, Some(artifact));
        let outcome = extract(&workspace, RunnerStatus::Exited { code: 1 }, MAX).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::ScriptError {
                message: "ZeroDivisionError: division by zero".into()
            }
        );

        let workspace = with_artifact(&manager, Some(r#"{"result": [1, 2]}"#));
        let outcome = extract(&workspace, RunnerStatus::Exited { code: 1 }, MAX).await;
        assert_eq!(outcome, ExecutionOutcome::Success { value: json!([1, 2]) });
    }

    #[tokio::test]
    async fn oversized_artifact_is_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(scratch.path()).unwrap();
        let big = format!(r#"{{"result": "{}"}}"#, "x".repeat(2048));
        let workspace = with_artifact(&manager, Some(&big));
        assert_eq!(
            extract(&workspace, RunnerStatus::Exited { code: 0 }, MAX).await,
            ExecutionOutcome::infrastructure(RESULT_TOO_LARGE)
        );
    }

    #[test]
    fn success_uses_result_field() {
        assert_eq!(
            parse_artifact(br#"{"result": {"a": 1}}"#),
            ExecutionOutcome::Success { value: json!({"a": 1}) }
        );
    }

    #[test]
    fn integers_beyond_u64_keep_every_digit() {
        match parse_artifact(br#"{"result": [1180591620717411303424, -1180591620717411303424]}"#) {
            ExecutionOutcome::Success { value } => assert_eq!(
                value.to_string(),
                "[1180591620717411303424,-1180591620717411303424]"
            ),
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[test]
    fn absent_result_is_null_not_error() {
        assert_eq!(
            parse_artifact(b"{}"),
            ExecutionOutcome::Success { value: Value::Null }
        );
        assert_eq!(
            parse_artifact(br#"{"result": null}"#),
            ExecutionOutcome::Success { value: Value::Null }
        );
    }

    #[test]
    fn error_field_wins_over_result() {
        assert_eq!(
            parse_artifact(br#"{"result": 1, "error": "boom"}"#),
            ExecutionOutcome::ScriptError { message: "boom".into() }
        );
    }

    #[test]
    fn non_string_error_is_rendered_as_json() {
        assert_eq!(
            parse_artifact(br#"{"error": {"code": 7}}"#),
            ExecutionOutcome::ScriptError { message: r#"{"code":7}"#.into() }
        );
    }

    #[test]
    fn unparseable_or_non_object_is_malformed() {
        let malformed = ExecutionOutcome::infrastructure(MALFORMED_RESULT);
        assert_eq!(parse_artifact(b""), malformed);
        assert_eq!(parse_artifact(br#"{"result": "#), malformed);
        assert_eq!(parse_artifact(b"[1, 2, 3]"), malformed);
        assert_eq!(parse_artifact(b"42"), malformed);
    }
}
