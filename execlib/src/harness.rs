//! Wraps an untrusted script with a fixed trailer that calls `main` and
//! records what happened in the workspace's result file.
//!
//! The trailer runs after the script's own top-level code, so the script can
//! neither skip nor replace it. The child always tries to leave exactly one of
//! `{"result": <value>}` or `{"error": "<message>"}`, and exits 1 on the latter.

use crate::workspace::Workspace;
use std::io;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

const TRAILER: &str = r#"


import json as _harness_json
import sys as _harness_sys

if __name__ == "__main__":
    try:
        _harness_payload = _harness_json.dumps({"result": main()}, allow_nan=False)
    except BaseException as _harness_exc:
        _harness_message = str(_harness_exc)
        if _harness_message:
            _harness_message = "%s: %s" % (type(_harness_exc).__name__, _harness_message)
        else:
            _harness_message = type(_harness_exc).__name__
        with open(__RESULT_PATH__, "w") as _harness_file:
            _harness_json.dump({"error": _harness_message}, _harness_file)
        _harness_sys.exit(1)
    with open(__RESULT_PATH__, "w") as _harness_file:
        _harness_file.write(_harness_payload)
"#;

/// Script text followed by the trailer, pointed at `result_path`.
pub fn render(script: &str, result_path: &Path) -> io::Result<String> {
    let result_path = result_path.to_str().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "result path is not valid UTF-8")
    })?;
    // a JSON string is also a valid Python string literal
    let literal = serde_json::to_string(result_path)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let mut source = String::with_capacity(script.len() + TRAILER.len() + literal.len() * 2);
    source.push_str(script);
    source.push_str(&TRAILER.replace("__RESULT_PATH__", &literal));
    Ok(source)
}

/// Writes the wrapped script to the workspace's script file.
///
/// Refuses to overwrite an existing file: a collision means the workspace
/// token was not unique.
pub async fn materialize(workspace: &Workspace, script: &str) -> io::Result<()> {
    let source = render(script, workspace.result_path())?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(workspace.script_path())
        .await?;
    file.write_all(source.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
