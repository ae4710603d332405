//! Shallow structural pre-check of submitted scripts.
//!
//! This is a textual scan, not a parse: a `def main(` inside a string literal
//! or behind dead code passes, and an entry point built at runtime fails.

use crate::errors::{ExecError, Result};

const ENTRY_POINT: &str = "main";

pub fn validate(script: &str) -> Result<()> {
    if script.trim().is_empty() {
        return Err(ExecError::InvalidScript(
            "Script content cannot be empty".into(),
        ));
    }
    if !script.lines().any(defines_entry_point) {
        return Err(ExecError::InvalidScript(
            "Script must contain a main() function".into(),
        ));
    }
    Ok(())
}

/// Matches `def main(` and `async def main(`, with any whitespace between tokens.
fn defines_entry_point(line: &str) -> bool {
    let line = line.trim_start();
    let line = match line.strip_prefix("async") {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => line,
    };
    let rest = match line.strip_prefix("def") {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => return false,
    };
    match rest.strip_prefix(ENTRY_POINT) {
        Some(rest) => rest.trim_start().starts_with('('),
        None => false,
    }
}
