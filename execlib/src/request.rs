//! Decoding of the inbound `{"script": "..."}` payload.

use crate::errors::{ExecError, Result};
use crate::types::Job;
use serde_json::Value;

impl Job {
    /// Build a job from a raw request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|_| ExecError::InvalidRequest("Request must be JSON".into()))?;
        match payload.get("script") {
            Some(Value::String(script)) => Ok(Job::new(script.as_str())),
            Some(_) => Err(ExecError::InvalidRequest("'script' must be a string".into())),
            None => Err(ExecError::InvalidRequest(
                "Missing 'script' field in request".into(),
            )),
        }
    }
}
