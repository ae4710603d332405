use std::time::SystemTime;
use uuid::Uuid;

pub type JobId = Uuid;
pub type Script = String;
pub type OutputBlob = bytes::Bytes;

/// One execution request.
///
/// The id is always generated here, never taken from the caller.
#[derive(Clone, Debug)]
pub struct Job {
    pub id: JobId,
    pub script: Script,
    pub created_at: SystemTime,
}

impl Job {
    pub fn new(script: impl Into<Script>) -> Self {
        Self {
            id: Uuid::new_v4(),
            script: script.into(),
            created_at: SystemTime::now(),
        }
    }
}
