use crate::isolation::Limits;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CHILD_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Everything the pipeline needs to know, fixed at construction.
#[derive(Clone, Debug)]
pub struct ExecConfig {
    /// Shared directory holding every job's script and result files.
    pub scratch_dir: PathBuf,
    /// Wall-clock budget for one child process.
    pub timeout: Duration,
    /// Executable used to run scripts.
    pub runtime: PathBuf,
    /// Arguments placed before the script path.
    pub runtime_args: Vec<String>,
    /// The only `PATH` the child sees.
    pub child_path: String,
    pub max_concurrent_jobs: usize,
    pub queue_capacity: usize,
    /// Per stream. Output past this is read and dropped.
    pub max_output_bytes: usize,
    pub max_result_bytes: u64,
    pub limits: Limits,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("/tmp"),
            timeout: DEFAULT_TIMEOUT,
            runtime: PathBuf::from("python3"),
            runtime_args: vec!["-I".to_string()],
            child_path: DEFAULT_CHILD_PATH.to_string(),
            max_concurrent_jobs: 4,
            queue_capacity: 32,
            max_output_bytes: 1024 * 1024,
            max_result_bytes: 16 * 1024 * 1024,
            limits: Limits {
                cpu_seconds: Some(cpu_budget(DEFAULT_TIMEOUT)),
                memory_bytes: Some(512 * 1024 * 1024),
                max_processes: None,
                max_file_bytes: Some(64 * 1024 * 1024),
                max_open_files: Some(256),
            },
        }
    }
}

/// CPU seconds allowed for a given wall-clock timeout: the timeout rounded up, plus one.
///
/// The wall-clock deadline is the real bound; the rlimit only catches a child
/// that somehow escapes it.
pub fn cpu_budget(timeout: Duration) -> u64 {
    let whole = timeout.as_secs();
    let rounded = if timeout.subsec_nanos() > 0 { whole + 1 } else { whole };
    rounded + 1
}
