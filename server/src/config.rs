use clap::{ArgEnum, Parser};
use execlib::config::cpu_budget;
use execlib::isolation::{IsolationPolicy, Limits, ResourceLimits, Unconfined};
use execlib::ExecConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Serve a script execution API over HTTP
#[derive(Debug, Parser)]
#[clap(name = "server")]
pub struct ServerConfig {
    /// Address to listen on
    #[clap(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[clap(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// Wall-clock limit for a single script, in seconds
    #[clap(long, env = "EXEC_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Directory for per-job script and result files
    #[clap(long, env = "SCRATCH_DIR", default_value = "/tmp")]
    pub scratch_dir: PathBuf,

    /// Executable that runs the scripts
    #[clap(long, env = "SCRIPT_RUNTIME", default_value = "python3")]
    pub runtime: PathBuf,

    /// Scripts allowed to run at the same time
    #[clap(long, env = "MAX_CONCURRENT_JOBS", default_value = "4")]
    pub max_concurrent_jobs: usize,

    /// Scripts allowed to wait for a free slot before requests are turned away
    #[clap(long, env = "QUEUE_CAPACITY", default_value = "32")]
    pub queue_capacity: usize,

    /// Bytes of stdout and of stderr kept per script
    #[clap(long, env = "MAX_OUTPUT_BYTES", default_value = "1048576")]
    pub max_output_bytes: usize,

    /// Largest accepted request body, in bytes
    #[clap(long, env = "MAX_REQUEST_BYTES", default_value = "2097152")]
    pub max_request_bytes: usize,

    /// How scripts are confined
    #[clap(long, env = "ISOLATION_POLICY", arg_enum, default_value = "rlimit")]
    pub isolation: IsolationKind,

    /// Address space limit for a script in MiB, 0 for none
    #[clap(long, env = "MEMORY_LIMIT_MB", default_value = "512")]
    pub memory_limit_mb: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ArgEnum)]
pub enum IsolationKind {
    /// no confinement
    #[clap(name = "none")]
    Unconfined,
    /// POSIX resource limits
    Rlimit,
}

impl ServerConfig {
    pub fn exec_config(&self) -> ExecConfig {
        let defaults = ExecConfig::default();
        let timeout = Duration::from_secs(self.timeout_secs);
        let memory_bytes = match self.memory_limit_mb {
            0 => None,
            mb => Some(mb * 1024 * 1024),
        };
        ExecConfig {
            scratch_dir: self.scratch_dir.clone(),
            timeout,
            runtime: self.runtime.clone(),
            max_concurrent_jobs: self.max_concurrent_jobs,
            queue_capacity: self.queue_capacity,
            max_output_bytes: self.max_output_bytes,
            limits: Limits {
                cpu_seconds: Some(cpu_budget(timeout)),
                memory_bytes,
                ..defaults.limits
            },
            ..defaults
        }
    }

    pub fn isolation_policy(&self) -> Arc<dyn IsolationPolicy> {
        match self.isolation {
            IsolationKind::Unconfined => Arc::new(Unconfined),
            IsolationKind::Rlimit => Arc::new(ResourceLimits),
        }
    }
}
