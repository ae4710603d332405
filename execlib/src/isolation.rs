//! Pluggable confinement for the script runtime.
//!
//! A policy gets two chances to act: `confine` runs on the command before it
//! is spawned (its effects happen in the child between fork and exec), and
//! `attach` runs with the live pid right after spawn. Backends that work on a
//! running process, such as cgroups, only need `attach`.

use std::fmt;
use std::io;
use tokio::process::Command;

/// Resource limits handed to an isolation policy. `None` leaves a limit untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Limits {
    pub cpu_seconds: Option<u64>,
    pub memory_bytes: Option<u64>,
    pub max_processes: Option<u64>,
    pub max_file_bytes: Option<u64>,
    pub max_open_files: Option<u64>,
}

pub trait IsolationPolicy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn confine(&self, command: &mut Command, limits: &Limits) -> io::Result<()>;

    fn attach(&self, _pid: u32, _limits: &Limits) -> io::Result<()> {
        Ok(())
    }
}

/// No confinement at all. The child runs with the server's privileges.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unconfined;

impl IsolationPolicy for Unconfined {
    fn name(&self) -> &'static str {
        "none"
    }

    fn confine(&self, _command: &mut Command, _limits: &Limits) -> io::Result<()> {
        Ok(())
    }
}

/// POSIX rlimits applied in the child before exec.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResourceLimits;

impl IsolationPolicy for ResourceLimits {
    fn name(&self) -> &'static str {
        "rlimit"
    }

    fn confine(&self, command: &mut Command, limits: &Limits) -> io::Result<()> {
        let limits = *limits;
        // SAFETY: the closure only calls setrlimit, which is async-signal-safe,
        // and touches no state shared with the parent.
        unsafe {
            command.pre_exec(move || apply_rlimits(&limits));
        }
        Ok(())
    }
}

fn apply_rlimits(limits: &Limits) -> io::Result<()> {
    let wanted = [
        (libc::RLIMIT_CPU, limits.cpu_seconds),
        (libc::RLIMIT_AS, limits.memory_bytes),
        (libc::RLIMIT_NPROC, limits.max_processes),
        (libc::RLIMIT_FSIZE, limits.max_file_bytes),
        (libc::RLIMIT_NOFILE, limits.max_open_files),
    ];
    for (resource, value) in wanted {
        let value = match value {
            Some(value) => value as libc::rlim_t,
            None => continue,
        };
        let rlimit = libc::rlimit {
            rlim_cur: value,
            rlim_max: value,
        };
        // SAFETY: rlimit is a valid, fully initialised struct.
        if unsafe { libc::setrlimit(resource, &rlimit) } != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
