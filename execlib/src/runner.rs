//! Spawns the script runtime on a workspace's script file and enforces the
//! wall-clock deadline.

use crate::config::ExecConfig;
use crate::isolation::{IsolationPolicy, Limits};
use crate::outcome::{CapturedStreams, Output, RunnerStatus};
use crate::workspace::Workspace;

use bytes::{Bytes, BytesMut};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    select,
    signal::unix::{signal, SignalKind},
    sync::mpsc,
    task::JoinHandle,
};

/// How long to keep collecting output after the child is gone. A descendant
/// that left the process group can hold the pipes open forever.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Fallback poll interval while waiting for the child to exit, in case a
/// SIGCHLD for it was coalesced with another child's.
const EXIT_POLL: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct RunOutput {
    pub streams: CapturedStreams,
    pub status: RunnerStatus,
}

#[derive(Clone, Debug)]
pub struct Runner {
    runtime: PathBuf,
    runtime_args: Vec<String>,
    child_path: String,
    max_output_bytes: usize,
    limits: Limits,
    isolation: Arc<dyn IsolationPolicy>,
}

impl Runner {
    pub fn new(config: &ExecConfig, isolation: Arc<dyn IsolationPolicy>) -> Self {
        Self {
            runtime: config.runtime.clone(),
            runtime_args: config.runtime_args.clone(),
            child_path: config.child_path.clone(),
            max_output_bytes: config.max_output_bytes,
            limits: config.limits,
            isolation,
        }
    }

    fn command(&self, workspace: &Workspace) -> io::Result<Command> {
        let mut command = Command::new(&self.runtime);
        command
            .args(&self.runtime_args)
            .arg(workspace.script_path())
            .current_dir(workspace.scratch_dir())
            .env_clear()
            .env("PATH", &self.child_path)
            .env("HOME", workspace.scratch_dir())
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // SAFETY: setpgid is async-signal-safe and only affects the child.
        unsafe {
            command.pre_exec(|| {
                if libc::setpgid(0, 0) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self.isolation.confine(&mut command, &self.limits)?;
        Ok(command)
    }

    /// Run the workspace's script to completion or until `deadline` passes.
    ///
    /// Errors only when the child could not be started or waited on; in that
    /// case nothing is left running.
    pub async fn run(&self, workspace: &Workspace, deadline: Duration) -> io::Result<RunOutput> {
        let mut child = self.command(workspace)?.spawn()?;
        let pid = child.id();
        tracing::debug!(?pid, policy = self.isolation.name(), "spawned script runtime");

        if let Some(pid) = pid {
            if let Err(err) = self.isolation.attach(pid, &self.limits) {
                terminate(&mut child, Some(pid)).await;
                return Err(err);
            }
        }

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let tx = output_tx.clone();
            readers.push(spawn_reader(stdout, tx, self.max_output_bytes, Output::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, output_tx, self.max_output_bytes, Output::Stderr));
        }

        let status = select! {
            exit_status = wait_then_kill_group(&mut child, pid) => match exit_status {
                Ok(exit_status) => status_of(exit_status),
                Err(err) => {
                    terminate(&mut child, pid).await;
                    abort_all(&readers);
                    return Err(err);
                }
            },
            _ = tokio::time::sleep(deadline) => {
                tracing::debug!(?pid, ?deadline, "deadline passed, killing script runtime");
                terminate(&mut child, pid).await;
                RunnerStatus::TimedOut
            }
        };

        let streams = collect(output_rx, readers).await;
        Ok(RunOutput { streams, status })
    }
}

fn status_of(exit_status: ExitStatus) -> RunnerStatus {
    match (exit_status.code(), exit_status.signal()) {
        (Some(code), _) => RunnerStatus::Exited { code },
        (None, Some(signal)) => RunnerStatus::Killed { signal },
        // not produced on unix
        (None, None) => RunnerStatus::Exited { code: -1 },
    }
}

/// Wait for the child to exit, SIGKILL whatever is left in its process group,
/// then reap it.
///
/// The child stays unreaped while the group is signalled, so its pid, and with
/// it the group id, cannot be reused by an unrelated process group in between.
async fn wait_then_kill_group(child: &mut Child, pid: Option<u32>) -> io::Result<ExitStatus> {
    if let Some(pid) = pid {
        let mut sigchld = signal(SignalKind::child())?;
        while !has_exited(pid)? {
            select! {
                _ = sigchld.recv() => {}
                _ = tokio::time::sleep(EXIT_POLL) => {}
            }
        }
        kill_group(pid);
    }
    child.wait().await
}

/// Whether the child has exited, without reaping it.
fn has_exited(pid: u32) -> io::Result<bool> {
    // SAFETY: waitid only writes into `info`, and WNOWAIT leaves the child
    // waitable for the later reap.
    let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::waitid(
            libc::P_PID,
            pid as libc::id_t,
            &mut info,
            libc::WEXITED | libc::WNOHANG | libc::WNOWAIT,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    // left zeroed when the child is still running
    Ok(info.si_signo == libc::SIGCHLD)
}

/// Kill the child's whole process group, then reap the child.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_group(pid);
    }
    let _ = child.start_kill();
    if let Err(err) = child.wait().await {
        tracing::warn!(?pid, error = %err, "failed to reap script runtime");
    }
}

/// SIGKILL every process in the group the child created with setpgid.
fn kill_group(pgid: u32) {
    // SAFETY: killpg takes plain integers and has no memory effects.
    // ESRCH just means the group is already empty.
    unsafe {
        libc::killpg(pgid as libc::pid_t, libc::SIGKILL);
    }
}

/// Forward a pipe's bytes until EOF. Returns whether anything was dropped at the cap.
fn spawn_reader<R>(
    mut pipe: R,
    output_tx: mpsc::UnboundedSender<Output>,
    cap: usize,
    wrap: fn(Bytes) -> Output,
) -> JoinHandle<bool>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(4096);
        let mut forwarded = 0usize;
        let mut truncated = false;
        loop {
            match pipe.read_buf(&mut buf).await {
                Ok(n) if n > 0 => {
                    // move the bytes out of buf; past the cap they are read and dropped
                    // so the child never blocks on a full pipe
                    let mut chunk = buf.split().freeze();
                    let room = cap.saturating_sub(forwarded);
                    if chunk.len() > room {
                        chunk.truncate(room);
                        truncated = true;
                    }
                    if !chunk.is_empty() {
                        forwarded += chunk.len();
                        let _ = output_tx.send(wrap(chunk));
                    }
                }
                _ => break,
            }
        }
        truncated
    })
}

/// Gather output until every reader is done or the grace period runs out.
async fn collect(
    mut output_rx: mpsc::UnboundedReceiver<Output>,
    readers: Vec<JoinHandle<bool>>,
) -> CapturedStreams {
    let mut stdout = BytesMut::new();
    let mut stderr = BytesMut::new();
    let drain = async {
        while let Some(output) = output_rx.recv().await {
            match output {
                Output::Stdout(blob) => stdout.extend_from_slice(&blob),
                Output::Stderr(blob) => stderr.extend_from_slice(&blob),
            }
        }
    };
    let mut truncated = false;
    if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
        tracing::warn!("script output still open after exit, dropping the rest");
        abort_all(&readers);
        truncated = true;
    } else {
        // the channel only closes once every reader has returned
        for reader in readers {
            truncated |= reader.await.unwrap_or(false);
        }
    }
    CapturedStreams {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        truncated,
    }
}

fn abort_all<T>(readers: &[JoinHandle<T>]) {
    for reader in readers {
        reader.abort();
    }
}
