//! Child process spawning
//!
//! Translates a validated configuration into an actual `fork`/`exec`. The
//! whole sequence (open sinks, set umask, spawn, restore umask) runs on the
//! blocking pool so a slow filesystem cannot stall the actor loops.

use crate::cmdline::ParsedCommand;
use crate::domain::{DomainError, Result};
use crate::infrastructure::umask::with_umask;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// Everything needed to launch one child.
#[derive(Debug, Clone)]
pub struct SpawnPlan {
    pub command: ParsedCommand,
    pub env: BTreeMap<String, String>,
    pub workingdir: String,
    pub umask: String,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
}

/// A successfully launched child with the parent-side sink handles.
///
/// The sinks are retained by the process actor and dropped when the child
/// is reaped.
pub struct SpawnedChild {
    pub child: Child,
    pub pid: u32,
    pub stdout: Option<File>,
    pub stderr: Option<File>,
}

fn open_sink(path: &PathBuf) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn sink_stdio(sink: &Option<File>) -> std::io::Result<Stdio> {
    match sink {
        Some(file) => Ok(Stdio::from(file.try_clone()?)),
        None => Ok(Stdio::null()),
    }
}

/// Launch the child described by `plan`.
pub async fn spawn_child(plan: SpawnPlan) -> Result<SpawnedChild> {
    tokio::task::spawn_blocking(move || spawn_blocking_inner(plan))
        .await
        .map_err(|e| DomainError::Spawn(format!("spawn task failed: {}", e)))?
}

fn spawn_blocking_inner(plan: SpawnPlan) -> Result<SpawnedChild> {
    if plan.command.cmd.is_empty() {
        return Err(DomainError::Spawn("empty command".to_string()));
    }

    let stdout = match &plan.stdout {
        Some(path) => Some(
            open_sink(path)
                .map_err(|e| DomainError::Spawn(format!("stdout sink {:?}: {}", path, e)))?,
        ),
        None => None,
    };
    let stderr = match &plan.stderr {
        Some(path) => Some(
            open_sink(path)
                .map_err(|e| DomainError::Spawn(format!("stderr sink {:?}: {}", path, e)))?,
        ),
        None => None,
    };

    let mut command = Command::new(&plan.command.cmd);
    command.args(&plan.command.args);
    command.envs(&plan.env);
    command.stdin(Stdio::null());
    command.stdout(sink_stdio(&stdout).map_err(|e| DomainError::Spawn(e.to_string()))?);
    command.stderr(sink_stdio(&stderr).map_err(|e| DomainError::Spawn(e.to_string()))?);

    if !plan.workingdir.is_empty() {
        command.current_dir(&plan.workingdir);
    }

    let child = with_umask(&plan.umask, move || command.spawn())
        .map_err(|e| DomainError::Spawn(e.to_string()))?;

    let pid = child.id();
    debug!(pid = pid, command = %plan.command.cmd, "process spawned");

    Ok(SpawnedChild {
        child,
        pid,
        stdout,
        stderr,
    })
}

/// Deliver `signal` to `pid`.
pub fn kill(pid: u32, signal: libc::c_int) -> Result<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return Err(DomainError::Signal(format!(
            "signal {} to pid {}: {}",
            signal, pid, err
        )));
    }
    Ok(())
}
