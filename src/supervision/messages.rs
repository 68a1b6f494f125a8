//! Actor inbox messages
//!
//! One tagged variant set per actor. Queries carry a oneshot reply slot;
//! commands are fire-and-forget. The sets are closed on purpose: an actor's
//! contract is exactly its message enum.

use crate::config::raw::{ProgramDocument, ProgramsDocument};
use crate::config::{ProgramConfiguration, ProgramsConfiguration};
use crate::domain::{ProcessSnapshot, Result};
use std::fs::File;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::process::ProcessHandle;
use super::program::ProgramHandle;

/// Per-process commands that can also be addressed through a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessCommand {
    Start,
    Stop,
    Restart,
    Kill,
}

pub(crate) enum ProcessMsg {
    /// Feed `start` to the machine
    Start,
    /// Feed `stop` to the machine
    Stop,
    /// Stop, wait for the death rendezvous, start again
    Restart,
    /// SIGKILL the current child, bypassing the machine
    Kill,

    /// Current program configuration, proxied to the owning program
    GetConfig {
        reply: oneshot::Sender<ProgramConfiguration>,
    },
    Snapshot {
        reply: oneshot::Sender<ProcessSnapshot>,
    },
    Pid {
        reply: oneshot::Sender<Option<u32>>,
    },
    ExitCode {
        reply: oneshot::Sender<Option<i32>>,
    },
    /// The rendezvous of the current life
    DeadToken {
        reply: oneshot::Sender<CancellationToken>,
    },
    /// Allocate the rendezvous for the life about to start
    NewDeadToken {
        reply: oneshot::Sender<CancellationToken>,
    },

    // Bookkeeping posted by the launch pipeline and the reaper
    Launched {
        pid: u32,
        stdout: Option<File>,
        stderr: Option<File>,
    },
    Reaped {
        exit_code: Option<i32>,
    },
}

pub(crate) enum ProgramMsg {
    StartAll,
    StopAll,
    RestartAll,
    /// Stop every process, wait for every reap, cancel the program scope,
    /// then signal `done`
    StopAndWait {
        done: oneshot::Sender<()>,
    },
    Process {
        id: String,
        command: ProcessCommand,
        reply: oneshot::Sender<Result<()>>,
    },
    GetConfig {
        reply: oneshot::Sender<ProgramConfiguration>,
    },
    SetConfig {
        config: ProgramConfiguration,
    },
    GetProcesses {
        reply: oneshot::Sender<Vec<ProcessHandle>>,
    },
    GetSortedProcesses {
        reply: oneshot::Sender<Vec<ProcessHandle>>,
    },
    /// Posted by a shrink task once the process's current life has ended
    RemoveProcess {
        id: String,
    },
}

pub(crate) enum SupervisorMsg {
    GetProgram {
        id: String,
        reply: oneshot::Sender<Option<ProgramHandle>>,
    },
    GetPrograms {
        reply: oneshot::Sender<Vec<ProgramHandle>>,
    },
    GetDocument {
        reply: oneshot::Sender<ProgramsDocument>,
    },
    /// Replace the document and diff-apply the validated configurations
    Apply {
        document: ProgramsDocument,
        configurations: ProgramsConfiguration,
        persist: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    RefreshFromFile {
        reply: oneshot::Sender<Result<()>>,
    },
    AddProgram {
        name: String,
        program: ProgramDocument,
        reply: oneshot::Sender<Result<()>>,
    },
    EditProgram {
        id: String,
        name: String,
        program: ProgramDocument,
        reply: oneshot::Sender<Result<()>>,
    },
    DeleteProgram {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Quit,
}
