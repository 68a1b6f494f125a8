//! Process actor
//!
//! Owns one child process: the running pid, the stdio sink handles, the
//! start/end timestamps and the death rendezvous of the current life. The
//! state machine driving launches and stops lives in
//! [`super::lifecycle`]; the actor loop here only serves the inbox and
//! never blocks, so queries stay responsive while a launch is in flight.

use crate::config::ProgramConfiguration;
use crate::domain::{DomainError, ProcessEvent, ProcessSnapshot, Result};
use crate::infrastructure::spawn;
use chrono::{DateTime, Utc};
use std::fs::File;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::lifecycle::ProcessMachine;
use super::messages::{ProcessMsg, ProgramMsg};

const INBOX_CAPACITY: usize = 32;

/// Send-side view of a process actor. Cloneable; all access to the process
/// goes through it.
#[derive(Clone)]
pub struct ProcessHandle {
    id: String,
    tx: mpsc::Sender<ProcessMsg>,
    scope: CancellationToken,
}

impl ProcessHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn start(&self) -> Result<()> {
        self.send(ProcessMsg::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(ProcessMsg::Stop).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.send(ProcessMsg::Restart).await
    }

    pub async fn kill(&self) -> Result<()> {
        self.send(ProcessMsg::Kill).await
    }

    /// The owning program's current configuration.
    pub async fn config(&self) -> Result<ProgramConfiguration> {
        self.request(|reply| ProcessMsg::GetConfig { reply }).await
    }

    pub async fn snapshot(&self) -> Result<ProcessSnapshot> {
        self.request(|reply| ProcessMsg::Snapshot { reply }).await
    }

    pub async fn pid(&self) -> Result<Option<u32>> {
        self.request(|reply| ProcessMsg::Pid { reply }).await
    }

    pub(crate) async fn exit_code(&self) -> Result<Option<i32>> {
        self.request(|reply| ProcessMsg::ExitCode { reply }).await
    }

    pub(crate) async fn dead_token(&self) -> Result<CancellationToken> {
        self.request(|reply| ProcessMsg::DeadToken { reply }).await
    }

    pub(crate) async fn new_dead_token(&self) -> Result<CancellationToken> {
        self.request(|reply| ProcessMsg::NewDeadToken { reply }).await
    }

    pub(crate) async fn launched(
        &self,
        pid: u32,
        stdout: Option<File>,
        stderr: Option<File>,
    ) -> Result<()> {
        self.send(ProcessMsg::Launched { pid, stdout, stderr }).await
    }

    pub(crate) async fn reaped(&self, exit_code: Option<i32>) -> Result<()> {
        self.send(ProcessMsg::Reaped { exit_code }).await
    }

    /// Block until the current child is reaped. Returns immediately when no
    /// child has ever been launched, or when the actor is already gone.
    pub async fn wait(&self) {
        if let Ok(dead) = self.dead_token().await {
            dead.cancelled().await;
        }
    }

    /// End this actor's inbox loop. Used when the process is removed from
    /// its program; the program scope cascades here as well.
    pub(crate) fn close(&self) {
        self.scope.cancel();
    }

    async fn send(&self, msg: ProcessMsg) -> Result<()> {
        tokio::select! {
            _ = self.scope.cancelled() => Err(DomainError::ChannelClosed),
            sent = self.tx.send(msg) => sent.map_err(|_| DomainError::ChannelClosed),
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> ProcessMsg) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        tokio::select! {
            _ = self.scope.cancelled() => Err(DomainError::ChannelClosed),
            reply = reply_rx => reply.map_err(|_| DomainError::ChannelClosed),
        }
    }
}

pub(crate) struct ProcessActor {
    id: String,
    program: mpsc::Sender<ProgramMsg>,
    scope: CancellationToken,
    machine: ProcessMachine,

    pid: Option<u32>,
    exit_code: Option<i32>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    stdout: Option<File>,
    stderr: Option<File>,
    /// Rendezvous of the current life; pre-cancelled until the first launch
    dead: CancellationToken,
}

impl ProcessActor {
    /// Construct the actor, spawn its inbox loop and return the handle.
    pub(crate) fn spawn(
        id: String,
        program: mpsc::Sender<ProgramMsg>,
        parent_scope: &CancellationToken,
    ) -> ProcessHandle {
        let scope = parent_scope.child_token();
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

        let handle = ProcessHandle {
            id: id.clone(),
            tx,
            scope: scope.clone(),
        };

        let machine = ProcessMachine::new(handle.clone());

        let dead = CancellationToken::new();
        dead.cancel();

        let actor = ProcessActor {
            id,
            program,
            scope,
            machine,
            pid: None,
            exit_code: None,
            started_at: None,
            ended_at: None,
            stdout: None,
            stderr: None,
            dead,
        };
        tokio::spawn(actor.run(rx));

        handle
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ProcessMsg>) {
        loop {
            tokio::select! {
                _ = self.scope.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg);
                }
            }
        }
        debug!(process = %self.id, "process actor stopped");
    }

    fn handle(&mut self, msg: ProcessMsg) {
        match msg {
            ProcessMsg::Start => self.feed(ProcessEvent::Start),
            ProcessMsg::Stop => self.feed(ProcessEvent::Stop),

            ProcessMsg::Restart => {
                // stop, wait for the death rendezvous, then start: the wait
                // guarantees two children never coexist for this id
                let machine = self.machine.clone();
                let dead = self.dead.clone();
                let id = self.id.clone();
                tokio::spawn(async move {
                    if let Err(err) = machine.send(ProcessEvent::Stop).await {
                        debug!(process = %id, error = %err, "restart: stop not applicable");
                    }
                    dead.cancelled().await;
                    if let Err(err) = machine.send(ProcessEvent::Start).await {
                        debug!(process = %id, error = %err, "restart: start not applicable");
                    }
                });
            }

            ProcessMsg::Kill => {
                if let Some(pid) = self.pid {
                    if let Err(err) = spawn::kill(pid, libc::SIGKILL) {
                        warn!(process = %self.id, pid = pid, error = %err, "SIGKILL failed");
                    }
                }
            }

            ProcessMsg::GetConfig { reply } => {
                // proxied to the owning program; relayed off-loop so a busy
                // program inbox cannot stall this actor
                let program = self.program.clone();
                let scope = self.scope.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = scope.cancelled() => {}
                        _ = program.send(ProgramMsg::GetConfig { reply }) => {}
                    }
                });
            }

            ProcessMsg::Snapshot { reply } => {
                let _ = reply.send(ProcessSnapshot {
                    id: self.id.clone(),
                    state: self.machine.current(),
                    started_at: self.started_at,
                    ended_at: self.ended_at,
                });
            }
            ProcessMsg::Pid { reply } => {
                let _ = reply.send(self.pid);
            }
            ProcessMsg::ExitCode { reply } => {
                let _ = reply.send(self.exit_code);
            }
            ProcessMsg::DeadToken { reply } => {
                let _ = reply.send(self.dead.clone());
            }
            ProcessMsg::NewDeadToken { reply } => {
                self.dead = CancellationToken::new();
                let _ = reply.send(self.dead.clone());
            }

            ProcessMsg::Launched { pid, stdout, stderr } => {
                self.pid = Some(pid);
                self.stdout = stdout;
                self.stderr = stderr;
                self.started_at = Some(Utc::now());
                self.ended_at = None;
            }
            ProcessMsg::Reaped { exit_code } => {
                self.exit_code = exit_code;
                self.ended_at = Some(Utc::now());
                self.pid = None;
                // closes the child's stdio sinks
                self.stdout = None;
                self.stderr = None;
            }
        }
    }

    fn feed(&self, event: ProcessEvent) {
        let machine = self.machine.clone();
        let id = self.id.clone();
        tokio::spawn(async move {
            if let Err(err) = machine.send(event).await {
                debug!(process = %id, event = %event, error = %err, "event not applicable");
            }
        });
    }
}
