//! Program actor
//!
//! Owns the worker processes of one program and the program's current
//! configuration. Fan-out commands touch every worker; reconfiguration may
//! grow or shrink the worker set and force restarts when spawn-time
//! attributes changed.

use crate::config::ProgramConfiguration;
use crate::domain::{process_id, program_state, DomainError, ProcessState, Result};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::messages::{ProcessCommand, ProgramMsg};
use super::process::{ProcessActor, ProcessHandle};

const INBOX_CAPACITY: usize = 32;

/// Send-side view of a program actor.
#[derive(Clone, Debug)]
pub struct ProgramHandle {
    name: String,
    tx: mpsc::Sender<ProgramMsg>,
    scope: CancellationToken,
}

impl ProgramHandle {
    /// Construct a standalone program actor under `parent_scope`. The
    /// supervisor uses this for every program it installs; it is also the
    /// entry point for driving a single program without a supervisor.
    /// Autostart is the caller's decision.
    pub fn spawn(config: ProgramConfiguration, parent_scope: &CancellationToken) -> ProgramHandle {
        ProgramActor::spawn(config, parent_scope)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start every worker.
    pub async fn start(&self) -> Result<()> {
        self.send(ProgramMsg::StartAll).await
    }

    /// Stop every worker.
    pub async fn stop(&self) -> Result<()> {
        self.send(ProgramMsg::StopAll).await
    }

    /// Restart every worker.
    pub async fn restart(&self) -> Result<()> {
        self.send(ProgramMsg::RestartAll).await
    }

    /// Stop every worker, wait until each child is reaped, then tear the
    /// program's scope down. Resolves once all descendants are gone; this
    /// is the only correct shutdown path.
    pub async fn stop_and_wait(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .send(ProgramMsg::StopAndWait { done: done_tx })
            .await
            .is_err()
        {
            // inbox already gone: the program was torn down earlier
            return Ok(());
        }
        tokio::select! {
            _ = self.scope.cancelled() => Ok(()),
            _ = done_rx => Ok(()),
        }
    }

    /// Address one worker by id.
    pub async fn process_command(&self, id: &str, command: ProcessCommand) -> Result<()> {
        self.request(|reply| ProgramMsg::Process {
            id: id.to_string(),
            command,
            reply,
        })
        .await?
    }

    pub async fn config(&self) -> Result<ProgramConfiguration> {
        self.request(|reply| ProgramMsg::GetConfig { reply }).await
    }

    pub async fn set_config(&self, config: ProgramConfiguration) -> Result<()> {
        self.send(ProgramMsg::SetConfig { config }).await
    }

    pub async fn processes(&self) -> Result<Vec<ProcessHandle>> {
        self.request(|reply| ProgramMsg::GetProcesses { reply }).await
    }

    pub async fn sorted_processes(&self) -> Result<Vec<ProcessHandle>> {
        self.request(|reply| ProgramMsg::GetSortedProcesses { reply })
            .await
    }

    /// Aggregate state over a snapshot of every worker.
    pub async fn state(&self) -> Result<ProcessState> {
        let mut states = Vec::new();
        for process in self.processes().await? {
            states.push(process.snapshot().await?.state);
        }
        Ok(program_state(&states))
    }

    async fn send(&self, msg: ProgramMsg) -> Result<()> {
        tokio::select! {
            _ = self.scope.cancelled() => Err(DomainError::ChannelClosed),
            sent = self.tx.send(msg) => sent.map_err(|_| DomainError::ChannelClosed),
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> ProgramMsg) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        tokio::select! {
            _ = self.scope.cancelled() => Err(DomainError::ChannelClosed),
            reply = reply_rx => reply.map_err(|_| DomainError::ChannelClosed),
        }
    }
}

pub(crate) struct ProgramActor {
    name: String,
    config: ProgramConfiguration,
    processes: HashMap<String, ProcessHandle>,
    tx: mpsc::Sender<ProgramMsg>,
    scope: CancellationToken,
}

impl ProgramActor {
    /// Construct the actor with its initial worker set and spawn its loop.
    /// Autostart is the owner's call, not ours.
    pub(crate) fn spawn(
        config: ProgramConfiguration,
        parent_scope: &CancellationToken,
    ) -> ProgramHandle {
        let scope = parent_scope.child_token();
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

        let name = config.name.clone();
        let mut processes = HashMap::new();
        for index in 1..=config.numprocs {
            let id = process_id(&name, index);
            processes.insert(id.clone(), ProcessActor::spawn(id, tx.clone(), &scope));
        }

        let handle = ProgramHandle {
            name: name.clone(),
            tx: tx.clone(),
            scope: scope.clone(),
        };

        let actor = ProgramActor {
            name,
            config,
            processes,
            tx,
            scope,
        };
        tokio::spawn(actor.run(rx));

        handle
    }

    async fn run(mut self, mut rx: mpsc::Receiver<ProgramMsg>) {
        loop {
            tokio::select! {
                _ = self.scope.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg).await;
                }
            }
        }
        debug!(program = %self.name, "program actor stopped");
    }

    async fn handle(&mut self, msg: ProgramMsg) {
        match msg {
            ProgramMsg::StartAll => {
                info!(program = %self.name, "starting program");
                for process in self.sorted() {
                    let _ = process.start().await;
                }
            }
            ProgramMsg::StopAll => {
                info!(program = %self.name, "stopping program");
                for process in self.sorted() {
                    let _ = process.stop().await;
                }
            }
            ProgramMsg::RestartAll => {
                info!(program = %self.name, "restarting program");
                for process in self.sorted() {
                    let _ = process.restart().await;
                }
            }

            ProgramMsg::StopAndWait { done } => {
                let processes = self.sorted();
                let scope = self.scope.clone();
                let name = self.name.clone();
                tokio::spawn(async move {
                    for process in &processes {
                        let _ = process.stop().await;
                    }
                    for process in &processes {
                        process.wait().await;
                    }
                    info!(program = %name, "program torn down");
                    scope.cancel();
                    let _ = done.send(());
                });
            }

            ProgramMsg::Process { id, command, reply } => {
                let result = match self.processes.get(&id) {
                    None => Err(DomainError::ProcessNotFound(id)),
                    Some(process) => {
                        let _ = match command {
                            ProcessCommand::Start => process.start().await,
                            ProcessCommand::Stop => process.stop().await,
                            ProcessCommand::Restart => process.restart().await,
                            ProcessCommand::Kill => process.kill().await,
                        };
                        Ok(())
                    }
                };
                let _ = reply.send(result);
            }

            ProgramMsg::GetConfig { reply } => {
                let _ = reply.send(self.config.clone());
            }

            ProgramMsg::SetConfig { config } => self.apply_config(config).await,

            ProgramMsg::GetProcesses { reply } => {
                let _ = reply.send(self.processes.values().cloned().collect());
            }
            ProgramMsg::GetSortedProcesses { reply } => {
                let _ = reply.send(self.sorted());
            }

            ProgramMsg::RemoveProcess { id } => {
                if let Some(process) = self.processes.remove(&id) {
                    debug!(program = %self.name, process = %id, "worker removed");
                    process.close();
                }
            }
        }
    }

    /// Reconfigure in place. Spawn-time attribute changes force restarts;
    /// a numprocs delta grows or shrinks the worker set. Removal of a
    /// surplus worker is deferred until its current life has been reaped.
    async fn apply_config(&mut self, new: ProgramConfiguration) {
        let requires_restart = self.config.requires_restart(&new);
        let current = self.processes.len() as u32;
        let target = new.numprocs;

        info!(
            program = %self.name,
            numprocs = target,
            requires_restart = requires_restart,
            "applying configuration"
        );

        self.config = new;

        if target < current {
            for index in (target + 1)..=current {
                let id = process_id(&self.name, index);
                if let Some(process) = self.processes.get(&id) {
                    let waiter = process.clone();
                    let inbox = self.tx.clone();
                    let scope = self.scope.clone();
                    tokio::spawn(async move {
                        waiter.wait().await;
                        let remove = ProgramMsg::RemoveProcess {
                            id: waiter.id().to_string(),
                        };
                        tokio::select! {
                            _ = scope.cancelled() => {}
                            _ = inbox.send(remove) => {}
                        }
                    });
                    let _ = process.stop().await;
                }
            }
            if requires_restart {
                self.restart_indices(1..=target).await;
            }
        } else if target > current {
            for index in (current + 1)..=target {
                let id = process_id(&self.name, index);
                let process = ProcessActor::spawn(id.clone(), self.tx.clone(), &self.scope);
                if self.config.autostart {
                    let _ = process.start().await;
                }
                self.processes.insert(id, process);
            }
            if requires_restart {
                self.restart_indices(1..=current).await;
            }
        } else if requires_restart {
            self.restart_indices(1..=target).await;
        }
    }

    async fn restart_indices(&self, indices: std::ops::RangeInclusive<u32>) {
        for index in indices {
            let id = process_id(&self.name, index);
            if let Some(process) = self.processes.get(&id) {
                let _ = process.restart().await;
            }
        }
    }

    fn sorted(&self) -> Vec<ProcessHandle> {
        let mut processes: Vec<ProcessHandle> = self.processes.values().cloned().collect();
        processes.sort_by(|a, b| a.id().cmp(b.id()));
        processes
    }
}
