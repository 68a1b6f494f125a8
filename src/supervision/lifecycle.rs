//! Process lifecycle driver
//!
//! Applies events to the transition table and runs the on-entry action of
//! each state reached: launching the child, arming the stop escalation,
//! deciding on backoff and on relaunch-after-exit. An action may return a
//! follow-up event, which is fed to the machine immediately; the whole
//! `send` is serialized by one gate so a lifecycle never interleaves.

use crate::cmdline;
use crate::config::Autorestart;
use crate::domain::machine::next_state;
use crate::domain::{DomainError, ProcessEvent, ProcessState, Result};
use crate::infrastructure::spawn::{self, SpawnPlan};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::process::ProcessHandle;

struct MachineState {
    current: ProcessState,
    starttries: u32,
    last_error: Option<String>,
}

struct MachineInner {
    process: ProcessHandle,
    state: Mutex<MachineState>,
    /// Serializes `send`: transitions from the timers, the reaper and the
    /// inbox never interleave
    gate: tokio::sync::Mutex<()>,
}

/// Cheap-clone handle to the machine; helpers hold their own clone.
#[derive(Clone)]
pub(crate) struct ProcessMachine {
    inner: Arc<MachineInner>,
}

impl ProcessMachine {
    pub(crate) fn new(process: ProcessHandle) -> Self {
        ProcessMachine {
            inner: Arc::new(MachineInner {
                process,
                state: Mutex::new(MachineState {
                    current: ProcessState::Stopped,
                    starttries: 0,
                    last_error: None,
                }),
                gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn process(&self) -> &ProcessHandle {
        &self.inner.process
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MachineState> {
        self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Current state, readable while a transition is in flight.
    pub(crate) fn current(&self) -> ProcessState {
        self.state().current
    }

    /// Apply `event`, then run entry actions until one settles.
    ///
    /// Boxed to break the type-level recursion: `on_enter` -> `launch` spawns
    /// a task whose body calls back into `send`, which would otherwise make
    /// the compiler try to compute an infinitely recursive `impl Future` type.
    pub(crate) fn send(
        &self,
        event: ProcessEvent,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessState>> + Send + '_>> {
        Box::pin(async move {
            let _gate = self.inner.gate.lock().await;

            let mut event = event;
            loop {
                let reached = {
                    let mut state = self.state();
                    let next = next_state(state.current, event)
                        .map_err(DomainError::InvalidTransition)?;
                    state.current = next;
                    next
                };

                info!(
                    program = %self.program_name(),
                    process = %self.process().id(),
                    state = %reached,
                    "process state changed"
                );

                match self.on_enter(reached).await? {
                    Some(followup) => event = followup,
                    None => return Ok(reached),
                }
            }
        })
    }

    async fn on_enter(&self, state: ProcessState) -> Result<Option<ProcessEvent>> {
        match state {
            ProcessState::Starting => self.launch().await,
            ProcessState::Running => {
                self.reset_starttries();
                Ok(None)
            }
            ProcessState::Stopping => {
                let followup = self.begin_stop().await?;
                self.reset_starttries();
                Ok(followup)
            }
            ProcessState::Backoff => self.decide_backoff().await,
            ProcessState::Exited => self.decide_relaunch().await,
            ProcessState::Fatal => {
                self.log_fatal();
                self.reset_starttries();
                Ok(None)
            }
            ProcessState::Stopped | ProcessState::Unknown => Ok(None),
        }
    }

    /// STARTING entry: resolve configuration, build the command line, spawn
    /// the child, arm the start-time timer and the reaper.
    ///
    /// Parse and spawn failures are not surfaced to the caller: they route
    /// the machine to BACKOFF through a synthetic `stopped`.
    async fn launch(&self) -> Result<Option<ProcessEvent>> {
        let config = self.process().config().await?;
        let id = self.process().id().to_string();

        let expanded = cmdline::expand_env(&config.cmd);
        let command = match cmdline::tokenize(&expanded) {
            Ok(command) => command,
            Err(err) => {
                warn!(process = %id, error = %err, "command line rejected");
                self.record_error(err.to_string());
                return Ok(Some(ProcessEvent::Stopped));
            }
        };

        let mut env: BTreeMap<String, String> = std::env::vars().collect();
        env.extend(config.env.clone());

        let plan = SpawnPlan {
            command,
            env,
            workingdir: config.workingdir.clone(),
            umask: config.umask.clone(),
            stdout: config.stdout_path(&id),
            stderr: config.stderr_path(&id),
        };

        let dead = self.process().new_dead_token().await?;

        let spawned = match spawn::spawn_child(plan).await {
            Ok(spawned) => spawned,
            Err(err) => {
                warn!(process = %id, error = %err, "launch failed");
                self.record_error(err.to_string());
                // this life never existed; release its rendezvous
                dead.cancel();
                return Ok(Some(ProcessEvent::Stopped));
            }
        };

        self.process()
            .launched(spawned.pid, spawned.stdout, spawned.stderr)
            .await?;

        let machine = self.clone();
        let timer_dead = dead.clone();
        let starttime = config.starttime;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(starttime)) => {
                    let _ = machine.send(ProcessEvent::Started).await;
                }
                _ = timer_dead.cancelled() => {}
            }
        });

        let machine = self.clone();
        let mut child = spawned.child;
        tokio::spawn(async move {
            let status = tokio::task::spawn_blocking(move || child.wait()).await;
            let exit_code = match status {
                Ok(Ok(status)) => status.code(),
                Ok(Err(err)) => {
                    error!(process = %machine.process().id(), error = %err, "wait failed");
                    None
                }
                Err(err) => {
                    error!(process = %machine.process().id(), error = %err, "wait task failed");
                    None
                }
            };

            let _ = machine.process().reaped(exit_code).await;
            // The rendezvous must only close after the machine has observed
            // `stopped`; the restart handshake depends on that order.
            if let Err(err) = machine.send(ProcessEvent::Stopped).await {
                debug!(process = %machine.process().id(), error = %err, "reap event dropped");
            }
            dead.cancel();
        });

        Ok(None)
    }

    /// STOPPING entry: deliver the configured stop signal and arm the
    /// SIGKILL escalation. A failed delivery does not disarm the timer.
    async fn begin_stop(&self) -> Result<Option<ProcessEvent>> {
        let config = self.process().config().await?;

        if let Some(pid) = self.process().pid().await? {
            match spawn::kill(pid, config.stopsignal.to_raw()) {
                Ok(()) => {
                    debug!(
                        process = %self.process().id(),
                        pid = pid,
                        signal = %config.stopsignal,
                        "stop signal delivered"
                    )
                }
                Err(err) => {
                    warn!(
                        process = %self.process().id(),
                        pid = pid,
                        error = %err,
                        "stop signal delivery failed"
                    )
                }
            }
        }

        let dead = self.process().dead_token().await?;
        let process = self.process().clone();
        let stoptime = config.stoptime;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(stoptime)) => {
                    let _ = process.kill().await;
                }
                _ = dead.cancelled() => {}
            }
        });

        Ok(None)
    }

    /// BACKOFF entry: either give up for this lifecycle or count a retry
    /// and go again.
    async fn decide_backoff(&self) -> Result<Option<ProcessEvent>> {
        let config = self.process().config().await?;

        let mut state = self.state();
        if state.starttries >= config.startretries {
            state.last_error = Some(format!(
                "reached maximum start retries: {}",
                state.starttries
            ));
            Ok(Some(ProcessEvent::Fatal))
        } else {
            state.starttries += 1;
            Ok(Some(ProcessEvent::Start))
        }
    }

    /// EXITED entry: relaunch according to the autorestart policy.
    async fn decide_relaunch(&self) -> Result<Option<ProcessEvent>> {
        let config = self.process().config().await?;

        match config.autorestart {
            Autorestart::On => Ok(Some(ProcessEvent::Start)),
            Autorestart::Off => Ok(None),
            Autorestart::Unexpected => {
                let exit_code = self.process().exit_code().await?;
                // a signal death has no exit code and counts as unexpected
                let expected = exit_code
                    .map(|code| config.exitcodes.contains(&code))
                    .unwrap_or(false);
                if expected {
                    Ok(None)
                } else {
                    Ok(Some(ProcessEvent::Start))
                }
            }
        }
    }

    fn reset_starttries(&self) {
        self.state().starttries = 0;
    }

    fn record_error(&self, message: String) {
        self.state().last_error = Some(message);
    }

    fn log_fatal(&self) {
        let (retries, last_error) = {
            let state = self.state();
            (state.starttries, state.last_error.clone())
        };
        error!(
            program = %self.program_name(),
            process = %self.process().id(),
            retries = retries,
            error = last_error.as_deref().unwrap_or("unknown"),
            "process has fatally exited"
        );
    }

    fn program_name(&self) -> &str {
        let id = self.process().id();
        id.rsplit_once('_').map(|(program, _)| program).unwrap_or(id)
    }
}
