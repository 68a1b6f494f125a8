//! Supervisor
//!
//! Daemon-scope coordinator: owns the program registry, the raw
//! configuration document (the exact shape that is persisted to disk) and
//! the daemon lifecycle. Every mutation passes through the validator and is
//! applied in the single reader loop; the persisted file and the in-memory
//! document agree after every successful mutation.

use crate::config::raw::{parse_document, ProgramDocument, ProgramsDocument};
use crate::config::{validate_program, validate_programs, ProgramsConfiguration};
use crate::domain::{DomainError, Result};
use crate::infrastructure::persistence;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::messages::SupervisorMsg;
use super::program::{ProgramActor, ProgramHandle};

const INBOX_CAPACITY: usize = 32;

/// Send-side view of the supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<SupervisorMsg>,
    root: CancellationToken,
    closed: CancellationToken,
}

impl SupervisorHandle {
    pub async fn get_program(&self, id: &str) -> Result<ProgramHandle> {
        self.request(|reply| SupervisorMsg::GetProgram {
            id: id.to_string(),
            reply,
        })
        .await?
        .ok_or_else(|| DomainError::ProgramNotFound(id.to_string()))
    }

    pub async fn get_programs(&self) -> Result<Vec<ProgramHandle>> {
        self.request(|reply| SupervisorMsg::GetPrograms { reply })
            .await
    }

    pub async fn get_sorted_programs(&self) -> Result<Vec<ProgramHandle>> {
        let mut programs = self.get_programs().await?;
        programs.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(programs)
    }

    /// The current configuration document as YAML text.
    pub async fn configuration_yaml(&self) -> Result<String> {
        let document = self
            .request(|reply| SupervisorMsg::GetDocument { reply })
            .await?;
        serde_yaml::to_string(&document)
            .map_err(|e| DomainError::Persistence(format!("encode: {}", e)))
    }

    /// Parse, validate, diff-apply and persist a new document.
    pub async fn refresh_from_reader<R: Read>(&self, reader: R) -> Result<()> {
        let document = parse_document(reader)?;
        let configurations = validate_programs(&document)?;
        self.request(|reply| SupervisorMsg::Apply {
            document,
            configurations,
            persist: true,
            reply,
        })
        .await?
    }

    /// Reload the on-disk file. The file is the source of truth on this
    /// path, so it is not rewritten.
    pub async fn refresh_from_file(&self) -> Result<()> {
        self.request(|reply| SupervisorMsg::RefreshFromFile { reply })
            .await?
    }

    pub async fn add_program(&self, name: &str, program: ProgramDocument) -> Result<()> {
        self.request(|reply| SupervisorMsg::AddProgram {
            name: name.to_string(),
            program,
            reply,
        })
        .await?
    }

    pub async fn edit_program(&self, id: &str, name: &str, program: ProgramDocument) -> Result<()> {
        self.request(|reply| SupervisorMsg::EditProgram {
            id: id.to_string(),
            name: name.to_string(),
            program,
            reply,
        })
        .await?
    }

    pub async fn delete_program(&self, id: &str) -> Result<()> {
        self.request(|reply| SupervisorMsg::DeleteProgram {
            id: id.to_string(),
            reply,
        })
        .await?
    }

    /// Begin cooperative shutdown. `closed()` resolves once every program
    /// has been torn down.
    pub async fn quit(&self) {
        let _ = self.send(SupervisorMsg::Quit).await;
    }

    /// Cancelled once shutdown has fully completed.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn send(&self, msg: SupervisorMsg) -> Result<()> {
        tokio::select! {
            _ = self.root.cancelled() => Err(DomainError::ChannelClosed),
            sent = self.tx.send(msg) => sent.map_err(|_| DomainError::ChannelClosed),
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SupervisorMsg,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx)).await?;
        tokio::select! {
            _ = self.root.cancelled() => Err(DomainError::ChannelClosed),
            reply = reply_rx => reply.map_err(|_| DomainError::ChannelClosed),
        }
    }
}

pub struct Supervisor {
    programs: HashMap<String, ProgramHandle>,
    document: ProgramsDocument,
    config_path: PathBuf,
    root: CancellationToken,
    closed: CancellationToken,
}

impl Supervisor {
    /// Spawn the supervisor with an initial document and its validated
    /// form. Autostarting programs launch immediately; the initial load
    /// never rewrites the file.
    pub async fn start(
        document: ProgramsDocument,
        configurations: ProgramsConfiguration,
        config_path: PathBuf,
    ) -> SupervisorHandle {
        let root = CancellationToken::new();
        let closed = CancellationToken::new();
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

        let handle = SupervisorHandle {
            tx,
            root: root.clone(),
            closed: closed.clone(),
        };

        let mut supervisor = Supervisor {
            programs: HashMap::new(),
            document: ProgramsDocument::default(),
            config_path,
            root,
            closed,
        };
        supervisor.apply(document, configurations).await;

        tokio::spawn(supervisor.run(rx));

        handle
    }

    async fn run(mut self, mut rx: mpsc::Receiver<SupervisorMsg>) {
        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    self.handle(msg).await;
                }
            }
        }
        debug!("supervisor stopped");
    }

    async fn handle(&mut self, msg: SupervisorMsg) {
        match msg {
            SupervisorMsg::GetProgram { id, reply } => {
                let _ = reply.send(self.programs.get(&id).cloned());
            }
            SupervisorMsg::GetPrograms { reply } => {
                let _ = reply.send(self.programs.values().cloned().collect());
            }
            SupervisorMsg::GetDocument { reply } => {
                let _ = reply.send(self.document.clone());
            }

            SupervisorMsg::Apply {
                document,
                configurations,
                persist,
                reply,
            } => {
                self.apply(document, configurations).await;
                let result = if persist { self.persist() } else { Ok(()) };
                let _ = reply.send(result);
            }

            SupervisorMsg::RefreshFromFile { reply } => {
                let result = self.refresh_from_file().await;
                if let Err(err) = &result {
                    warn!(error = %err, "configuration reload failed, keeping current configuration");
                }
                let _ = reply.send(result);
            }

            SupervisorMsg::AddProgram {
                name,
                program,
                reply,
            } => {
                let _ = reply.send(self.add_program(name, program).await);
            }

            SupervisorMsg::EditProgram {
                id,
                name,
                program,
                reply,
            } => {
                let _ = reply.send(self.edit_program(id, name, program).await);
            }

            SupervisorMsg::DeleteProgram { id, reply } => {
                let _ = reply.send(self.delete_program(id).await);
            }

            SupervisorMsg::Quit => self.begin_shutdown(),
        }
    }

    /// Replace the document and diff the validated configurations against
    /// the running set: add new programs, reconfigure existing ones, tear
    /// down the disappeared.
    async fn apply(&mut self, document: ProgramsDocument, configurations: ProgramsConfiguration) {
        info!(count = configurations.len(), "loading program configurations");
        self.document = document;

        let removed: Vec<String> = self
            .programs
            .keys()
            .filter(|name| !configurations.contains_key(*name))
            .cloned()
            .collect();

        for (name, config) in configurations {
            self.install(&name, config).await;
        }

        for name in removed {
            if let Some(program) = self.programs.remove(&name) {
                info!(program = %name, "program removed");
                tokio::spawn(async move {
                    let _ = program.stop_and_wait().await;
                });
            }
        }
    }

    /// Install one validated configuration: reconfigure the running
    /// program, or construct it and honor autostart.
    async fn install(&mut self, name: &str, config: crate::config::ProgramConfiguration) {
        match self.programs.get(name) {
            Some(program) => {
                let _ = program.set_config(config).await;
            }
            None => {
                let autostart = config.autostart;
                let program = ProgramActor::spawn(config, &self.root);
                if autostart {
                    let _ = program.start().await;
                }
                self.programs.insert(name.to_string(), program);
            }
        }
    }

    async fn refresh_from_file(&mut self) -> Result<()> {
        let document = persistence::read_document(&self.config_path)?;
        let configurations = validate_programs(&document)?;
        self.apply(document, configurations).await;
        Ok(())
    }

    async fn add_program(&mut self, name: String, program: ProgramDocument) -> Result<()> {
        let config = validate_program(&program, &name)?;

        if self.programs.contains_key(&name) {
            return Err(DomainError::ProgramExists(name));
        }

        self.install(&name, config).await;
        self.document.programs.insert(name, program);
        self.persist()
    }

    async fn edit_program(
        &mut self,
        id: String,
        name: String,
        program: ProgramDocument,
    ) -> Result<()> {
        let config = validate_program(&program, &name)?;

        if id != name {
            let Some(old) = self.programs.remove(&id) else {
                return Err(DomainError::ProgramNotFound(id));
            };
            info!(program = %id, renamed_to = %name, "program renamed");
            tokio::spawn(async move {
                let _ = old.stop_and_wait().await;
            });
            self.document.programs.remove(&id);
        }

        self.install(&name, config).await;
        self.document.programs.insert(name, program);
        self.persist()
    }

    async fn delete_program(&mut self, id: String) -> Result<()> {
        let Some(program) = self.programs.remove(&id) else {
            return Err(DomainError::ProgramNotFound(id));
        };

        info!(program = %id, "program deleted");
        tokio::spawn(async move {
            let _ = program.stop_and_wait().await;
        });

        self.document.programs.remove(&id);
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        persistence::write_document(&self.config_path, &self.document)
    }

    /// Tear every program down, then cancel the root scope, then signal
    /// `closed`. StopAndWait runs before the scope cancellation so no child
    /// is orphaned.
    fn begin_shutdown(&self) {
        info!("shutdown requested");
        let programs: Vec<ProgramHandle> = self.programs.values().cloned().collect();
        let root = self.root.clone();
        let closed = self.closed.clone();
        tokio::spawn(async move {
            for program in &programs {
                if let Err(err) = program.stop_and_wait().await {
                    error!(program = %program.name(), error = %err, "teardown failed");
                }
            }
            root.cancel();
            closed.cancel();
            info!("shutdown complete");
        });
    }
}
