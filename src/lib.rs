//! Process Manager Daemon
//!
//! A library for supervising sets of system processes:
//! - Per-program worker pools (`numprocs` identical processes)
//! - Autostart and policy-driven automatic restart with retry limits
//! - Graceful stop with escalation to SIGKILL
//! - Live reconfiguration (add/edit/delete programs, reload from file)
//! - REST API for remote control
//!
//! ## Architecture
//!
//! The engine is a hierarchy of actors, each owning its state and serving
//! requests from a single inbox:
//!
//! - **Supervisor**: owns the program registry, the configuration document
//!   and the daemon lifecycle
//! - **Program actor**: owns the worker processes of one program and its
//!   current configuration
//! - **Process actor**: owns one child process and drives it through the
//!   lifecycle state machine
//!
//! The daemon binary (`procmgrd`) wires these together with the REST
//! adapter and the signal handlers.

pub mod adapters;
pub mod cmdline;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod supervision;

pub use config::{validate_programs, ProgramConfiguration, ProgramsConfiguration};
pub use domain::{DomainError, ProcessState, Result};
pub use supervision::{ProcessHandle, ProgramHandle, Supervisor, SupervisorHandle};

/// Daemon version reported by the control surface.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
