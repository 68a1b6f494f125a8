//! The actor hierarchy
//!
//! Three layers, leaves first: a process actor drives one child through the
//! lifecycle state machine; a program actor owns the process actors of one
//! program and its configuration; the supervisor owns the program registry,
//! the configuration document and the daemon lifecycle.
//!
//! Each actor serves a single inbox from a single reader task; all of its
//! state mutation happens in that reader. Helpers (launch reaper, timers,
//! stop-and-wait joiner) are transient tasks that only send onto inboxes.
//! Requests race against the owning cancellation scope and surface
//! `DomainError::ChannelClosed` when the scope wins.

mod lifecycle;
mod messages;
mod process;
mod program;
mod supervisor;

pub use process::ProcessHandle;
pub use program::ProgramHandle;
pub use supervisor::{Supervisor, SupervisorHandle};

pub use messages::ProcessCommand;
