//! Process lifecycle state machine
//!
//! The transition table is the authority on which events are legal in which
//! state. On-entry actions (launching the child, arming the stop escalation
//! timer, deciding on backoff and restart) live with the process actor; the
//! table itself is pure so it can be checked exhaustively.

use crate::domain::error::TransitionError;
use crate::domain::process_state::ProcessState;
use std::fmt;

/// Events a process machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Launch requested
    Start,
    /// The child survived its start-time grace period
    Started,
    /// Stop requested
    Stop,
    /// The child is gone (reaped, or the launch never stuck)
    Stopped,
    /// Start retries exhausted
    Fatal,
}

impl fmt::Display for ProcessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessEvent::Start => "start",
            ProcessEvent::Started => "started",
            ProcessEvent::Stop => "stop",
            ProcessEvent::Stopped => "stopped",
            ProcessEvent::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Resolve the state reached by applying `event` in `current`.
///
/// Returns `TransitionError::NotImplemented` when the state has no edge for
/// the event, and `TransitionError::FinalState` when the state has no
/// outgoing edges at all.
pub fn next_state(
    current: ProcessState,
    event: ProcessEvent,
) -> Result<ProcessState, TransitionError> {
    use ProcessEvent as E;
    use ProcessState as S;

    match (current, event) {
        (S::Stopped, E::Start) => Ok(S::Starting),

        (S::Starting, E::Started) => Ok(S::Running),
        (S::Starting, E::Stop) => Ok(S::Stopping),
        (S::Starting, E::Stopped) => Ok(S::Backoff),

        (S::Backoff, E::Start) => Ok(S::Starting),
        (S::Backoff, E::Fatal) => Ok(S::Fatal),

        (S::Running, E::Stop) => Ok(S::Stopping),
        (S::Running, E::Stopped) => Ok(S::Exited),

        (S::Stopping, E::Stopped) => Ok(S::Stopped),

        (S::Exited, E::Start) => Ok(S::Starting),

        (S::Fatal, E::Start) => Ok(S::Starting),

        (S::Unknown, _) => Err(TransitionError::FinalState),

        _ => Err(TransitionError::NotImplemented),
    }
}
