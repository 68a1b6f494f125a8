//! ProcessState value object
//! Represents the lifecycle state of a supervised process

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of a process in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Process is not running and was not asked to run
    #[default]
    Stopped,

    /// Process was launched and is inside its start-time grace period
    Starting,

    /// Process survived its start-time grace period
    Running,

    /// Stop signal delivered, waiting for the process to die
    Stopping,

    /// Launch did not stick, waiting before the next retry
    Backoff,

    /// Process exited on its own
    Exited,

    /// Start retries exhausted, giving up until an explicit start
    Fatal,

    /// State could not be determined
    Unknown,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Stopped => "STOPPED",
            ProcessState::Starting => "STARTING",
            ProcessState::Running => "RUNNING",
            ProcessState::Stopping => "STOPPING",
            ProcessState::Backoff => "BACKOFF",
            ProcessState::Exited => "EXITED",
            ProcessState::Fatal => "FATAL",
            ProcessState::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Derive the state of a whole program from the states of its processes.
///
/// Alarm states win over transitional states, which win over settled
/// states; a program is only STOPPED or EXITED when every process agrees.
pub fn program_state(states: &[ProcessState]) -> ProcessState {
    let mut starting = 0;
    let mut running = 0;
    let mut backoff = 0;
    let mut stopping = 0;
    let mut stopped = 0;
    let mut exited = 0;
    let mut fatal = 0;
    let mut unknown = 0;

    for state in states {
        match state {
            ProcessState::Starting => starting += 1,
            ProcessState::Running => running += 1,
            ProcessState::Backoff => backoff += 1,
            ProcessState::Stopping => stopping += 1,
            ProcessState::Stopped => stopped += 1,
            ProcessState::Exited => exited += 1,
            ProcessState::Fatal => fatal += 1,
            ProcessState::Unknown => unknown += 1,
        }
    }

    if unknown > 0 {
        return ProcessState::Unknown;
    }
    if fatal > 0 {
        return ProcessState::Fatal;
    }
    if starting > 0 {
        return ProcessState::Starting;
    }
    if stopping > 0 {
        return ProcessState::Stopping;
    }
    if backoff > 0 {
        return ProcessState::Backoff;
    }
    if stopped == states.len() {
        return ProcessState::Stopped;
    }
    if exited == states.len() {
        return ProcessState::Exited;
    }
    if running > 0 {
        return ProcessState::Running;
    }
    ProcessState::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ProcessState::Stopped.to_string(), "STOPPED");
        assert_eq!(ProcessState::Backoff.to_string(), "BACKOFF");
        assert_eq!(ProcessState::Fatal.to_string(), "FATAL");
    }

    #[test]
    fn test_default() {
        assert_eq!(ProcessState::default(), ProcessState::Stopped);
    }

    #[test]
    fn test_program_state_all_agree() {
        use ProcessState::*;
        assert_eq!(program_state(&[Stopped, Stopped]), Stopped);
        assert_eq!(program_state(&[Exited, Exited]), Exited);
        assert_eq!(program_state(&[Running, Running]), Running);
    }

    #[test]
    fn test_program_state_alarms_win() {
        use ProcessState::*;
        assert_eq!(program_state(&[Running, Fatal]), Fatal);
        assert_eq!(program_state(&[Running, Unknown]), Unknown);
        assert_eq!(program_state(&[Unknown, Fatal]), Unknown);
    }

    #[test]
    fn test_program_state_transitional_states() {
        use ProcessState::*;
        assert_eq!(program_state(&[Running, Starting]), Starting);
        assert_eq!(program_state(&[Running, Stopping]), Stopping);
        assert_eq!(program_state(&[Exited, Backoff]), Backoff);
        // Starting is reported before Stopping when both are present
        assert_eq!(program_state(&[Starting, Stopping]), Starting);
    }

    #[test]
    fn test_program_state_mixed_settled() {
        use ProcessState::*;
        // One running process is enough to call the program running
        assert_eq!(program_state(&[Running, Exited]), Running);
        assert_eq!(program_state(&[Running, Stopped]), Running);
        // Mixed stopped/exited with nothing running resolves to Unknown
        assert_eq!(program_state(&[Stopped, Exited]), Unknown);
    }

    #[test]
    fn test_program_state_serializes_uppercase() {
        let json = serde_json::to_string(&ProcessState::Backoff).unwrap();
        assert_eq!(json, "\"BACKOFF\"");
    }
}
