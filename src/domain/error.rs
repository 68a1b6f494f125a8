//! Domain-level errors
//! These represent supervision failures and validation issues, not bugs

use std::fmt;
use thiserror::Error;

/// Why a configuration document was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyField,
    OutOfBounds,
    UnexpectedMapKey,
    UnexpectedValue,
    UnexpectedType,
    InvalidPath,
    NulChar,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ValidationIssue::EmptyField => "field is required but empty",
            ValidationIssue::OutOfBounds => "value is outside bounds",
            ValidationIssue::UnexpectedMapKey => "unexpected map key",
            ValidationIssue::UnexpectedValue => "unexpected value",
            ValidationIssue::UnexpectedType => "unexpected type",
            ValidationIssue::InvalidPath => "invalid path",
            ValidationIssue::NulChar => "string cannot contain null char",
        };
        f.write_str(reason)
    }
}

/// Why a state machine event could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The current state has no edge for the event.
    NotImplemented,
    /// The current state has no outgoing edges at all.
    FinalState,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            TransitionError::NotImplemented => "transition not implemented",
            TransitionError::FinalState => "final state reached",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation error for field {field}: {issue}")]
    Validation { field: String, issue: ValidationIssue },

    #[error("channel has been closed")]
    ChannelClosed,

    #[error("program '{0}' not found")]
    ProgramNotFound(String),

    #[error("program '{0}' already exists")]
    ProgramExists(String),

    #[error("process '{0}' not found")]
    ProcessNotFound(String),

    #[error("parsing error for character {identifier}: {reason}")]
    Parse { identifier: String, reason: String },

    #[error("could not spawn process: {0}")]
    Spawn(String),

    #[error("could not deliver signal: {0}")]
    Signal(String),

    #[error("could not decode configuration document: {0}")]
    Document(String),

    #[error("could not persist configuration: {0}")]
    Persistence(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(TransitionError),
}

pub type Result<T> = std::result::Result<T, DomainError>;
