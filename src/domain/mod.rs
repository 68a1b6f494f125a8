pub mod error;
pub mod machine;
pub mod process_id;
pub mod process_state;
pub mod snapshot;
pub mod stop_signal;

pub use error::{DomainError, Result, TransitionError, ValidationIssue};
pub use machine::ProcessEvent;
pub use process_id::process_id;
pub use process_state::{program_state, ProcessState};
pub use snapshot::ProcessSnapshot;
pub use stop_signal::StopSignal;
