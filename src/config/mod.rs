//! Configuration documents and their validation
//!
//! The raw document (`ProgramsDocument`) mirrors the YAML file field for
//! field, every value optional; it is what the supervisor persists back to
//! disk. The validated form (`ProgramConfiguration`) has defaults applied
//! and bounds checked, and is the only shape the actors ever see. The
//! validator is the single gate between the two.

pub mod raw;
pub mod validate;
pub mod validated;

pub use raw::{parse_document, ProgramDocument, ProgramsDocument};
pub use validate::{validate_program, validate_programs};
pub use validated::{Autorestart, ProgramConfiguration, ProgramsConfiguration};
