//! REST API driving adapter
//!
//! JSON over HTTP, one envelope shape for every response:
//! `{"error": ...}` on failure, `{"result": ...}` on success, both
//! omitted when there is nothing to say.

pub mod handlers;
pub mod router;

pub use router::{build_router, AppState};
