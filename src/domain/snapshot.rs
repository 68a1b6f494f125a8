//! Point-in-time view of a supervised process

use crate::domain::process_state::ProcessState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a process looked like at query time.
///
/// `started_at` covers the current life; `ended_at` is set once the child
/// has been reaped and cleared again by the next launch.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSnapshot {
    pub id: String,
    pub state: ProcessState,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}
