//! Process identifiers
//!
//! A process is addressed as `<program>_<index>` where spaces in the
//! program name are replaced by dashes. The id is stable across restarts
//! of the same worker index.

/// Build the id of worker `index` (1-based) of `program`.
pub fn process_id(program: &str, index: u32) -> String {
    format!("{}_{}", program.replace(' ', "-"), index)
}
