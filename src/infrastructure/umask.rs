//! Process-wide umask guard
//!
//! The umask is global to the daemon process, so configuring it for one
//! child must not leak into a concurrent spawn. All spawns funnel through
//! `with_umask`, which holds one lock across set, work and restore.

use std::sync::Mutex;

static UMASK_LOCK: Mutex<()> = Mutex::new(());

/// Run `work` (typically a spawn) with the process umask set to the octal
/// string `umask`, restoring the previous mask afterwards. An empty string
/// leaves the mask untouched. Must be called from blocking context.
pub fn with_umask<T>(umask: &str, work: impl FnOnce() -> T) -> T {
    if umask.is_empty() {
        return work();
    }

    let mode = match u32::from_str_radix(umask, 8) {
        Ok(mode) => mode as libc::mode_t,
        // Validation guarantees the string parses; fall back to not touching
        // the mask rather than poisoning the spawn.
        Err(_) => return work(),
    };

    let guard = UMASK_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let previous = unsafe { libc::umask(mode) };
    let result = work();
    unsafe { libc::umask(previous) };
    drop(guard);

    result
}
