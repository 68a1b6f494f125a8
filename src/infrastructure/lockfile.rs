//! Daemon lock file
//!
//! A second daemon instance must not start while the lock file is present.
//! The file carries no content; presence is the whole protocol.

use std::io;
use std::path::Path;

pub fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn create(path: &Path) -> io::Result<()> {
    std::fs::File::create(path)?;
    Ok(())
}

pub fn remove(path: &Path) {
    // Already-gone is fine; anything else is not worth failing shutdown over
    let _ = std::fs::remove_file(path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockfile_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procmgrd.lock");

        assert!(!exists(&path));
        create(&path).unwrap();
        assert!(exists(&path));
        remove(&path);
        assert!(!exists(&path));
        // removing twice is harmless
        remove(&path);
    }
}
