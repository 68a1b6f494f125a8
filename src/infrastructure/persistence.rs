//! Configuration persistence
//!
//! The on-disk YAML file and the supervisor's in-memory document must agree
//! after every successful mutation. Only the supervisor loop calls into
//! this module, so there is a single writer by construction.

use crate::config::raw::{parse_document, ProgramsDocument};
use crate::domain::{DomainError, Result};
use std::path::Path;

/// Serialize the document and rewrite the file in full.
pub fn write_document(path: &Path, document: &ProgramsDocument) -> Result<()> {
    let encoded = serde_yaml::to_string(document)
        .map_err(|e| DomainError::Persistence(format!("encode: {}", e)))?;
    std::fs::write(path, encoded)
        .map_err(|e| DomainError::Persistence(format!("write {:?}: {}", path, e)))
}

/// Read and decode the document from disk.
pub fn read_document(path: &Path) -> Result<ProgramsDocument> {
    let file = std::fs::File::open(path)
        .map_err(|e| DomainError::Persistence(format!("open {:?}: {}", path, e)))?;
    parse_document(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate_programs;

    #[test]
    fn test_round_trip_preserves_validated_form() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("programs.yaml");

        let document = parse_document(
            "programs:\n  web:\n    cmd: /bin/echo hi\n    numprocs: 2\n    stoptime: 4\n"
                .as_bytes(),
        )
        .unwrap();
        let validated = validate_programs(&document).unwrap();

        write_document(&path, &document).unwrap();
        let reread = read_document(&path).unwrap();
        let revalidated = validate_programs(&reread).unwrap();

        assert_eq!(validated, revalidated);
    }

    #[test]
    fn test_write_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("programs.yaml");
        std::fs::write(&path, "x".repeat(10_000)).unwrap();

        let document = parse_document("programs:\n  a:\n    cmd: /bin/true\n".as_bytes()).unwrap();
        write_document(&path, &document).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.len() < 1000);
        assert!(content.contains("/bin/true"));
    }

    #[test]
    fn test_read_missing_file_is_a_persistence_error() {
        let err = read_document(Path::new("/no/such/dir/programs.yaml")).unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
    }
}
