//! Configuration validator
//!
//! A pure function from the raw document to validated configurations.
//! Defaults are only applied once the required fields have checked out, so
//! a rejected document never half-applies.

use crate::config::raw::{ProgramDocument, ProgramsDocument};
use crate::config::validated::{Autorestart, ProgramConfiguration, ProgramsConfiguration};
use crate::domain::{DomainError, Result, StopSignal, ValidationIssue};
use std::collections::BTreeMap;

const HOUR_IN_SECONDS: i64 = 60 * 60;

fn reject(field: &str, issue: ValidationIssue) -> DomainError {
    DomainError::Validation {
        field: field.to_string(),
        issue,
    }
}

fn has_nul(s: &str) -> bool {
    s.contains('\0')
}

fn is_valid_env_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a whole document. Field paths in errors are threaded through
/// the program name: `Programs[web].Cmd`.
pub fn validate_programs(document: &ProgramsDocument) -> Result<ProgramsConfiguration> {
    if document.programs.is_empty() {
        return Err(reject("Programs", ValidationIssue::EmptyField));
    }

    let mut configurations = BTreeMap::new();
    for (name, program) in &document.programs {
        match validate_program(program, name) {
            Ok(configuration) => {
                configurations.insert(name.clone(), configuration);
            }
            Err(DomainError::Validation { field, issue }) => {
                return Err(reject(&format!("Programs[{}].{}", name, field), issue));
            }
            Err(other) => return Err(other),
        }
    }

    Ok(configurations)
}

/// Validate one program entry against the name it will be installed under.
pub fn validate_program(program: &ProgramDocument, name: &str) -> Result<ProgramConfiguration> {
    let mut exitcodes = Vec::new();
    for exitcode in normalized_exitcodes(program)? {
        if !(0..=255).contains(&exitcode) {
            return Err(reject("Exitcodes", ValidationIssue::OutOfBounds));
        }
        exitcodes.push(exitcode as i32);
    }

    let name = name.trim();
    if name.is_empty() {
        return Err(reject("Name", ValidationIssue::EmptyField));
    }
    if has_nul(name) {
        return Err(reject("Name", ValidationIssue::NulChar));
    }

    let cmd = match &program.cmd {
        None => return Err(reject("Cmd", ValidationIssue::EmptyField)),
        Some(cmd) if has_nul(cmd) => return Err(reject("Cmd", ValidationIssue::NulChar)),
        Some(cmd) => cmd.clone(),
    };

    let numprocs = match program.numprocs {
        None => 1,
        Some(n) if !(1..=100).contains(&n) => {
            return Err(reject("Numprocs", ValidationIssue::OutOfBounds))
        }
        Some(n) => n as u32,
    };

    let umask = match &program.umask {
        None => String::new(),
        Some(umask) if umask.is_empty() => String::new(),
        Some(umask) => {
            match i64::from_str_radix(umask, 8) {
                Err(_) => return Err(reject("Umask", ValidationIssue::UnexpectedValue)),
                Ok(n) if n < 0 => return Err(reject("Umask", ValidationIssue::OutOfBounds)),
                Ok(_) => {}
            }
            umask.clone()
        }
    };

    let workingdir = match &program.workingdir {
        None => String::new(),
        Some(dir) if has_nul(dir) => {
            return Err(reject("Workingdir", ValidationIssue::NulChar))
        }
        Some(dir) => dir.clone(),
    };

    let autostart = program.autostart.unwrap_or(true);

    let autorestart = match &program.autorestart {
        None => Autorestart::Unexpected,
        Some(value) => Autorestart::parse(value)
            .ok_or_else(|| reject("Autorestart", ValidationIssue::UnexpectedValue))?,
    };

    let starttime = match program.starttime {
        None => 5,
        Some(n) if !(0..=HOUR_IN_SECONDS).contains(&n) => {
            return Err(reject("Starttime", ValidationIssue::OutOfBounds))
        }
        Some(n) => n as u64,
    };

    let startretries = match program.startretries {
        None => 3,
        Some(n) if !(0..=20).contains(&n) => {
            return Err(reject("Startretries", ValidationIssue::OutOfBounds))
        }
        Some(n) => n as u32,
    };

    let stopsignal = match &program.stopsignal {
        None => StopSignal::Term,
        Some(value) => StopSignal::parse(value)
            .ok_or_else(|| reject("Stopsignal", ValidationIssue::UnexpectedValue))?,
    };

    let stoptime = match program.stoptime {
        None => 10,
        Some(n) if !(0..=HOUR_IN_SECONDS).contains(&n) => {
            return Err(reject("Stoptime", ValidationIssue::OutOfBounds))
        }
        Some(n) => n as u64,
    };

    let stdout = match &program.stdout {
        None => "AUTO".to_string(),
        Some(value) if has_nul(value) => return Err(reject("Stdout", ValidationIssue::NulChar)),
        Some(value) => value.clone(),
    };

    let stderr = match &program.stderr {
        None => "AUTO".to_string(),
        Some(value) if has_nul(value) => return Err(reject("Stderr", ValidationIssue::NulChar)),
        Some(value) => value.clone(),
    };

    let env = match &program.env {
        None => BTreeMap::new(),
        Some(env) => {
            for key in env.keys() {
                if !is_valid_env_name(key) {
                    return Err(reject("Env", ValidationIssue::UnexpectedMapKey));
                }
            }
            env.clone()
        }
    };

    Ok(ProgramConfiguration {
        name: name.to_string(),
        cmd,
        numprocs,
        umask,
        workingdir,
        autostart,
        autorestart,
        exitcodes,
        startretries,
        starttime,
        stopsignal,
        stoptime,
        stdout,
        stderr,
        env,
    })
}

/// `exitcodes` accepts a single integer, a list of integers, or a list of
/// whole-valued floats; anything else is an unexpected type. Bounds are
/// the caller's concern.
fn normalized_exitcodes(program: &ProgramDocument) -> Result<Vec<i64>> {
    let value = match &program.exitcodes {
        None => return Ok(vec![0]),
        Some(value) => value,
    };

    match value {
        serde_yaml::Value::Number(n) if n.is_i64() => Ok(vec![n.as_i64().unwrap_or(0)]),
        serde_yaml::Value::Sequence(items) => {
            let mut exitcodes = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    serde_yaml::Value::Number(n) if n.is_i64() => {
                        exitcodes.push(n.as_i64().unwrap_or(0));
                    }
                    serde_yaml::Value::Number(n) => match n.as_f64() {
                        Some(f) if f.fract() == 0.0 => exitcodes.push(f as i64),
                        _ => return Err(reject("Exitcodes", ValidationIssue::UnexpectedType)),
                    },
                    _ => return Err(reject("Exitcodes", ValidationIssue::UnexpectedType)),
                }
            }
            Ok(exitcodes)
        }
        _ => Err(reject("Exitcodes", ValidationIssue::UnexpectedType)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::raw::parse_document;

    fn minimal() -> ProgramDocument {
        ProgramDocument {
            cmd: Some("/bin/true".to_string()),
            ..Default::default()
        }
    }

    fn assert_rejects(program: ProgramDocument, field: &str, expected: ValidationIssue) {
        match validate_program(&program, "x") {
            Err(DomainError::Validation { field: f, issue }) => {
                assert_eq!(f, field);
                assert_eq!(issue, expected);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let config = validate_program(&minimal(), "x").unwrap();
        assert_eq!(config.numprocs, 1);
        assert_eq!(config.umask, "");
        assert_eq!(config.workingdir, "");
        assert!(config.autostart);
        assert_eq!(config.autorestart, Autorestart::Unexpected);
        assert_eq!(config.exitcodes, vec![0]);
        assert_eq!(config.startretries, 3);
        assert_eq!(config.starttime, 5);
        assert_eq!(config.stopsignal, StopSignal::Term);
        assert_eq!(config.stoptime, 10);
        assert_eq!(config.stdout, "AUTO");
        assert_eq!(config.stderr, "AUTO");
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_missing_cmd_rejected() {
        assert_rejects(ProgramDocument::default(), "Cmd", ValidationIssue::EmptyField);
    }

    #[test]
    fn test_nul_char_rejected() {
        let mut program = minimal();
        program.cmd = Some("/bin/\0true".to_string());
        assert_rejects(program, "Cmd", ValidationIssue::NulChar);

        let mut program = minimal();
        program.workingdir = Some("/tmp/\0".to_string());
        assert_rejects(program, "Workingdir", ValidationIssue::NulChar);
    }

    #[test]
    fn test_numprocs_bounds() {
        let mut program = minimal();
        program.numprocs = Some(0);
        assert_rejects(program, "Numprocs", ValidationIssue::OutOfBounds);

        let mut program = minimal();
        program.numprocs = Some(101);
        assert_rejects(program, "Numprocs", ValidationIssue::OutOfBounds);

        let mut program = minimal();
        program.numprocs = Some(100);
        assert_eq!(validate_program(&program, "x").unwrap().numprocs, 100);
    }

    #[test]
    fn test_umask_must_be_octal() {
        let mut program = minimal();
        program.umask = Some("襖".to_string());
        assert_rejects(program, "Umask", ValidationIssue::UnexpectedValue);

        let mut program = minimal();
        program.umask = Some("088".to_string());
        assert_rejects(program, "Umask", ValidationIssue::UnexpectedValue);

        let mut program = minimal();
        program.umask = Some("022".to_string());
        assert_eq!(validate_program(&program, "x").unwrap().umask, "022");
    }

    #[test]
    fn test_autorestart_values() {
        let mut program = minimal();
        program.autorestart = Some("sometimes".to_string());
        assert_rejects(program, "Autorestart", ValidationIssue::UnexpectedValue);

        let mut program = minimal();
        program.autorestart = Some("on".to_string());
        assert_eq!(
            validate_program(&program, "x").unwrap().autorestart,
            Autorestart::On
        );
    }

    #[test]
    fn test_stopsignal_values() {
        let mut program = minimal();
        program.stopsignal = Some("SIGTERM".to_string());
        assert_rejects(program, "Stopsignal", ValidationIssue::UnexpectedValue);

        let mut program = minimal();
        program.stopsignal = Some("USR1".to_string());
        assert_eq!(
            validate_program(&program, "x").unwrap().stopsignal,
            StopSignal::Usr1
        );
    }

    #[test]
    fn test_timer_bounds() {
        let mut program = minimal();
        program.starttime = Some(3601);
        assert_rejects(program, "Starttime", ValidationIssue::OutOfBounds);

        let mut program = minimal();
        program.stoptime = Some(-1);
        assert_rejects(program, "Stoptime", ValidationIssue::OutOfBounds);

        let mut program = minimal();
        program.startretries = Some(21);
        assert_rejects(program, "Startretries", ValidationIssue::OutOfBounds);
    }

    #[test]
    fn test_exitcodes_single_integer_coerced() {
        let mut program = minimal();
        program.exitcodes = Some(serde_yaml::Value::Number(2.into()));
        assert_eq!(validate_program(&program, "x").unwrap().exitcodes, vec![2]);
    }

    #[test]
    fn test_exitcodes_whole_floats_accepted() {
        let doc = parse_document(
            "programs:\n  x:\n    cmd: /bin/true\n    exitcodes: [0.0, 2.0]\n".as_bytes(),
        )
        .unwrap();
        let configs = validate_programs(&doc).unwrap();
        assert_eq!(configs["x"].exitcodes, vec![0, 2]);
    }

    #[test]
    fn test_exitcodes_fractional_float_rejected() {
        let doc = parse_document(
            "programs:\n  x:\n    cmd: /bin/true\n    exitcodes: [1.5]\n".as_bytes(),
        )
        .unwrap();
        match validate_programs(&doc) {
            Err(DomainError::Validation { field, issue }) => {
                assert_eq!(field, "Programs[x].Exitcodes");
                assert_eq!(issue, ValidationIssue::UnexpectedType);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_exitcodes_bounds() {
        let mut program = minimal();
        program.exitcodes = Some(serde_yaml::Value::Number(256.into()));
        assert_rejects(program, "Exitcodes", ValidationIssue::OutOfBounds);
    }

    #[test]
    fn test_env_key_names() {
        let mut program = minimal();
        let mut env = BTreeMap::new();
        env.insert("9BAD".to_string(), "x".to_string());
        program.env = Some(env);
        assert_rejects(program, "Env", ValidationIssue::UnexpectedMapKey);

        let mut program = minimal();
        let mut env = BTreeMap::new();
        env.insert("_OK_9".to_string(), "x".to_string());
        program.env = Some(env);
        assert!(validate_program(&program, "x").is_ok());
    }

    #[test]
    fn test_field_path_threads_program_name() {
        let doc = parse_document(
            "programs:\n  web:\n    cmd: /bin/true\n    numprocs: 0\n".as_bytes(),
        )
        .unwrap();
        match validate_programs(&doc) {
            Err(DomainError::Validation { field, issue }) => {
                assert_eq!(field, "Programs[web].Numprocs");
                assert_eq!(issue, ValidationIssue::OutOfBounds);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_document_rejected() {
        match validate_programs(&ProgramsDocument::default()) {
            Err(DomainError::Validation { field, issue }) => {
                assert_eq!(field, "Programs");
                assert_eq!(issue, ValidationIssue::EmptyField);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validator_is_pure() {
        let doc = parse_document(
            "programs:\n  web:\n    cmd: /bin/echo hi\n    numprocs: 3\n".as_bytes(),
        )
        .unwrap();
        let first = validate_programs(&doc).unwrap();
        let second = validate_programs(&doc).unwrap();
        assert_eq!(first, second);
    }
}
