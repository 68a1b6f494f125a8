//! Raw configuration document as decoded from YAML
//!
//! No defaults are applied here and no bounds are checked; that is the
//! validator's job. `exitcodes` stays a raw YAML value because the file may
//! carry a single integer, a list of integers, or whole-valued floats.

use crate::domain::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Top-level configuration document: a `programs` mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramsDocument {
    #[serde(default)]
    pub programs: BTreeMap<String, ProgramDocument>,
}

/// One program entry, exactly as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numprocs: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub umask: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workingdir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autorestart: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exitcodes: Option<serde_yaml::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startretries: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starttime: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopsignal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoptime: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// Decode a configuration document from a reader.
pub fn parse_document<R: Read>(reader: R) -> Result<ProgramsDocument> {
    serde_yaml::from_reader(reader).map_err(|e| DomainError::Document(e.to_string()))
}
