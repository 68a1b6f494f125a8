//! Validated program configuration
//! The canonical form applied to actors, with defaults filled in

use crate::domain::StopSignal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// When a process that exited on its own should be relaunched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Autorestart {
    /// Always relaunch
    On,
    /// Never relaunch
    Off,
    /// Relaunch only when the exit code is not in `exitcodes`
    #[default]
    Unexpected,
}

impl Autorestart {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "on" => Some(Autorestart::On),
            "off" => Some(Autorestart::Off),
            "unexpected" => Some(Autorestart::Unexpected),
            _ => None,
        }
    }
}

impl fmt::Display for Autorestart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Autorestart::On => "on",
            Autorestart::Off => "off",
            Autorestart::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}

/// A validated program configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfiguration {
    pub name: String,
    pub cmd: String,
    pub numprocs: u32,
    pub umask: String,
    pub workingdir: String,
    pub autostart: bool,
    pub autorestart: Autorestart,
    pub exitcodes: Vec<i32>,
    pub startretries: u32,
    pub starttime: u64,
    pub stopsignal: StopSignal,
    pub stoptime: u64,
    pub stdout: String,
    pub stderr: String,
    pub env: BTreeMap<String, String>,
}

impl ProgramConfiguration {
    /// Whether switching to `new` forces the children to be relaunched.
    ///
    /// Only attributes baked into a running child at spawn time count;
    /// policy fields (retries, timers, autorestart) apply to the next
    /// lifecycle without a restart.
    pub fn requires_restart(&self, new: &ProgramConfiguration) -> bool {
        self.cmd != new.cmd
            || self.env != new.env
            || self.umask != new.umask
            || self.stdout != new.stdout
            || self.stderr != new.stderr
            || self.workingdir != new.workingdir
    }

    /// Resolve the stdout sink for one process. `None` means discard.
    pub fn stdout_path(&self, process_id: &str) -> Option<PathBuf> {
        Self::sink_path(&self.stdout, process_id, "stdout")
    }

    /// Resolve the stderr sink for one process. `None` means discard.
    pub fn stderr_path(&self, process_id: &str) -> Option<PathBuf> {
        Self::sink_path(&self.stderr, process_id, "stderr")
    }

    fn sink_path(configured: &str, process_id: &str, stream: &str) -> Option<PathBuf> {
        match configured {
            "" | "NONE" => None,
            "AUTO" => Some(
                std::env::temp_dir().join(format!("procmgrd-{}.{}", process_id, stream)),
            ),
            path => Some(PathBuf::from(path)),
        }
    }
}

/// Validated configurations keyed by program name.
pub type ProgramsConfiguration = BTreeMap<String, ProgramConfiguration>;
