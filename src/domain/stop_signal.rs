//! StopSignal value object
//! The signal delivered to a child when a graceful stop is requested

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signals a program may be configured to stop with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StopSignal {
    #[default]
    #[serde(rename = "TERM")]
    Term,
    #[serde(rename = "HUP")]
    Hup,
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "QUIT")]
    Quit,
    #[serde(rename = "KILL")]
    Kill,
    #[serde(rename = "USR1")]
    Usr1,
    #[serde(rename = "USR2")]
    Usr2,
}

impl StopSignal {
    /// Parse the configuration spelling of a signal name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TERM" => Some(StopSignal::Term),
            "HUP" => Some(StopSignal::Hup),
            "INT" => Some(StopSignal::Int),
            "QUIT" => Some(StopSignal::Quit),
            "KILL" => Some(StopSignal::Kill),
            "USR1" => Some(StopSignal::Usr1),
            "USR2" => Some(StopSignal::Usr2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StopSignal::Term => "TERM",
            StopSignal::Hup => "HUP",
            StopSignal::Int => "INT",
            StopSignal::Quit => "QUIT",
            StopSignal::Kill => "KILL",
            StopSignal::Usr1 => "USR1",
            StopSignal::Usr2 => "USR2",
        }
    }

    /// The OS signal number to deliver.
    pub fn to_raw(self) -> libc::c_int {
        match self {
            StopSignal::Term => libc::SIGTERM,
            StopSignal::Hup => libc::SIGHUP,
            StopSignal::Int => libc::SIGINT,
            StopSignal::Quit => libc::SIGQUIT,
            StopSignal::Kill => libc::SIGKILL,
            StopSignal::Usr1 => libc::SIGUSR1,
            StopSignal::Usr2 => libc::SIGUSR2,
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_signals() {
        assert_eq!(StopSignal::parse("TERM"), Some(StopSignal::Term));
        assert_eq!(StopSignal::parse("KILL"), Some(StopSignal::Kill));
        assert_eq!(StopSignal::parse("USR2"), Some(StopSignal::Usr2));
    }

    #[test]
    fn test_parse_rejects_unknown_and_lowercase() {
        assert_eq!(StopSignal::parse("term"), None);
        assert_eq!(StopSignal::parse("SIGTERM"), None);
        assert_eq!(StopSignal::parse(""), None);
    }

    #[test]
    fn test_raw_signal_numbers() {
        assert_eq!(StopSignal::Term.to_raw(), libc::SIGTERM);
        assert_eq!(StopSignal::Kill.to_raw(), libc::SIGKILL);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for signal in [
            StopSignal::Term,
            StopSignal::Hup,
            StopSignal::Int,
            StopSignal::Quit,
            StopSignal::Kill,
            StopSignal::Usr1,
            StopSignal::Usr2,
        ] {
            assert_eq!(StopSignal::parse(signal.as_str()), Some(signal));
        }
    }
}
