//! Shared helpers for the integration tests
//!
//! Tests drive real child processes (`/bin/echo`, `/bin/sleep`, `/bin/sh`)
//! through the public actor API and poll for the expected observable state
//! rather than sleeping fixed amounts.

#![allow(dead_code)]

use procmgrd::config::{Autorestart, ProgramConfiguration};
use procmgrd::domain::StopSignal;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// A configuration with fast, test-friendly defaults: one worker, no
/// start-time grace period, no output files, no automatic restart.
pub fn test_config(name: &str, cmd: &str) -> ProgramConfiguration {
    ProgramConfiguration {
        name: name.to_string(),
        cmd: cmd.to_string(),
        numprocs: 1,
        umask: String::new(),
        workingdir: String::new(),
        autostart: true,
        autorestart: Autorestart::Off,
        exitcodes: vec![0],
        startretries: 3,
        starttime: 0,
        stopsignal: StopSignal::Term,
        stoptime: 2,
        stdout: "NONE".to_string(),
        stderr: "NONE".to_string(),
        env: BTreeMap::new(),
    }
}

pub fn test_config_with(
    name: &str,
    cmd: &str,
    tweak: impl FnOnce(&mut ProgramConfiguration),
) -> ProgramConfiguration {
    let mut config = test_config(name, cmd);
    tweak(&mut config);
    config
}

/// Poll `check` every 50ms until it holds, panicking after `timeout`.
pub async fn eventually<F, Fut>(timeout: Duration, what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

pub const SHORT: Duration = Duration::from_secs(5);
pub const LONG: Duration = Duration::from_secs(15);
