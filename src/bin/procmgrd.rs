//! Process Manager Daemon
//!
//! Loads the program configuration, spawns the supervisor and serves the
//! REST control surface. Configuration comes from environment variables
//! (no CLI arguments):
//!
//! - `PROCMGRD_CONFIG`: path of the YAML configuration file
//!   (default `./procmgrd.yaml`)
//! - `PROCMGRD_LOG`: path of the daemon log file (default `./procmgrd.log`)
//! - `PROCMGRD_LOCK`: path of the lock file (default `./procmgrd.lock`)
//! - `PROCMGRD_PORT`: REST listen port (default 8080)
//! - `PROCMGRD_LOG_FILTER`: tracing filter (default `info`)
//!
//! Signals: SIGHUP reloads the configuration file; SIGINT, SIGTERM and
//! SIGQUIT tear every program down, remove the lock file and exit.

use procmgrd::adapters::rest::{build_router, AppState};
use procmgrd::config::validate_programs;
use procmgrd::infrastructure::{lockfile, persistence};
use procmgrd::supervision::Supervisor;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

struct DaemonConfig {
    config_path: PathBuf,
    log_path: PathBuf,
    lock_path: PathBuf,
    port: u16,
    log_filter: String,
}

impl DaemonConfig {
    fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };
        DaemonConfig {
            config_path: PathBuf::from(var("PROCMGRD_CONFIG", "./procmgrd.yaml")),
            log_path: PathBuf::from(var("PROCMGRD_LOG", "./procmgrd.log")),
            lock_path: PathBuf::from(var("PROCMGRD_LOCK", "./procmgrd.lock")),
            port: var("PROCMGRD_PORT", "8080").parse().unwrap_or(8080),
            log_filter: var("PROCMGRD_LOG_FILTER", "info"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DaemonConfig::from_env();

    let log_file = Arc::new(
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_path)?,
    );
    let writer_file = Arc::clone(&log_file);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_writer(move || Arc::clone(&writer_file))
        .with_ansi(false)
        .init();

    if lockfile::exists(&config.lock_path) {
        eprintln!(
            "lock file {:?} exists: is the daemon already running?",
            config.lock_path
        );
        std::process::exit(1);
    }
    lockfile::create(&config.lock_path)?;

    info!(config = ?config.config_path, port = config.port, "starting procmgrd");

    let document = match persistence::read_document(&config.config_path) {
        Ok(document) => document,
        Err(err) => {
            lockfile::remove(&config.lock_path);
            error!(error = %err, "could not read configuration file");
            eprintln!("could not read configuration file: {}", err);
            std::process::exit(1);
        }
    };
    let configurations = match validate_programs(&document) {
        Ok(configurations) => configurations,
        Err(err) => {
            lockfile::remove(&config.lock_path);
            error!(error = %err, "configuration rejected");
            eprintln!("configuration rejected: {}", err);
            std::process::exit(1);
        }
    };

    let supervisor =
        Supervisor::start(document, configurations, config.config_path.clone()).await;

    // SIGHUP: reload the configuration file; failures keep the current
    // configuration
    let reload_supervisor = supervisor.clone();
    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(err) => {
                error!(error = %err, "could not install SIGHUP handler");
                return;
            }
        };
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, reloading configuration file");
            if let Err(err) = reload_supervisor.refresh_from_file().await {
                warn!(error = %err, "reload failed");
            }
        }
    });

    // Termination signals: cooperative shutdown
    let quit_supervisor = supervisor.clone();
    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("SIGQUIT handler");
        let received = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
            _ = sigquit.recv() => "SIGQUIT",
        };
        info!(signal = received, "termination signal received");
        quit_supervisor.quit().await;
    });

    let state = AppState {
        supervisor: supervisor.clone(),
        log_path: config.log_path.clone(),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "REST API listening");

    let closed = supervisor.closed();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { closed.cancelled().await })
        .await?;

    // Only reached once the supervisor reported every program torn down
    lockfile::remove(&config.lock_path);
    info!("daemon exited");
    Ok(())
}
