//! Route table for the control surface

use crate::supervision::SupervisorHandle;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::path::PathBuf;

use super::handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: SupervisorHandle,
    /// The daemon's own log file, served and truncated by /logs
    pub log_path: PathBuf,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/start", post(handlers::start))
        .route("/start/all", post(handlers::start_all))
        .route("/stop", post(handlers::stop))
        .route("/stop/all", post(handlers::stop_all))
        .route("/restart", post(handlers::restart))
        .route("/restart/all", post(handlers::restart_all))
        .route(
            "/configuration",
            get(handlers::get_configuration).put(handlers::put_configuration),
        )
        .route("/configuration/refresh", put(handlers::refresh_configuration))
        .route("/programs/create", post(handlers::create_program))
        .route("/programs/edit", post(handlers::edit_program))
        .route("/programs/delete", post(handlers::delete_program))
        .route("/logs", get(handlers::get_logs).delete(handlers::delete_logs))
        .route("/shutdown", delete(handlers::shutdown))
        .route("/version", get(handlers::version))
        .with_state(state)
}
