//! REST API handlers
//!
//! Thin translations between HTTP/JSON and the supervisor's actor API.
//! Every response is a 200 with the `{error?, result?}` envelope; clients
//! look at the envelope, not the status code.

use crate::config::raw::ProgramDocument;
use crate::config::ProgramConfiguration;
use crate::domain::{program_state, ProcessState, Result};
use crate::supervision::ProgramHandle;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::router::AppState;

/// The one response envelope.
#[derive(Serialize)]
pub struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    fn ok(result: T) -> Json<Self> {
        Json(Envelope {
            error: None,
            result: Some(result),
        })
    }

    fn empty() -> Json<Self> {
        Json(Envelope {
            error: None,
            result: None,
        })
    }

    fn fail(error: impl ToString) -> Json<Self> {
        Json(Envelope {
            error: Some(error.to_string()),
            result: None,
        })
    }

    fn from_result(result: Result<()>) -> Json<Self> {
        match result {
            Ok(()) => Self::empty(),
            Err(err) => Self::fail(err),
        }
    }
}

/// Empty result type for endpoints that only report success or failure.
pub type NoResult = Envelope<()>;

#[derive(Deserialize)]
pub struct ProgramIdInput {
    pub program_id: String,
}

#[derive(Serialize)]
pub struct ProgramsStatus {
    pub programs: Vec<ProgramStatus>,
}

#[derive(Serialize)]
pub struct ProgramStatus {
    pub id: String,
    pub state: ProcessState,
    pub configuration: ProgramConfiguration,
    pub processes: Vec<ProcessStatus>,
}

#[derive(Serialize)]
pub struct ProcessStatus {
    pub id: String,
    pub pid: u32,
    pub state: ProcessState,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "endedAt")]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigurationBody {
    pub data: String,
}

/// A raw program plus the name it should be installed under.
#[derive(Deserialize)]
pub struct ProgramPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub program: ProgramDocument,
}

#[derive(Deserialize)]
pub struct EditProgramInput {
    pub id: String,
    pub configuration: ProgramPayload,
}

#[derive(Deserialize)]
pub struct DeleteProgramInput {
    pub id: String,
}

async fn program_status(program: &ProgramHandle) -> Result<ProgramStatus> {
    let configuration = program.config().await?;

    let mut processes = Vec::new();
    let mut states = Vec::new();
    for process in program.sorted_processes().await? {
        let snapshot = process.snapshot().await?;
        let pid = if snapshot.state == ProcessState::Running {
            process.pid().await?.unwrap_or(0)
        } else {
            0
        };
        states.push(snapshot.state);
        processes.push(ProcessStatus {
            id: snapshot.id,
            pid,
            state: snapshot.state,
            started_at: snapshot.started_at,
            ended_at: snapshot.ended_at,
        });
    }

    Ok(ProgramStatus {
        id: program.name().to_string(),
        state: program_state(&states),
        configuration,
        processes,
    })
}

pub async fn status(State(state): State<AppState>) -> Json<Envelope<ProgramsStatus>> {
    let programs = match state.supervisor.get_sorted_programs().await {
        Ok(programs) => programs,
        Err(err) => return Envelope::fail(err),
    };

    let mut statuses = Vec::with_capacity(programs.len());
    for program in &programs {
        match program_status(program).await {
            Ok(status) => statuses.push(status),
            Err(err) => return Envelope::fail(err),
        }
    }

    Envelope::ok(ProgramsStatus { programs: statuses })
}

async fn fan_out_one<F, Fut>(state: &AppState, program_id: &str, op: F) -> Json<NoResult>
where
    F: FnOnce(ProgramHandle) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    match state.supervisor.get_program(program_id).await {
        Ok(program) => Envelope::from_result(op(program).await),
        Err(err) => Envelope::fail(err),
    }
}

async fn fan_out_all<F, Fut>(state: &AppState, op: F) -> Json<NoResult>
where
    F: Fn(ProgramHandle) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    match state.supervisor.get_programs().await {
        Ok(programs) => {
            for program in programs {
                if let Err(err) = op(program).await {
                    return Envelope::fail(err);
                }
            }
            Envelope::empty()
        }
        Err(err) => Envelope::fail(err),
    }
}

pub async fn start(
    State(state): State<AppState>,
    Json(input): Json<ProgramIdInput>,
) -> Json<NoResult> {
    info!(program = %input.program_id, "REST start");
    fan_out_one(&state, &input.program_id, |p| async move { p.start().await }).await
}

pub async fn start_all(State(state): State<AppState>) -> Json<NoResult> {
    info!("REST start all");
    fan_out_all(&state, |p| async move { p.start().await }).await
}

pub async fn stop(
    State(state): State<AppState>,
    Json(input): Json<ProgramIdInput>,
) -> Json<NoResult> {
    info!(program = %input.program_id, "REST stop");
    fan_out_one(&state, &input.program_id, |p| async move { p.stop().await }).await
}

pub async fn stop_all(State(state): State<AppState>) -> Json<NoResult> {
    info!("REST stop all");
    fan_out_all(&state, |p| async move { p.stop().await }).await
}

pub async fn restart(
    State(state): State<AppState>,
    Json(input): Json<ProgramIdInput>,
) -> Json<NoResult> {
    info!(program = %input.program_id, "REST restart");
    fan_out_one(&state, &input.program_id, |p| async move { p.restart().await }).await
}

pub async fn restart_all(State(state): State<AppState>) -> Json<NoResult> {
    info!("REST restart all");
    fan_out_all(&state, |p| async move { p.restart().await }).await
}

pub async fn get_configuration(State(state): State<AppState>) -> Json<Envelope<ConfigurationBody>> {
    match state.supervisor.configuration_yaml().await {
        Ok(data) => Envelope::ok(ConfigurationBody { data }),
        Err(err) => Envelope::fail(err),
    }
}

pub async fn put_configuration(
    State(state): State<AppState>,
    Json(input): Json<ConfigurationBody>,
) -> Json<NoResult> {
    info!("REST configuration replace");
    Envelope::from_result(
        state
            .supervisor
            .refresh_from_reader(input.data.as_bytes())
            .await,
    )
}

pub async fn refresh_configuration(State(state): State<AppState>) -> Json<NoResult> {
    info!("REST configuration refresh from file");
    Envelope::from_result(state.supervisor.refresh_from_file().await)
}

pub async fn create_program(
    State(state): State<AppState>,
    Json(payload): Json<ProgramPayload>,
) -> Json<NoResult> {
    let name = payload.name.unwrap_or_default();
    info!(program = %name, "REST create program");
    Envelope::from_result(state.supervisor.add_program(&name, payload.program).await)
}

pub async fn edit_program(
    State(state): State<AppState>,
    Json(input): Json<EditProgramInput>,
) -> Json<NoResult> {
    let name = input.configuration.name.unwrap_or_default();
    info!(program = %input.id, new_name = %name, "REST edit program");
    Envelope::from_result(
        state
            .supervisor
            .edit_program(&input.id, &name, input.configuration.program)
            .await,
    )
}

pub async fn delete_program(
    State(state): State<AppState>,
    Json(input): Json<DeleteProgramInput>,
) -> Json<NoResult> {
    info!(program = %input.id, "REST delete program");
    Envelope::from_result(state.supervisor.delete_program(&input.id).await)
}

pub async fn get_logs(State(state): State<AppState>) -> Json<Envelope<ConfigurationBody>> {
    match tokio::fs::read_to_string(&state.log_path).await {
        Ok(data) => Envelope::ok(ConfigurationBody { data }),
        Err(err) => Envelope::fail(err),
    }
}

pub async fn delete_logs(State(state): State<AppState>) -> Json<NoResult> {
    // truncate, not rotate
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&state.log_path)
        .await
    {
        Ok(_) => Envelope::empty(),
        Err(err) => Envelope::fail(err),
    }
}

pub async fn shutdown(State(state): State<AppState>) -> Json<NoResult> {
    info!("REST shutdown");
    state.supervisor.quit().await;
    Envelope::empty()
}

pub async fn version() -> Json<Envelope<&'static str>> {
    Envelope::ok(crate::VERSION)
}
