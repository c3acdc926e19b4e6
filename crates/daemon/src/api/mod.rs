use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use edit_engine::response::{self, PLANNING_FAILURE_MESSAGE};
use edit_engine::{EditOrchestrator, ExecutionOutcome, MediaRegistry, OutputPolicy, PrimitiveOperations, StepDescriptor};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::assistant::{Assistant, AssistantReply, EditRequest};
use crate::llm::ChatMessage;

/// Public URL of a produced artifact, served from the output directory.
pub fn artifact_url(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("/outputs/{}", name)
}

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub operations: Arc<dyn PrimitiveOperations>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/edit", post(edit))
        .route("/execute", post(execute))
        .with_state(state)
}

/// Structured failure body; never a raw trace.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn upstream(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

#[derive(Deserialize)]
pub struct EditBody {
    command: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    media_bin: MediaRegistry,
    #[serde(default)]
    active_video_id: String,
    #[serde(default)]
    video_description: Option<String>,
}

async fn edit(State(state): State<AppState>, Json(body): Json<EditBody>) -> Result<Json<AssistantReply>, ApiError> {
    if body.command.trim().is_empty() {
        return Err(ApiError::bad_request("The command is empty."));
    }
    info!("[API] Edit request: '{}'", body.command);

    let request = EditRequest {
        command: body.command,
        history: body.messages,
        registry: body.media_bin,
        active_media_id: body.active_video_id,
        video_description: body.video_description,
    };

    state.assistant.handle(request).await.map(Json).map_err(|e| {
        error!("[API] Assistant failed: {:#}", e);
        ApiError::upstream("The assistant could not reach one of its services. Please try again in a moment.")
    })
}

#[derive(Deserialize)]
pub struct ExecuteBody {
    steps: Vec<Value>,
    #[serde(default)]
    media_bin: MediaRegistry,
    #[serde(default)]
    active_video_id: String,
    #[serde(default)]
    single_output: bool,
}

/// Run an already planned step list without going through the LLM.
async fn execute(State(state): State<AppState>, Json(body): Json<ExecuteBody>) -> Response {
    let steps = match body
        .steps
        .into_iter()
        .map(StepDescriptor::from_value)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(steps) => steps,
        Err(e) => {
            warn!("[API] Malformed step list: {}", e);
            let outcome = response::failure(None, None, PLANNING_FAILURE_MESSAGE);
            return (StatusCode::BAD_REQUEST, Json(outcome)).into_response();
        }
    };

    let operations = state.operations.clone();
    let policy = OutputPolicy::from_single_output(body.single_output);
    let mut registry = body.media_bin;
    let active = body.active_video_id;

    let outcome = tokio::task::spawn_blocking(move || -> ExecutionOutcome {
        EditOrchestrator::new(operations.as_ref()).execute_descriptors(steps, policy, &mut registry, &active)
    })
    .await;

    match outcome {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            error!("[API] Execution task failed: {}", e);
            ApiError::internal("The edit could not be completed.").into_response()
        }
    }
}
