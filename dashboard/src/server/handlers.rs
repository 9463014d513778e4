//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use openapi_client::{DeployRequest, DeployResponse};
use serde::Serialize;
use tracing::error;

use crate::app::state::LogView;
use crate::channel::{ChannelState, ChannelStats};
use crate::errors::SubmissionError;
use crate::models::deployment::DeploymentRecord;
use crate::models::log_line::LogLine;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub log_stream: ChannelState,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deploydash".to_string(),
        version: version.version,
        log_stream: state.dashboard.log_state(),
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// A deployment as shown to the user
#[derive(Debug, Serialize)]
pub struct DeploymentView {
    #[serde(flatten)]
    pub record: DeploymentRecord,
    pub name: String,
    pub label: &'static str,
}

/// Deployments response
#[derive(Debug, Serialize)]
pub struct DeploymentsResponse {
    pub deployments: Vec<DeploymentView>,
    pub total: usize,
}

/// List deployments, newest first
pub async fn deployments_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let public_base_url = state.dashboard.public_base_url();
    let deployments: Vec<DeploymentView> = state
        .dashboard
        .current_deployments()
        .into_iter()
        .map(|record| DeploymentView {
            name: record.display_name(public_base_url).to_string(),
            label: record.kind.label(),
            record,
        })
        .collect();
    let total = deployments.len();

    Json(DeploymentsResponse { deployments, total })
}

/// Submit a deployment.
///
/// The submission runs in its own task so that it completes into the
/// registry even when the caller goes away first.
pub async fn submit_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeployRequest>,
) -> Response {
    let dashboard = state.dashboard.clone();
    let submission =
        tokio::spawn(async move { dashboard.submit_deployment(&request.repo_url).await });

    let result = match submission.await {
        Ok(result) => result,
        Err(e) => {
            error!("Submission task failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DeployResponse::failed("submission task failed")),
            )
                .into_response();
        }
    };

    match result {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e @ SubmissionError::EmptyInput) => {
            (StatusCode::BAD_REQUEST, Json(DeployResponse::failed(e.to_string()))).into_response()
        }
        Err(SubmissionError::SubmissionFailed { reason }) => {
            (StatusCode::BAD_GATEWAY, Json(DeployResponse::failed(reason))).into_response()
        }
    }
}

/// Logs response
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub lines: Vec<LogLine>,
    pub state: ChannelState,
    pub stats: ChannelStats,
}

/// All visible log lines
pub async fn logs_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(LogsResponse {
        lines: state.dashboard.current_log_lines(),
        state: state.dashboard.log_state(),
        stats: state.dashboard.log_stats(),
    })
}

/// Clear the visible log lines
pub async fn clear_logs_handler(State(state): State<Arc<ServerState>>) -> StatusCode {
    state.dashboard.clear_logs();
    StatusCode::NO_CONTENT
}

/// The tail-followed log window
pub async fn log_view_handler(State(state): State<Arc<ServerState>>) -> Json<LogView> {
    Json(state.dashboard.log_view())
}

/// Reconnect response
#[derive(Debug, Serialize)]
pub struct ReconnectResponse {
    pub state: ChannelState,
}

/// Re-open the build-log stream
pub async fn reconnect_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    state.dashboard.reconnect_logs();
    (
        StatusCode::ACCEPTED,
        Json(ReconnectResponse {
            state: state.dashboard.log_state(),
        }),
    )
}
