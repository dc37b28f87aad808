use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::backends::StatusReport;
use crate::http::server::AppState;
use crate::orchestrator::{GenerationRequest, GenerationResult};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("`{0}` must not be blank")]
    BlankField(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BlankField(_) => StatusCode::BAD_REQUEST,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub total_backends: usize,
    pub available_backends: usize,
}

/// Id assigned by the request-id layer, so the response body, logs and
/// the `x-request-id` header agree. Client-supplied ids that are not
/// UUIDs get a fresh one.
fn request_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .unwrap_or_else(Uuid::new_v4)
}

pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationResult>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BlankField("prompt"));
    }
    if request.component_type.trim().is_empty() {
        return Err(ApiError::BlankField("component_type"));
    }

    let result = state
        .orchestrator
        .generate_with_id(request, request_id(&headers))
        .await;
    Ok(Json(result))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.orchestrator.get_status())
}

/// `degraded` when no backend is selectable; requests still get
/// emergency output, so the code stays 200.
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let report = state.orchestrator.get_status();
    Json(HealthStatus {
        status: if report.available_backends > 0 {
            "healthy"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        total_backends: report.total_backends,
        available_backends: report.available_backends,
    })
}
