//! Health and fallback handlers

use crate::api::rest::response::ApiResponse;
use crate::api::rest::state::AppState;
use crate::error::ApiError;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    pub version: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthCheckResponse> {
    ApiResponse::ok(HealthCheckResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        uptime_secs: state.uptime_secs(),
        version: state.version.clone(),
    })
}

/// Any route that does not exist
pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
