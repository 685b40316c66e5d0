//! Error types for termfleet-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use termfleet_health::HealthError;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// DNS provider error
    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),

    /// Prober construction error
    #[error("Health prober error: {0}")]
    Health(#[from] HealthError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Conflict (e.g., already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

/// DNS provider errors
#[derive(Debug, Error)]
pub enum DnsError {
    /// Provider answered with a non-success status
    #[error("DNS API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Request never completed
    #[error("DNS request failed: {0}")]
    Transport(String),

    /// Provider rejected the configuration
    #[error("DNS configuration error: {0}")]
    Configuration(String),

    /// Provider is refusing writes
    #[error("DNS provider unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for DnsError {
    fn from(err: reqwest::Error) -> Self {
        DnsError::Transport(err.to_string())
    }
}

/// Registration errors
#[derive(Debug, Error)]
pub enum RegistrarError {
    /// DNS upsert failed; the record was still written with DNS_FAILED
    #[error("DNS registration failed for {name}: {reason}")]
    DnsFailed { name: String, reason: String },

    /// Workstation does not exist
    #[error("Workstation not found: {0}")]
    NotFound(String),

    /// Workstation has no domain to look up
    #[error("Workstation has no domain name: {0}")]
    NoDomain(String),

    /// Store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Invalid request input
    #[error("{0}")]
    InvalidInput(String),

    /// DNS registration failed
    #[error("Failed to register DNS domain")]
    DnsRegistrationFailed(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<RegistrarError> for ApiError {
    fn from(err: RegistrarError) -> Self {
        match err {
            RegistrarError::DnsFailed { reason, .. } => ApiError::DnsRegistrationFailed(reason),
            RegistrarError::NotFound(_) => ApiError::NotFound("Workstation not found".to_string()),
            RegistrarError::NoDomain(_) => {
                ApiError::InvalidInput("Workstation has no domain name".to_string())
            }
            RegistrarError::Storage(e) => ApiError::Storage(e),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            ApiError::DnsRegistrationFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DNS_REGISTRATION_FAILED")
            }
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let details = match &self {
            ApiError::DnsRegistrationFailed(reason) => Some(reason.clone()),
            _ => None,
        };

        tracing::warn!(
            code,
            status = status.as_u16(),
            error = %self,
            details = details.as_deref().unwrap_or_default(),
            "API error response"
        );

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

/// Result type alias for DNS operations
pub type DnsResult<T> = Result<T, DnsError>;
