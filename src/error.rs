//! Error taxonomy for the aggregation pipeline and the HTTP surface.
//!
//! - `UpstreamError` never leaves a source adapter; it is logged and mapped to an empty list.
//! - `AggregateError` is what the orchestrator reports to its caller.
//! - `ApiError` is the HTTP-facing shape; every variant renders a JSON envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ingest::types::Platform;

/// One upstream call failed. Recovered locally by the adapter.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream call timed out")]
    Timeout,

    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if let Some(status) = err.status() {
            UpstreamError::Status(status.as_u16())
        } else if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::Malformed(err.to_string())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("none of the requested channels is supported")]
    InvalidChannel,

    #[error("no trend items obtainable from any requested source")]
    AllSourcesEmpty {
        channels: Vec<Platform>,
        timestamp: i64,
    },
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("no API key configured for the summary service")]
    MissingApiKey,

    #[error("summary upstream returned status {status}")]
    Upstream { status: u16 },

    #[error("summary request failed: {0}")]
    Network(String),

    #[error("summary upstream returned no content")]
    Empty,
}

impl From<reqwest::Error> for SummaryError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SummaryError::Upstream {
                status: status.as_u16(),
            },
            None => SummaryError::Network(err.to_string()),
        }
    }
}

/// HTTP-facing error. Always rendered as `{error, message, ...}` JSON.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid channels")]
    InvalidChannel,

    #[error("{0}")]
    BadRequest(String),

    #[error("all sources empty")]
    AllSourcesEmpty {
        channels: Vec<Platform>,
        timestamp: i64,
    },

    #[error("summary unavailable")]
    SummaryUnavailable { status: Option<u16> },

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AggregateError> for ApiError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::InvalidChannel => ApiError::InvalidChannel,
            AggregateError::AllSourcesEmpty {
                channels,
                timestamp,
            } => ApiError::AllSourcesEmpty {
                channels,
                timestamp,
            },
        }
    }
}

impl From<SummaryError> for ApiError {
    fn from(err: SummaryError) -> Self {
        match err {
            SummaryError::MissingApiKey => {
                ApiError::BadRequest("configure a summary API key in settings first".into())
            }
            SummaryError::Upstream { status } => ApiError::SummaryUnavailable {
                status: Some(status),
            },
            SummaryError::Network(_) | SummaryError::Empty => {
                ApiError::SummaryUnavailable { status: None }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::InvalidChannel => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "invalid channels parameter",
                    "message": format!("supported platforms: {}", Platform::supported_keys()),
                }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "bad request", "message": msg }),
            ),
            ApiError::AllSourcesEmpty {
                channels,
                timestamp,
            } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "unable to fetch trend data",
                    "message": "upstream trend services are unavailable; set HOT_API_BASES to a self-hosted or mirrored DailyHotApi",
                    "timestamp": timestamp,
                    "channels": channels,
                }),
            ),
            ApiError::SummaryUnavailable { status } => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "summary service unavailable",
                    "message": "the summary provider did not return a result",
                    "details": status,
                }),
            ),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                json!({ "error": "method not allowed", "message": "method not allowed" }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "service temporarily unavailable", "message": msg }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
