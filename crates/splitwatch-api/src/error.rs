//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "module"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Networking API surface for external integrations."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::fmt;

use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use splitwatch_store::ValidationErrors;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

/// Error rendered as `{ "error": ..., "details": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    /// 400 for a malformed path or query parameter.
    pub fn bad_request(uri: &Uri, error: impl Into<String>) -> Self {
        let err = Self::new(StatusCode::BAD_REQUEST, error);
        debug!(status = err.status.as_u16(), uri = %uri, error = %err.error, "rejected request");
        err
    }

    /// 400 carrying per-field messages.
    pub fn invalid_record(uri: &Uri, details: &ValidationErrors) -> Self {
        debug!(uri = %uri, details = %details.summary(), "rejected record body");
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid record data".into(),
            details: serde_json::to_value(details).ok(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Record not found")
    }

    /// 500 with a generic message; the cause is logged, never returned.
    pub fn internal(uri: &Uri, error: impl Into<String>, detail: impl fmt::Display) -> Self {
        let err = Self::new(StatusCode::INTERNAL_SERVER_ERROR, error);
        error!(
            status = err.status.as_u16(),
            uri = %uri,
            detail = %detail,
            "{}",
            err.error
        );
        err
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.error,
            details: self.details,
        });
        (self.status, body).into_response()
    }
}
