//! # API Module
//!
//! HTTP surface of the control panel backend, built on
//! [Axum](https://docs.rs/axum). Handlers receive the shared
//! [`AppState`](crate::server::AppState) through an `Extension` and map
//! request bodies onto the [`spotify`](crate::spotify) helpers.
//!
//! ## Endpoints
//!
//! - [`health`] - liveness probe
//! - [`auth`] - OAuth bootstrap (`/auth/login`, `/auth/callback`) and
//!   connection status
//! - [`search`] - `/api/me`, catalog search and artist albums
//! - [`player`] - device listing and transport controls
//! - [`playlists`] - playlist CRUD, follow and unfollow
//! - [`schedule`] - schedule read/write and timer reload
//! - [`ai`] - AI playlist preview and creation
//!
//! ## Errors
//!
//! Every failure is rendered by [`ApiError`] as
//! `{"error": "<message>", "raw": <upstream payload or null>}` with the
//! status of the underlying error.

pub mod ai;
pub mod auth;
pub mod health;
pub mod player;
pub mod playlists;
pub mod schedule;
pub mod search;

pub use health::health;

use axum::{
    Json,
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};

use crate::error::{PlannerError, SpotifyError, StoreError};

/// Error response of every API route.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    raw: Option<Value>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            raw: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Only 4xx and 5xx statuses are passed through; anything else is a 500.
    fn from_parts(status: u16, message: String, raw: Option<&Value>) -> Self {
        let status = StatusCode::from_u16(status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            message,
            raw: raw.cloned(),
        }
    }
}

impl From<SpotifyError> for ApiError {
    fn from(err: SpotifyError) -> Self {
        Self::from_parts(err.status(), err.to_string(), err.raw())
    }
}

impl From<PlannerError> for ApiError {
    fn from(err: PlannerError) -> Self {
        Self::from_parts(err.status(), err.to_string(), err.raw())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        let body = Json(json!({
            "error": self.message,
            "raw": self.raw.unwrap_or(Value::Null),
        }));
        (self.status, body).into_response()
    }
}

/// `{"ok": true}`
pub fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Reads an optional JSON body: empty means `{}`, anything else must be
/// valid JSON.
pub fn json_body(bytes: &Bytes) -> ApiResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}

/// A trimmed, non-empty string field of a JSON object.
pub fn str_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A list of strings from a JSON array field; non-strings are dropped.
pub fn str_list(body: &Value, key: &str) -> Option<Vec<String>> {
    body.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}
