use axum::response::Json;
use chrono::Utc;
use serde_json::{Value, json};

/// Health check endpoint.
///
/// Always answers `200` with the current server time and the crate version.
/// Does not touch Spotify or the stores.
///
/// # Response Format
///
/// ```json
/// {
///   "ok": true,
///   "ts": "2026-03-02T10:30:00.000Z",
///   "version": "0.1.0-dev"
/// }
/// ```
pub async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
