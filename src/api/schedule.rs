use axum::{Extension, Json, body::Bytes};
use serde_json::{Value, json};

use crate::{
    api::{ApiError, ApiResult, json_body},
    server::AppState,
    types::ScheduleEntry,
};

/// `GET /api/schedule`
pub async fn list(Extension(state): Extension<AppState>) -> ApiResult<Json<Value>> {
    let document = state.schedules.load_document().await;
    Ok(Json(json!({
        "ok": true,
        "items": document.items,
        "legacy": document.legacy,
    })))
}

/// `PUT /api/schedule` with `{items: [...]}` or a bare array.
///
/// Only writes the file: timers pick up the change on the next reload.
pub async fn replace(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("items") {
            Some(Value::Array(items)) => items,
            _ => return Err(ApiError::bad_request("expected {items: [...]} or an array")),
        },
        _ => return Err(ApiError::bad_request("expected {items: [...]} or an array")),
    };

    let entries = items
        .into_iter()
        .map(serde_json::from_value::<ScheduleEntry>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::bad_request(format!("invalid schedule entry: {e}")))?;

    state.schedules.save(&entries).await?;
    tracing::info!(count = entries.len(), "schedule saved");
    Ok(Json(json!({ "ok": true, "count": entries.len() })))
}

/// `POST /api/schedule/reload`
pub async fn reload(Extension(state): Extension<AppState>) -> ApiResult<Json<Value>> {
    let created = state.engine.reload().await;
    Ok(Json(json!({ "ok": true, "tasksCreated": created })))
}
