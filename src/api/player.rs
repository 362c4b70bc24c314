//! Transport controls. Every body may carry an optional `deviceId`.

use axum::{Extension, Json, body::Bytes};
use serde_json::Value;

use crate::{
    api::{ApiError, ApiResult, json_body, ok, str_field, str_list},
    server::AppState,
    spotify::{player, uri},
    types::PlayRequest,
};

pub async fn devices(Extension(state): Extension<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(player::devices(&state.client).await?))
}

pub async fn state(Extension(state): Extension<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(player::state(&state.client).await?))
}

/// `{deviceId?, contextUri}`: play an album, playlist or artist from the top.
pub async fn play_context(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let context = str_field(&body, "contextUri")
        .ok_or_else(|| ApiError::bad_request("missing contextUri"))?;

    let request = uri::play_request_for(context, true)
        .filter(|r| r.context_uri.is_some())
        .ok_or_else(|| ApiError::bad_request("invalid contextUri"))?;

    player::play(&state.client, &request, str_field(&body, "deviceId")).await?;
    Ok(ok())
}

/// `{deviceId?, uris}`: play exactly these tracks.
pub async fn play_uris(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let uris = str_list(&body, "uris")
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing uris[]"))?;

    let tracks: Vec<String> = uris
        .iter()
        .filter_map(|u| uri::to_uri(u))
        .filter(|u| u.starts_with("spotify:track:"))
        .collect();
    if tracks.is_empty() {
        return Err(ApiError::bad_request("no valid spotify:track: uris"));
    }

    player::play(
        &state.client,
        &PlayRequest::tracks(tracks, true),
        str_field(&body, "deviceId"),
    )
    .await?;
    Ok(ok())
}

pub async fn pause(Extension(state): Extension<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    player::pause(&state.client, str_field(&body, "deviceId")).await?;
    Ok(ok())
}

pub async fn resume(Extension(state): Extension<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    player::resume(&state.client, str_field(&body, "deviceId")).await?;
    Ok(ok())
}

pub async fn next(Extension(state): Extension<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    player::next(&state.client, str_field(&body, "deviceId")).await?;
    Ok(ok())
}

pub async fn previous(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    player::previous(&state.client, str_field(&body, "deviceId")).await?;
    Ok(ok())
}

/// `{deviceId?, positionMs}`
pub async fn seek(Extension(state): Extension<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let position = body
        .get("positionMs")
        .and_then(|p| p.as_f64().or_else(|| p.as_str().and_then(|s| s.trim().parse().ok())))
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or_else(|| ApiError::bad_request("invalid positionMs"))?;

    player::seek(&state.client, position.floor() as u64, str_field(&body, "deviceId")).await?;
    Ok(ok())
}

/// `{deviceId?, state}`; any truthy `state` turns shuffle on.
pub async fn shuffle(Extension(state): Extension<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let on = match body.get("state") {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    };

    player::shuffle(&state.client, on, str_field(&body, "deviceId")).await?;
    Ok(ok())
}
