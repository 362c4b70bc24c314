//! Playlist routes: listing, creation, details, item reads and writes.

use std::collections::HashMap;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query},
};
use serde_json::{Map, Value, json};

use crate::{
    api::{ApiError, ApiResult, json_body, str_field, str_list},
    server::AppState,
    spotify::playlist::{self, READ_PAGE},
    types::CreatePlaylistRequest,
    utils::clamp_param,
};

type Params = Query<HashMap<String, String>>;

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn flag(body: &Value, key: &str) -> Option<bool> {
    match body.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|n| n != 0.0)),
        Value::String(s) => Some(matches!(s.trim(), "1" | "true" | "yes")),
        _ => None,
    }
}

/// Item references from `items` (strings or `{uri}` objects) or `uris`.
fn item_refs(body: &Value) -> Vec<String> {
    if let Some(items) = body.get("items").and_then(Value::as_array) {
        return items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("uri").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect();
    }
    str_list(body, "uris").unwrap_or_default()
}

/// `GET /api/me/playlists?limit=&offset=&all=1`
pub async fn my_playlists(
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_param(params.get("limit").map(String::as_str), 50, 1, 50);
    let offset = clamp_param(params.get("offset").map(String::as_str), 0, 0, i64::MAX);
    let all = param(&params, "all") == Some("1");

    let mut body = playlist::my_playlists(&state.client, limit as u64, offset as u64, all).await?;
    body["ok"] = json!(true);
    Ok(Json(body))
}

/// `POST /api/playlists/create` with `{name, description?, isPublic?}`
pub async fn create(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let name = str_field(&body, "name").ok_or_else(|| ApiError::bad_request("missing name"))?;

    let request = CreatePlaylistRequest {
        name: name.to_string(),
        description: str_field(&body, "description").unwrap_or_default().to_string(),
        public: flag(&body, "isPublic").unwrap_or(false),
        collaborative: false,
    };
    let created = playlist::create(&state.client, &request).await?;
    Ok(Json(json!({ "ok": true, "playlist": created })))
}

/// `GET /api/playlists/{id}?market=&fields=&additional_types=`
pub async fn get(
    Path(id): Path<String>,
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let market = param(&params, "market").unwrap_or(&state.config.market);
    let found = playlist::get(
        &state.client,
        &id,
        market,
        param(&params, "fields"),
        param(&params, "additional_types"),
    )
    .await?;
    Ok(Json(json!({ "ok": true, "playlist": found })))
}

/// `PUT /api/playlists/{id}/details` with any of `name`, `description`, `isPublic`,
/// `collaborative`.
pub async fn update_details(
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let mut details = Map::new();
    if let Some(name) = str_field(&body, "name") {
        details.insert("name".into(), json!(name));
    }
    if let Some(description) = body.get("description").and_then(Value::as_str) {
        details.insert("description".into(), json!(description));
    }
    if let Some(public) = body.get("isPublic").and_then(Value::as_bool) {
        details.insert("public".into(), json!(public));
    }
    if let Some(collaborative) = body.get("collaborative").and_then(Value::as_bool) {
        details.insert("collaborative".into(), json!(collaborative));
    }
    if details.is_empty() {
        return Err(ApiError::bad_request("nothing to update"));
    }

    playlist::update_details(&state.client, &id, Value::Object(details)).await?;
    Ok(Json(json!({ "ok": true })))
}

/// `GET /api/playlists/{id}/items?limit=&offset=&market=`
pub async fn items(
    Path(id): Path<String>,
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_param(params.get("limit").map(String::as_str), READ_PAGE as i64, 1, 50);
    let offset = clamp_param(params.get("offset").map(String::as_str), 0, 0, i64::MAX);
    let market = param(&params, "market").unwrap_or(&state.config.market);

    let data = playlist::items_page(&state.client, &id, limit as u64, offset as u64, market).await?;
    Ok(Json(json!({ "ok": true, "data": data })))
}

/// `GET /api/playlists/{id}/items/all?market=`
pub async fn items_all(
    Path(id): Path<String>,
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let market = param(&params, "market").unwrap_or(&state.config.market);
    let (items, total) = playlist::items_all(&state.client, &id, market).await?;
    Ok(Json(json!({
        "ok": true,
        "total": total,
        "count": items.len(),
        "items": items,
    })))
}

/// `POST /api/playlists/{id}/add-items` with `{uris, position?}`
pub async fn add_items(
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let uris = playlist::clean_uris(&str_list(&body, "uris").unwrap_or_default());
    if uris.is_empty() {
        return Err(ApiError::bad_request("missing uris[]"));
    }
    let position = body.get("position").and_then(Value::as_u64);

    let outcome = playlist::add_items(&state.client, &id, &uris, position).await?;
    Ok(Json(json!({
        "ok": true,
        "added": outcome.count,
        "snapshot_id": outcome.snapshot_id,
    })))
}

/// `DELETE /api/playlists/{id}/remove-items` with `{items|uris, snapshot_id?}`
pub async fn remove_items(
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let uris = playlist::clean_uris(&item_refs(&body));
    if uris.is_empty() {
        return Err(ApiError::bad_request("missing items[] or uris[]"));
    }
    let snapshot = str_field(&body, "snapshot_id").map(str::to_string);

    let outcome = playlist::remove_items(&state.client, &id, &uris, snapshot).await?;
    Ok(Json(json!({
        "ok": true,
        "removed": outcome.count,
        "snapshot_id": outcome.snapshot_id,
    })))
}

/// `PUT /api/playlists/{id}/items`: replace with `{uris}` or reorder with
/// `{range_start, insert_before, range_length?, snapshot_id?}`.
pub async fn update_items(
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;

    if let Some(refs) = str_list(&body, "uris") {
        let uris = playlist::clean_uris(&refs);
        let outcome = playlist::replace_items(&state.client, &id, &uris).await?;
        return Ok(Json(json!({
            "ok": true,
            "mode": "replace",
            "count": outcome.count,
            "appendedAfterPut": outcome.appended_after_put,
        })));
    }

    let range_start = body.get("range_start").and_then(Value::as_u64);
    let insert_before = body.get("insert_before").and_then(Value::as_u64);
    if let (Some(range_start), Some(insert_before)) = (range_start, insert_before) {
        let mut reorder = json!({
            "range_start": range_start,
            "insert_before": insert_before,
        });
        if let Some(length) = body.get("range_length").and_then(Value::as_u64) {
            reorder["range_length"] = json!(length);
        }
        if let Some(snapshot) = str_field(&body, "snapshot_id") {
            reorder["snapshot_id"] = json!(snapshot);
        }
        let snapshot_id = playlist::reorder_items(&state.client, &id, reorder).await?;
        return Ok(Json(json!({
            "ok": true,
            "mode": "reorder",
            "snapshot_id": snapshot_id,
        })));
    }

    Err(ApiError::bad_request(
        "expected uris[] or range_start and insert_before",
    ))
}

/// `PUT /api/playlists/{id}/clear?market=`
pub async fn clear(
    Path(id): Path<String>,
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let market = param(&params, "market").unwrap_or(&state.config.market);
    let outcome = playlist::clear(&state.client, &id, market).await?;
    Ok(Json(json!({
        "ok": true,
        "removed": outcome.count,
        "snapshot_id": outcome.snapshot_id,
    })))
}

/// `PUT /api/playlists/{id}/follow`
pub async fn follow(
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let id = required_id(&id)?;
    let mode = playlist::follow(&state.client, id).await?;
    Ok(Json(json!({ "ok": true, "mode": mode })))
}

/// `DELETE /api/playlists/{id}/unfollow`
pub async fn unfollow(
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let id = required_id(&id)?;
    let mode = playlist::unfollow(&state.client, id).await?;
    Ok(Json(json!({ "ok": true, "mode": mode })))
}

fn required_id(id: &str) -> ApiResult<&str> {
    Some(id.trim())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing playlistId"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_refs_accept_strings_and_objects() {
        let body = json!({ "items": ["spotify:track:a", { "uri": "spotify:track:b" }, 3] });
        assert_eq!(item_refs(&body), vec!["spotify:track:a", "spotify:track:b"]);

        let body = json!({ "uris": ["spotify:episode:c"] });
        assert_eq!(item_refs(&body), vec!["spotify:episode:c"]);
    }

    #[test]
    fn flags_accept_common_truthy_forms() {
        let body = json!({ "a": true, "b": 0, "c": "yes", "d": null });
        assert_eq!(flag(&body, "a"), Some(true));
        assert_eq!(flag(&body, "b"), Some(false));
        assert_eq!(flag(&body, "c"), Some(true));
        assert_eq!(flag(&body, "d"), None);
        assert_eq!(flag(&body, "missing"), None);
    }
}
