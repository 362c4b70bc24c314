use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query},
};
use serde_json::{Value, json};

use crate::{
    api::{ApiError, ApiResult},
    server::AppState,
    spotify::search::{self, MAX_SEARCH_LIMIT, MAX_SEARCH_OFFSET, SearchKind},
    utils::clamp_param,
};

type Params = Query<HashMap<String, String>>;

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

pub async fn me(Extension(state): Extension<AppState>) -> ApiResult<Json<Value>> {
    let me = state.client.get("me", &[]).await?;
    Ok(Json(json!({ "ok": true, "me": me })))
}

/// `GET /api/search/{kind}?q=&market=&limit=&offset=`
pub async fn search(
    Path(kind): Path<String>,
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let kind: SearchKind = kind.parse().map_err(ApiError::bad_request)?;
    run_search(&state, kind, &params).await
}

/// `GET /api/search-track`
pub async fn search_track(
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    run_search(&state, SearchKind::Track, &params).await
}

/// `GET /api/search-playlist`
pub async fn search_playlist(
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    run_search(&state, SearchKind::Playlist, &params).await
}

/// `GET /api/search-artist`
pub async fn search_artist(
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    run_search(&state, SearchKind::Artist, &params).await
}

/// `GET /api/search-album`
pub async fn search_album(
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    run_search(&state, SearchKind::Album, &params).await
}

async fn run_search(
    state: &AppState,
    kind: SearchKind,
    params: &HashMap<String, String>,
) -> ApiResult<Json<Value>> {
    let q = param(params, "q").ok_or_else(|| ApiError::bad_request("missing q"))?;
    let market = param(params, "market").unwrap_or(&state.config.market);
    let limit = clamp_param(params.get("limit").map(String::as_str), MAX_SEARCH_LIMIT, 0, MAX_SEARCH_LIMIT);
    let offset = clamp_param(params.get("offset").map(String::as_str), 0, 0, MAX_SEARCH_OFFSET);

    let result = search::search(&state.client, kind, q, market, limit as u64, offset as u64).await?;

    let mut body = json!({ "ok": true, "items": result.items, "page": result.page });
    if kind == SearchKind::Artist {
        body["artist"] = result.artist.unwrap_or(Value::Null);
    }
    Ok(Json(body))
}

/// `GET /api/artist-albums?artistId=&include_groups=&market=&limit=&offset=`
pub async fn artist_albums(
    Query(params): Params,
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<Value>> {
    let artist_id =
        param(&params, "artistId").ok_or_else(|| ApiError::bad_request("missing artistId"))?;
    let market = param(&params, "market").unwrap_or(&state.config.market);
    let groups = param(&params, "include_groups").unwrap_or("album,single");
    let limit = clamp_param(params.get("limit").map(String::as_str), MAX_SEARCH_LIMIT, 0, MAX_SEARCH_LIMIT);
    let offset = clamp_param(params.get("offset").map(String::as_str), 0, 0, i64::MAX);

    let result = search::artist_albums(
        &state.client,
        artist_id,
        groups,
        market,
        limit as u64,
        offset as u64,
    )
    .await?;

    Ok(Json(json!({ "ok": true, "items": result.items, "page": result.page })))
}
