//! AI playlist routes. Both run the planner, then resolve every proposed
//! query against the catalog; only `create` writes anything.

use axum::{Extension, Json, body::Bytes, http::StatusCode};
use serde_json::{Value, json};

use crate::{
    api::{ApiError, ApiResult, json_body, str_field},
    planner::{self, clamp_count},
    server::AppState,
    spotify::playlist,
    types::{CreatePlaylistRequest, PlaylistPlan, ResolvedTracks},
};

struct Planned {
    plan: PlaylistPlan,
    resolved: ResolvedTracks,
}

async fn plan_and_resolve(state: &AppState, body: &Value) -> ApiResult<Planned> {
    let prompt = str_field(body, "prompt").ok_or_else(|| ApiError::bad_request("missing prompt"))?;
    let count = clamp_count(body.get("count"));
    let market = str_field(body, "market").unwrap_or(&state.config.market);

    let plan = state.planner.plan(prompt, count).await?;
    tracing::info!(name = %plan.name, queries = plan.tracks.len(), "playlist planned");

    let resolved = planner::resolve_queries(&state.client, &plan.tracks, market).await?;
    Ok(Planned { plan, resolved })
}

/// `POST /api/ai/preview` with `{prompt, count?, market?}`
pub async fn preview(Extension(state): Extension<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let Planned { plan, resolved } = plan_and_resolve(&state, &body).await?;

    Ok(Json(json!({
        "ok": true,
        "plan": { "name": plan.name, "description": plan.description },
        "resolved": resolved,
    })))
}

/// `POST /api/ai/create` with `{prompt, count?, market?, isPublic?}`
pub async fn create(Extension(state): Extension<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let body = json_body(&body)?;
    let Planned { plan, resolved } = plan_and_resolve(&state, &body).await?;

    if resolved.uris.is_empty() {
        return Err(
            ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "no tracks could be resolved")
                .with_raw(json!({ "plan": plan, "resolved": resolved })),
        );
    }

    let request = CreatePlaylistRequest {
        name: plan.name.clone(),
        description: plan.description.clone(),
        public: body.get("isPublic").and_then(Value::as_bool).unwrap_or(false),
        collaborative: false,
    };
    let created = playlist::create(&state.client, &request).await?;
    let id = created
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::new(StatusCode::BAD_GATEWAY, "created playlist has no id"))?;

    let outcome = playlist::add_items(&state.client, id, &resolved.uris, None).await?;
    tracing::info!(playlist = id, added = outcome.count, "AI playlist created");

    Ok(Json(json!({
        "ok": true,
        "playlist": created,
        "added": outcome.count,
        "resolved": resolved,
    })))
}
