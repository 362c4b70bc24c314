//! OAuth bootstrap: login redirect, callback and connection status.

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::Query,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde_json::{Value, json};

use crate::{server::AppState, spotify::auth::authorize_url, utils};

pub const STATE_COOKIE: &str = "spotify_oauth_state";
const STATE_COOKIE_MAX_AGE: u32 = 600;

fn set_cookie(value: &str, max_age: u32) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{STATE_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}"
    ))
    .ok()
}

/// Value of the `state` cookie set by [`login`], if the browser sent it.
fn state_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == STATE_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn page(status: StatusCode, body: String) -> Response {
    (status, Html(body)).into_response()
}

/// Starts the authorization flow: stores a random `state` in a cookie and
/// redirects to the Spotify consent page.
pub async fn login(Extension(state): Extension<AppState>) -> Response {
    let oauth_state = utils::generate_state();
    let url = match authorize_url(&state.config, &oauth_state) {
        Ok(url) => url,
        Err(e) => return page(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    tracing::info!(authorize_url = %url, "redirecting to Spotify authorization");
    let mut res = Redirect::to(&url).into_response();
    if let Some(cookie) = set_cookie(&oauth_state, STATE_COOKIE_MAX_AGE) {
        res.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    res
}

/// Completes the authorization flow.
///
/// Checks `state` against the cookie, exchanges the code and records the
/// refresh credential. A grant without a refresh token keeps the stored one.
pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Extension(state): Extension<AppState>,
) -> Response {
    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        let reason = params
            .get("error")
            .map(|e| format!("authorization denied: {e}"))
            .unwrap_or_else(|| "missing code".to_string());
        return page(StatusCode::BAD_REQUEST, reason);
    };

    let expected = state_cookie(&headers);
    if expected.is_none() || params.get("state") != expected.as_ref() {
        return page(StatusCode::BAD_REQUEST, "invalid state".to_string());
    }

    let token = match state.accounts.exchange_code(code).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, raw = ?e.raw(), "authorization code exchange failed");
            let detail = e
                .raw()
                .and_then(|raw| serde_json::to_string_pretty(raw).ok())
                .unwrap_or_else(|| e.to_string());
            return page(StatusCode::INTERNAL_SERVER_ERROR, detail);
        }
    };

    if let Err(e) = state.credentials.store_grant(&token).await {
        tracing::warn!(error = %e, "cannot store refresh credential");
        return page(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    state.client.tokens().invalidate();
    tracing::info!(scope = ?token.scope, "Spotify account connected");

    let mut res = page(
        StatusCode::OK,
        "<h2>Authentication successful.</h2><p>You can close this window.</p>".to_string(),
    );
    if let Some(cookie) = set_cookie("", 0) {
        res.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    res
}

/// Whether a refresh credential is stored, and when it was written.
pub async fn status(Extension(state): Extension<AppState>) -> Json<Value> {
    let record = state.credentials.load().await;
    Json(json!({
        "hasRefreshToken": record.refresh_token().is_some(),
        "updated_at": record.updated_at,
        "scope": record.scope,
    }))
}
