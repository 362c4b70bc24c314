//! Playlist reads and writes.
//!
//! Spotify accepts at most 100 items per write, so bulk operations are split
//! into chunks sent one after another with a fixed pause in between (see
//! [`Pacing`](crate::spotify::client::Pacing)).

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    error::SpotifyError,
    spotify::{
        client::{self, SpotifyClient},
        uri,
    },
    types::{BatchOutcome, CreatePlaylistRequest},
    utils,
};

/// Maximum items per playlist write.
pub const WRITE_CHUNK: usize = 100;
/// Page size for playlist item reads.
pub const READ_PAGE: u64 = 50;
/// Upper bound on pages walked by a full read.
pub const MAX_READ_PAGES: usize = 200;
/// Upper bound on pages merged by `GET /me/playlists?all=1`.
pub const MAX_OWN_PLAYLIST_PAGES: usize = 20;

fn playlist_path(playlist_id: &str) -> String {
    format!("playlists/{}", client::path_segment(playlist_id))
}

fn items_path(playlist_id: &str) -> String {
    format!("{}/items", playlist_path(playlist_id))
}

/// Keeps only references that resolve to a URI.
pub fn clean_uris<S: AsRef<str>>(input: &[S]) -> Vec<String> {
    input.iter().filter_map(|u| uri::to_uri(u.as_ref())).collect()
}

fn is_removable(uri: &str) -> bool {
    uri.starts_with("spotify:track:") || uri.starts_with("spotify:episode:")
}

fn snapshot_of(value: &Value) -> Option<String> {
    value
        .get("snapshot_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub(crate) fn summarize(playlist: &Value) -> Option<Value> {
    let id = playlist.get("id").and_then(Value::as_str).unwrap_or_default();
    let uri = playlist.get("uri").and_then(Value::as_str).unwrap_or_default();
    if id.is_empty() || uri.is_empty() {
        return None;
    }
    Some(json!({
        "id": id,
        "name": playlist.get("name").and_then(Value::as_str).unwrap_or_default(),
        "uri": uri,
        "images": playlist.get("images").cloned().unwrap_or_else(|| json!([])),
        "owner": playlist.get("owner").map(|o| json!({
            "display_name": o.get("display_name").and_then(Value::as_str).unwrap_or_default(),
            "id": o.get("id").and_then(Value::as_str).unwrap_or_default(),
        })),
        "tracks": playlist.get("tracks").cloned().unwrap_or(Value::Null),
    }))
}

/// One page (or, with `all`, up to 20 merged pages) of the user's playlists.
pub async fn my_playlists(
    client: &SpotifyClient,
    limit: u64,
    offset: u64,
    all: bool,
) -> Result<Value, SpotifyError> {
    let limit_param = limit.to_string();
    let mut offset = offset;
    let mut merged = Vec::new();
    let mut next = Value::Null;
    let mut total = Value::Null;
    let mut page_limit = json!(limit);
    let mut page_offset = json!(offset);

    for page in 0..MAX_OWN_PLAYLIST_PAGES {
        if page > 0 {
            utils::pace(client.pacing().read).await;
        }

        let offset_param = offset.to_string();
        let data = client
            .get(
                "me/playlists",
                &[("limit", limit_param.as_str()), ("offset", offset_param.as_str())],
            )
            .await?;

        if let Some(items) = data.get("items").and_then(Value::as_array) {
            merged.extend(items.iter().filter_map(summarize));
        }
        next = data.get("next").cloned().unwrap_or(Value::Null);
        total = data.get("total").cloned().unwrap_or(Value::Null);
        page_limit = data.get("limit").cloned().unwrap_or(json!(limit));
        page_offset = data.get("offset").cloned().unwrap_or(json!(offset));

        if !all || next.is_null() {
            break;
        }
        offset += limit;
    }

    let mut body = json!({
        "items": merged,
        "next": next,
        "total": total,
        "limit": page_limit,
    });
    if !all {
        body["offset"] = page_offset;
    }
    Ok(body)
}

/// Creates a playlist for the current user and returns its summary.
pub async fn create(
    client: &SpotifyClient,
    request: &CreatePlaylistRequest,
) -> Result<Value, SpotifyError> {
    let body = to_body(request)?;
    let data = client
        .send(Method::POST, "me/playlists", &[], Some(body))
        .await?
        .into_value();

    Ok(json!({
        "id": data.get("id"),
        "name": data.get("name"),
        "uri": data.get("uri"),
        "external_urls": data.get("external_urls").cloned().unwrap_or(Value::Null),
        "images": data.get("images").cloned().unwrap_or_else(|| json!([])),
    }))
}

pub async fn get(
    client: &SpotifyClient,
    playlist_id: &str,
    market: &str,
    fields: Option<&str>,
    additional_types: Option<&str>,
) -> Result<Value, SpotifyError> {
    let mut query = vec![("market", market)];
    if let Some(fields) = fields {
        query.push(("fields", fields));
    }
    if let Some(types) = additional_types {
        query.push(("additional_types", types));
    }
    client.get(&playlist_path(playlist_id), &query).await
}

/// Changes name, description, visibility or collaboration of a playlist.
pub async fn update_details(
    client: &SpotifyClient,
    playlist_id: &str,
    details: Value,
) -> Result<(), SpotifyError> {
    client
        .send(Method::PUT, &playlist_path(playlist_id), &[], Some(details))
        .await?;
    Ok(())
}

/// One page of playlist items, as returned by Spotify.
pub async fn items_page(
    client: &SpotifyClient,
    playlist_id: &str,
    limit: u64,
    offset: u64,
    market: &str,
) -> Result<Value, SpotifyError> {
    let limit = limit.to_string();
    let offset = offset.to_string();
    client
        .get(
            &items_path(playlist_id),
            &[
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
                ("market", market),
            ],
        )
        .await
}

/// Every item of a playlist, read 50 at a time.
///
/// Returns the items and the total reported by Spotify.
pub async fn items_all(
    client: &SpotifyClient,
    playlist_id: &str,
    market: &str,
) -> Result<(Vec<Value>, Option<u64>), SpotifyError> {
    let path = items_path(playlist_id);
    let limit = READ_PAGE.to_string();
    let mut offset = 0u64;
    let mut merged = Vec::new();
    let mut total = None;

    for _ in 0..MAX_READ_PAGES {
        let offset_param = offset.to_string();
        let data = client
            .get(
                &path,
                &[
                    ("limit", limit.as_str()),
                    ("offset", offset_param.as_str()),
                    ("market", market),
                ],
            )
            .await?;

        let items = data
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let count = items.len() as u64;
        merged.extend(items);
        total = data.get("total").and_then(Value::as_u64).or(total);

        if count < READ_PAGE {
            break;
        }
        offset += READ_PAGE;
        utils::pace(client.pacing().read).await;
    }

    Ok((merged, total))
}

/// Appends (or inserts at `position`) items in chunks of 100.
pub async fn add_items(
    client: &SpotifyClient,
    playlist_id: &str,
    uris: &[String],
    position: Option<u64>,
) -> Result<BatchOutcome, SpotifyError> {
    let path = items_path(playlist_id);
    let mut outcome = BatchOutcome::default();
    let mut position = position;

    for chunk in uris.chunks(WRITE_CHUNK) {
        let mut body = json!({ "uris": chunk });
        if let Some(pos) = position {
            body["position"] = json!(pos);
        }

        let data = client
            .send(Method::POST, &path, &[], Some(body))
            .await?
            .into_value();

        outcome.count += chunk.len();
        outcome.snapshot_id = snapshot_of(&data).or(outcome.snapshot_id);
        position = position.map(|p| p + chunk.len() as u64);
        utils::pace(client.pacing().write).await;
    }

    Ok(outcome)
}

/// Removes every occurrence of the given tracks and episodes.
///
/// Other references are dropped before the call. Each chunk is sent against
/// the snapshot returned by the previous one.
pub async fn remove_items(
    client: &SpotifyClient,
    playlist_id: &str,
    uris: &[String],
    snapshot_id: Option<String>,
) -> Result<BatchOutcome, SpotifyError> {
    let path = items_path(playlist_id);
    let removable: Vec<&String> = uris.iter().filter(|u| is_removable(u)).collect();
    let mut outcome = BatchOutcome::default();
    let mut snapshot = snapshot_id;

    for chunk in removable.chunks(WRITE_CHUNK) {
        let items: Vec<Value> = chunk.iter().map(|uri| json!({ "uri": uri })).collect();
        let mut body = json!({ "items": items });
        if let Some(snap) = &snapshot {
            body["snapshot_id"] = json!(snap);
        }

        let data = client
            .send(Method::DELETE, &path, &[], Some(body))
            .await?
            .into_value();

        outcome.count += chunk.len();
        if let Some(snap) = snapshot_of(&data) {
            outcome.snapshot_id = Some(snap.clone());
            snapshot = Some(snap);
        }
        utils::pace(client.pacing().write).await;
    }

    Ok(outcome)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutcome {
    pub count: usize,
    pub appended_after_put: usize,
}

/// Replaces the playlist contents: the first 100 items with one PUT, the
/// rest appended in chunks.
pub async fn replace_items(
    client: &SpotifyClient,
    playlist_id: &str,
    uris: &[String],
) -> Result<ReplaceOutcome, SpotifyError> {
    let path = items_path(playlist_id);
    let split = uris.len().min(WRITE_CHUNK);
    let (first, rest) = uris.split_at(split);

    client
        .send(Method::PUT, &path, &[], Some(json!({ "uris": first })))
        .await?;

    let mut appended = 0;
    for chunk in rest.chunks(WRITE_CHUNK) {
        client
            .send(Method::POST, &path, &[], Some(json!({ "uris": chunk })))
            .await?;
        appended += chunk.len();
        utils::pace(client.pacing().write).await;
    }

    Ok(ReplaceOutcome {
        count: uris.len(),
        appended_after_put: appended,
    })
}

/// Moves a range of items within the playlist.
pub async fn reorder_items(
    client: &SpotifyClient,
    playlist_id: &str,
    body: Value,
) -> Result<Option<String>, SpotifyError> {
    let data = client
        .send(Method::PUT, &items_path(playlist_id), &[], Some(body))
        .await?
        .into_value();
    Ok(snapshot_of(&data))
}

/// Removes every track and episode from the playlist.
pub async fn clear(
    client: &SpotifyClient,
    playlist_id: &str,
    market: &str,
) -> Result<BatchOutcome, SpotifyError> {
    let (items, _) = items_all(client, playlist_id, market).await?;
    let uris: Vec<String> = items
        .iter()
        .filter_map(|item| {
            item.get("track")
                .filter(|t| !t.is_null())
                .or_else(|| item.get("episode"))
        })
        .filter_map(|obj| obj.get("uri").and_then(Value::as_str))
        .filter(|uri| is_removable(uri))
        .map(str::to_string)
        .collect();

    let path = items_path(playlist_id);
    let mut outcome = BatchOutcome::default();
    for chunk in uris.chunks(WRITE_CHUNK) {
        let items: Vec<Value> = chunk.iter().map(|uri| json!({ "uri": uri })).collect();
        let data = client
            .send(Method::DELETE, &path, &[], Some(json!({ "items": items })))
            .await?
            .into_value();

        outcome.count += chunk.len();
        outcome.snapshot_id = snapshot_of(&data).or(outcome.snapshot_id);
        utils::pace(client.pacing().clear).await;
    }

    Ok(outcome)
}

/// Where a follow change landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowMode {
    /// `me/library?uris=`
    Library,
    /// `playlists/{id}/followers`, used when the library endpoint is missing.
    Followers,
}

/// Saves the playlist to the user's library.
pub async fn follow(client: &SpotifyClient, playlist_id: &str) -> Result<FollowMode, SpotifyError> {
    set_followed(client, playlist_id, true).await
}

/// Removes the playlist from the user's library.
pub async fn unfollow(
    client: &SpotifyClient,
    playlist_id: &str,
) -> Result<FollowMode, SpotifyError> {
    set_followed(client, playlist_id, false).await
}

async fn set_followed(
    client: &SpotifyClient,
    playlist_id: &str,
    followed: bool,
) -> Result<FollowMode, SpotifyError> {
    let method = if followed { Method::PUT } else { Method::DELETE };
    let playlist_uri = uri::playlist_uri(playlist_id)
        .ok_or_else(|| SpotifyError::Upstream {
            status: 400,
            message: "missing playlist id".to_string(),
            raw: Value::Null,
        })?;

    let library = client
        .send(method.clone(), "me/library", &[("uris", playlist_uri.as_str())], None)
        .await;
    match library {
        Ok(_) => Ok(FollowMode::Library),
        Err(e) if library_unavailable(&e) => {
            tracing::debug!(playlist = playlist_id, error = %e, "library endpoint unavailable, using followers");
            let body = followed.then(|| json!({ "public": false }));
            let path = format!("{}/followers", playlist_path(playlist_id));
            client.send(method, &path, &[], body).await?;
            Ok(FollowMode::Followers)
        }
        Err(e) => Err(e),
    }
}

fn library_unavailable(err: &SpotifyError) -> bool {
    match err {
        SpotifyError::Upstream {
            status, message, ..
        } => {
            let message = message.to_ascii_lowercase();
            *status == 404 || message.contains("not found") || message.contains("unknown")
        }
        _ => false,
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, SpotifyError> {
    serde_json::to_value(value)
        .map_err(|e| SpotifyError::Transport(format!("cannot encode request body: {e}")))
}
