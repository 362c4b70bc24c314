//! Catalog search and artist discography.

use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    error::SpotifyError,
    spotify::client::{self, SpotifyClient},
    types::Page,
};

/// Largest `limit` Spotify accepts on `/search`.
pub const MAX_SEARCH_LIMIT: i64 = 10;
/// Largest `offset` Spotify accepts on `/search`.
pub const MAX_SEARCH_OFFSET: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Track,
    Playlist,
    Artist,
    Album,
}

impl FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(SearchKind::Track),
            "playlist" => Ok(SearchKind::Playlist),
            "artist" => Ok(SearchKind::Artist),
            "album" => Ok(SearchKind::Album),
            other => Err(format!("unsupported search type: {other}")),
        }
    }
}

impl SearchKind {
    fn as_str(self) -> &'static str {
        match self {
            SearchKind::Track => "track",
            SearchKind::Playlist => "playlist",
            SearchKind::Artist => "artist",
            SearchKind::Album => "album",
        }
    }

    /// Key of the paging object in the search response.
    fn block(self) -> &'static str {
        match self {
            SearchKind::Track => "tracks",
            SearchKind::Playlist => "playlists",
            SearchKind::Artist => "artists",
            SearchKind::Album => "albums",
        }
    }

    /// Artist search is not market-scoped.
    fn uses_market(self) -> bool {
        self != SearchKind::Artist
    }

    fn summarize(self, item: &Value) -> Option<Value> {
        match self {
            SearchKind::Track => track_summary(item),
            SearchKind::Playlist => crate::spotify::playlist::summarize(item),
            SearchKind::Artist => with_identity(item, |a| {
                json!({
                    "images": a.get("images").cloned().unwrap_or_else(|| json!([])),
                    "genres": a.get("genres").cloned().unwrap_or_else(|| json!([])),
                    "popularity": a.get("popularity").cloned().unwrap_or(Value::Null),
                })
            }),
            SearchKind::Album => with_identity(item, |a| {
                json!({
                    "images": a.get("images").cloned().unwrap_or_else(|| json!([])),
                    "release_date": str_field(a, "release_date"),
                    "total_tracks": a.get("total_tracks").cloned().unwrap_or(Value::Null),
                    "album_type": a.get("album_type").cloned().unwrap_or(Value::Null),
                    "external_urls": a.get("external_urls").cloned().unwrap_or_else(|| json!({"spotify": ""})),
                    "artists": named(a.get("artists"), true),
                })
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub items: Vec<Value>,
    pub page: Page,
    /// Best artist match, only for artist searches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<Value>,
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// `{id, name, uri, ...extra}` when the item has both an id and a URI.
fn with_identity(item: &Value, extra: impl FnOnce(&Value) -> Value) -> Option<Value> {
    let id = str_field(item, "id");
    let uri = str_field(item, "uri");
    if id.is_empty() || uri.is_empty() {
        return None;
    }

    let mut out = json!({ "id": id, "name": str_field(item, "name"), "uri": uri });
    if let (Some(out), Value::Object(extra)) = (out.as_object_mut(), extra(item)) {
        out.extend(extra);
    }
    Some(out)
}

/// Named entries of an artist list, optionally with their ids.
fn named(list: Option<&Value>, with_id: bool) -> Vec<Value> {
    list.and_then(Value::as_array)
        .map(|artists| {
            artists
                .iter()
                .filter(|a| !str_field(a, "name").is_empty())
                .map(|a| {
                    if with_id {
                        json!({ "id": str_field(a, "id"), "name": str_field(a, "name") })
                    } else {
                        json!({ "name": str_field(a, "name") })
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn track_summary(track: &Value) -> Option<Value> {
    with_identity(track, |t| {
        let album = t.get("album");
        json!({
            "artists": named(t.get("artists"), false),
            "album": {
                "name": album.map(|a| str_field(a, "name")).unwrap_or_default(),
                "images": album.and_then(|a| a.get("images")).cloned().unwrap_or_else(|| json!([])),
            },
        })
    })
}

/// Searches the catalog. `limit` and `offset` must already be clamped.
pub async fn search(
    client: &SpotifyClient,
    kind: SearchKind,
    q: &str,
    market: &str,
    limit: u64,
    offset: u64,
) -> Result<SearchResult, SpotifyError> {
    let limit_param = limit.to_string();
    let offset_param = offset.to_string();
    let mut query = vec![
        ("q", q),
        ("type", kind.as_str()),
        ("limit", limit_param.as_str()),
        ("offset", offset_param.as_str()),
    ];
    if kind.uses_market() {
        query.push(("market", market));
    }

    let data = client.get("search", &query).await?;
    let block = data.get(kind.block());
    let items: Vec<Value> = block
        .and_then(|b| b.get("items"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|i| kind.summarize(i)).collect())
        .unwrap_or_default();

    let artist = (kind == SearchKind::Artist)
        .then(|| {
            items.first().map(|a| {
                json!({ "id": a.get("id"), "name": a.get("name"), "uri": a.get("uri") })
            })
        })
        .flatten();

    Ok(SearchResult {
        page: Page::from_block(block, limit, offset),
        items,
        artist,
    })
}

/// Albums and singles of an artist.
pub async fn artist_albums(
    client: &SpotifyClient,
    artist_id: &str,
    include_groups: &str,
    market: &str,
    limit: u64,
    offset: u64,
) -> Result<SearchResult, SpotifyError> {
    let limit_param = limit.to_string();
    let offset_param = offset.to_string();
    let data = client
        .get(
            &format!("artists/{}/albums", client::path_segment(artist_id)),
            &[
                ("include_groups", include_groups),
                ("market", market),
                ("limit", limit_param.as_str()),
                ("offset", offset_param.as_str()),
            ],
        )
        .await?;

    let items = data
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|a| {
                    with_identity(a, |a| {
                        json!({
                            "release_date": str_field(a, "release_date"),
                            "images": a.get("images").cloned().unwrap_or_else(|| json!([])),
                            "external_urls": a.get("external_urls").cloned().unwrap_or_else(|| json!({"spotify": ""})),
                        })
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(SearchResult {
        items,
        page: Page::from_block(Some(&data), limit, offset),
        artist: None,
    })
}
