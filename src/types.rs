use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tabled::Tabled;

/// Token endpoint response for both the authorization-code and the
/// refresh-token grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Durable record of the long-lived refresh credential (`tokens.json`).
///
/// Unknown keys are kept so other tooling can store data next to ours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// RFC 3339 timestamp of the last write.
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    /// The stored refresh credential, if present and not blank.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// One scheduled playback, as stored in the `items` list of `schedule.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: String,
    /// Five-field trigger expression, e.g. `30 7 * * *`.
    #[serde(default, deserialize_with = "loose_string")]
    pub cron: String,
    /// `spotify:` URI or `open.spotify.com` URL of a track, album or playlist.
    #[serde(default, deserialize_with = "loose_string")]
    pub uri: String,
    #[serde(default = "default_true", deserialize_with = "flag_or_true")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "flag_or_false")]
    pub shuffle: bool,
    #[serde(default = "default_true", deserialize_with = "flag_or_true")]
    pub start_from_beginning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_string_list")]
    pub devices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "loose_opt_string")]
    pub subtitle: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScheduleEntry {
    pub fn new(id: impl Into<String>, cron: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cron: cron.into(),
            uri: uri.into(),
            enabled: true,
            shuffle: false,
            start_from_beginning: true,
            device_id: None,
            devices: None,
            title: None,
            kind: None,
            image_url: None,
            subtitle: None,
            extra: Map::new(),
        }
    }

    /// Name used in logs: title, then id.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

fn default_true() -> bool {
    true
}

// Anything that is not a JSON boolean falls back to the field default.
fn flag_or_true<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_bool().unwrap_or(true))
}

fn flag_or_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Value::deserialize(deserializer)?.as_bool().unwrap_or(false))
}

// Half-edited entries (a null target, a numeric id) must survive a load and
// save cycle; the engine skips them when it compiles the schedule.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn loose_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(scalar_text(Value::deserialize(deserializer)?))
}

fn loose_string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items.into_iter().filter_map(scalar_text).collect()),
        _ => None,
    })
}

/// Parsed view of the whole schedule file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleDocument {
    pub items: Vec<ScheduleEntry>,
    /// Store-level default device.
    pub device_id: Option<String>,
    /// Store-level default device list.
    pub devices: Vec<String>,
    /// `true` when the file exists but has no `items` array.
    pub legacy: bool,
}

/// One line of `spotdeck schedule list`.
#[derive(Tabled)]
pub struct ScheduleTableRow {
    pub id: String,
    pub title: String,
    pub cron: String,
    pub uri: String,
    pub enabled: bool,
    #[tabled(rename = "next fire")]
    pub next_fire: String,
}

/// Body of `PUT /me/player/play`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_ms: Option<u64>,
}

impl PlayRequest {
    /// Play exactly these tracks.
    pub fn tracks(uris: Vec<String>, from_start: bool) -> Self {
        Self {
            context_uri: None,
            uris: Some(uris),
            position_ms: from_start.then_some(0),
        }
    }

    /// Play within an album, playlist or artist context.
    pub fn context(uri: String, from_start: bool) -> Self {
        Self {
            context_uri: Some(uri),
            uris: None,
            position_ms: from_start.then_some(0),
        }
    }

    /// The URI being played, for logging.
    pub fn target(&self) -> &str {
        self.context_uri
            .as_deref()
            .or_else(|| self.uris.as_ref().and_then(|u| u.first()).map(String::as_str))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: String,
    pub public: bool,
    pub collaborative: bool,
}

/// Pagination block normalised from a Spotify paging object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
    pub total: Option<u64>,
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl Page {
    pub fn from_block(block: Option<&Value>, limit: u64, offset: u64) -> Self {
        let get = |key: &str| block.and_then(|b| b.get(key));
        Self {
            limit: get("limit").and_then(Value::as_u64).unwrap_or(limit),
            offset: get("offset").and_then(Value::as_u64).unwrap_or(offset),
            total: get("total").and_then(Value::as_u64),
            next: get("next").and_then(Value::as_str).map(str::to_string),
            previous: get("previous").and_then(Value::as_str).map(str::to_string),
        }
    }
}

/// Outcome of a chunked playlist write.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// Items sent across all chunks.
    pub count: usize,
    pub snapshot_id: Option<String>,
}

/// Playlist proposal from the AI planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistPlan {
    pub name: String,
    pub description: String,
    /// Search queries in the form `song - artist`.
    pub tracks: Vec<String>,
}

/// A planner query and the catalog track it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedQuery {
    pub query: String,
    pub track: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedTracks {
    pub uris: Vec<String>,
    pub picked: Vec<ResolvedQuery>,
}
