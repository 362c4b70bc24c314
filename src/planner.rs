//! AI-assisted playlist planning.
//!
//! A [`PlaylistPlanner`] turns a free-text prompt into a playlist name, a
//! description and a list of `song - artist` search queries. The queries are
//! then resolved against the catalog with [`resolve_queries`].

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::{
    config::Config,
    error::{PlannerError, SpotifyError},
    spotify::{
        client::{SpotifyClient, parse_body},
        search::{self, SearchKind},
    },
    types::{PlaylistPlan, ResolvedQuery, ResolvedTracks},
    utils,
};

pub const DEFAULT_TRACK_COUNT: i64 = 25;
pub const MIN_TRACK_COUNT: i64 = 5;
pub const MAX_TRACK_COUNT: i64 = 100;

/// Name used when the planner does not provide one.
pub const FALLBACK_NAME: &str = "AI Playlist";

/// Requested track count, clamped to 5..=100 (25 when missing).
pub fn clamp_count(count: Option<&Value>) -> usize {
    let n = match count {
        Some(Value::Number(n)) => n.as_f64().map(|f| f.trunc() as i64),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64),
        _ => None,
    };
    n.unwrap_or(DEFAULT_TRACK_COUNT)
        .clamp(MIN_TRACK_COUNT, MAX_TRACK_COUNT) as usize
}

#[async_trait]
pub trait PlaylistPlanner: Send + Sync {
    async fn plan(&self, prompt: &str, count: usize) -> Result<PlaylistPlan, PlannerError>;
}

/// Planner backed by the OpenAI Responses API with a strict JSON schema.
pub struct OpenAiPlanner {
    http: Client,
    api_key: Option<String>,
    model: String,
    url: String,
}

impl OpenAiPlanner {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            url: config.openai_url.clone(),
        }
    }

    fn schema(count: usize) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "name": { "type": "string" },
                "description": { "type": "string" },
                "tracks": {
                    "type": "array",
                    "minItems": count,
                    "maxItems": count,
                    "items": {
                        "type": "object",
                        "additionalProperties": false,
                        "properties": { "query": { "type": "string" } },
                        "required": ["query"],
                    },
                },
            },
            "required": ["name", "description", "tracks"],
        })
    }

    fn instructions(count: usize) -> String {
        format!(
            "You create Spotify playlists.\n\
             Produce exactly {count} tracks.\n\
             Every item must have a \"query\" in the form \"song - artist\".\n\
             Do not repeat songs."
        )
    }

    async fn call(&self, api_key: &str, body: &Value) -> Result<Value, PlannerError> {
        let res = self
            .http
            .post(&self.url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = res.status();
        let data = parse_body(&res.text().await?);
        if !status.is_success() {
            let message = data
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("OpenAI request failed")
                .to_string();
            return Err(PlannerError::Upstream {
                status: status.as_u16(),
                message,
                raw: data,
            });
        }
        Ok(data)
    }
}

/// The API understood the structured request and rejected its schema, so a
/// legacy retry would not help.
fn is_format_rejection(err: &PlannerError) -> bool {
    matches!(err, PlannerError::Upstream { status: 400, message, .. } if message.contains("text.format"))
}

/// First text output of a Responses API result.
fn output_text(response: &Value) -> Option<&str> {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        return Some(text);
    }
    response
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|o| o.get("content").and_then(Value::as_array))
        .flatten()
        .find_map(|c| {
            ["text", "output_text"]
                .iter()
                .filter_map(|key| c.get(*key).and_then(Value::as_str))
                .find(|t| !t.trim().is_empty())
        })
}

/// Parses the planner JSON: `{name, description, tracks: [{query}]}`.
pub fn parse_plan(text: &str) -> Result<PlaylistPlan, PlannerError> {
    let invalid = || PlannerError::InvalidPlan {
        raw: json!({ "raw": text }),
    };
    let value: Value = serde_json::from_str(text.trim()).map_err(|_| invalid())?;
    if !value.is_object() {
        return Err(invalid());
    }

    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    let name = field("name");
    let tracks = value
        .get("tracks")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|t| t.get("query").and_then(Value::as_str).or_else(|| t.as_str()))
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(PlaylistPlan {
        name: if name.is_empty() {
            FALLBACK_NAME.to_string()
        } else {
            name
        },
        description: field("description"),
        tracks,
    })
}

#[async_trait]
impl PlaylistPlanner for OpenAiPlanner {
    async fn plan(&self, prompt: &str, count: usize) -> Result<PlaylistPlan, PlannerError> {
        let api_key = self.api_key.as_deref().ok_or(PlannerError::NotConfigured)?;
        let schema = Self::schema(count);
        let instructions = Self::instructions(count);

        let body = json!({
            "model": self.model,
            "instructions": instructions,
            "input": [{ "role": "user", "content": prompt.trim() }],
            "reasoning": { "effort": "low" },
            "max_output_tokens": 13000,
            "text": {
                "format": {
                    "type": "json_schema",
                    "name": "playlist_plan",
                    "schema": schema,
                    "strict": true,
                },
            },
        });

        let data = match self.call(api_key, &body).await {
            Ok(data) => data,
            Err(e) if is_format_rejection(&e) => return Err(e),
            Err(e) => {
                // Older deployments only understand `response_format`.
                tracing::debug!(error = %e, "structured planner request failed, retrying with legacy format");
                let legacy = json!({
                    "model": self.model,
                    "input": format!("{instructions}\n\nUSER PROMPT:\n{}", prompt.trim()),
                    "max_output_tokens": 1200,
                    "response_format": {
                        "type": "json_schema",
                        "json_schema": { "name": "playlist_plan", "schema": schema, "strict": true },
                    },
                });
                self.call(api_key, &legacy).await?
            }
        };

        let text = output_text(&data).unwrap_or_default();
        parse_plan(text)
    }
}

/// Looks up each query and keeps the first catalog hit, skipping duplicates.
///
/// Queries are searched one at a time with a fixed pause in between.
pub async fn resolve_queries(
    client: &SpotifyClient,
    queries: &[String],
    market: &str,
) -> Result<ResolvedTracks, SpotifyError> {
    let mut resolved = ResolvedTracks::default();
    let mut seen = HashSet::new();

    for query in queries {
        let term = query.trim();
        if term.is_empty() {
            continue;
        }

        let result = search::search(client, SearchKind::Track, term, market, 10, 0).await?;
        let hit = result.items.into_iter().next().filter(|track| {
            track
                .get("uri")
                .and_then(Value::as_str)
                .is_some_and(|uri| seen.insert(uri.to_string()))
        });

        if let Some(uri) = hit.as_ref().and_then(|t| t.get("uri")).and_then(Value::as_str) {
            resolved.uris.push(uri.to_string());
        }
        resolved.picked.push(ResolvedQuery {
            query: term.to_string(),
            track: hit,
        });

        utils::pace(client.pacing().search).await;
    }

    Ok(resolved)
}
