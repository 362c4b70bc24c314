//! Playback control on the user's devices.
//!
//! Every command takes an optional device id. Without one Spotify targets
//! the currently active device.

use reqwest::Method;
use serde_json::{Value, json};

use crate::{error::SpotifyError, spotify::client::SpotifyClient, types::PlayRequest};

fn device_query(device_id: Option<&str>) -> Vec<(&'static str, &str)> {
    device_id
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| vec![("device_id", d)])
        .unwrap_or_default()
}

/// `GET /me/player/devices`. A 204 is reported as an empty device list.
pub async fn devices(client: &SpotifyClient) -> Result<Value, SpotifyError> {
    let data = client.get("me/player/devices", &[]).await?;
    Ok(if data.is_null() {
        json!({ "devices": [] })
    } else {
        data
    })
}

/// `GET /me/player`. `null` when nothing is playing anywhere.
pub async fn state(client: &SpotifyClient) -> Result<Value, SpotifyError> {
    client.get("me/player", &[]).await
}

pub async fn play(
    client: &SpotifyClient,
    request: &PlayRequest,
    device_id: Option<&str>,
) -> Result<(), SpotifyError> {
    let body = serde_json::to_value(request)
        .map_err(|e| SpotifyError::Transport(format!("cannot encode play request: {e}")))?;
    client
        .send(Method::PUT, "me/player/play", &device_query(device_id), Some(body))
        .await?;
    Ok(())
}

/// Resumes whatever was playing.
pub async fn resume(client: &SpotifyClient, device_id: Option<&str>) -> Result<(), SpotifyError> {
    client
        .send(Method::PUT, "me/player/play", &device_query(device_id), None)
        .await?;
    Ok(())
}

pub async fn pause(client: &SpotifyClient, device_id: Option<&str>) -> Result<(), SpotifyError> {
    client
        .send(Method::PUT, "me/player/pause", &device_query(device_id), None)
        .await?;
    Ok(())
}

pub async fn next(client: &SpotifyClient, device_id: Option<&str>) -> Result<(), SpotifyError> {
    client
        .send(Method::POST, "me/player/next", &device_query(device_id), None)
        .await?;
    Ok(())
}

pub async fn previous(client: &SpotifyClient, device_id: Option<&str>) -> Result<(), SpotifyError> {
    client
        .send(Method::POST, "me/player/previous", &device_query(device_id), None)
        .await?;
    Ok(())
}

pub async fn seek(
    client: &SpotifyClient,
    position_ms: u64,
    device_id: Option<&str>,
) -> Result<(), SpotifyError> {
    let position = position_ms.to_string();
    let mut query = vec![("position_ms", position.as_str())];
    query.extend(device_query(device_id));
    client
        .send(Method::PUT, "me/player/seek", &query, None)
        .await?;
    Ok(())
}

pub async fn shuffle(
    client: &SpotifyClient,
    on: bool,
    device_id: Option<&str>,
) -> Result<(), SpotifyError> {
    let mut query = vec![("state", if on { "true" } else { "false" })];
    query.extend(device_query(device_id));
    client
        .send(Method::PUT, "me/player/shuffle", &query, None)
        .await?;
    Ok(())
}
