//! Configuration management for the control panel backend.
//!
//! This module handles loading configuration values from environment
//! variables and `.env` files. Values are read once into a [`Config`] which
//! is then shared by the server, the token cache and the schedule engine.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)

use std::{env, path::PathBuf, str::FromStr};

use chrono_tz::Tz;

use crate::error::{ConfigError, SpotifyError};

pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0:3001";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:3001/auth/callback";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SCHEDULE_TZ: Tz = chrono_tz::America::Sao_Paulo;
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/responses";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5";

/// Scopes needed for playback control and playlist management.
pub const DEFAULT_SCOPE: &str = "user-read-playback-state user-modify-playback-state \
user-read-currently-playing user-read-private playlist-read-private \
playlist-read-collaborative playlist-modify-public playlist-modify-private user-library-modify";

const APP_DIR: &str = "spotdeck";

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Creates the directory structure if it doesn't exist and loads variables
/// from `spotdeck/.env` under the platform-specific local data directory.
/// A missing `.env` file is not an error: every setting can also come from
/// the process environment.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/spotdeck/.env`
/// - macOS: `~/Library/Application Support/spotdeck/.env`
/// - Windows: `%LOCALAPPDATA%/spotdeck/.env`
///
/// # Errors
///
/// Returns an error if the data directory cannot be created or the `.env`
/// file exists but cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let path = data_dir().join(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    match dotenv::from_path(&path) {
        Ok(()) => Ok(()),
        Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("{}: {}", path.display(), e)),
    }
}

/// Platform-specific directory holding `.env`, `tokens.json` and
/// `schedule.json` unless overridden.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

/// Spotify application identity used for Basic authentication against the
/// accounts service.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Runtime configuration.
///
/// Built with [`Config::from_env`] in the binary; tests construct it directly
/// from [`Config::default`] and override the fields they care about.
#[derive(Debug, Clone)]
pub struct Config {
    /// `SERVER_ADDRESS`, e.g. `0.0.0.0:3001`. `PORT` alone replaces the port.
    pub server_addr: String,
    /// `SPOTIFY_API_AUTH_CLIENT_ID`
    pub client_id: Option<String>,
    /// `SPOTIFY_API_AUTH_CLIENT_SECRET`
    pub client_secret: Option<String>,
    /// `SPOTIFY_API_REDIRECT_URI`, must match the Spotify app settings.
    pub redirect_uri: String,
    /// `SPOTIFY_API_AUTH_SCOPE`
    pub scope: String,
    /// `SPOTIFY_API_AUTH_URL`
    pub auth_url: String,
    /// `SPOTIFY_API_TOKEN_URL`
    pub token_url: String,
    /// `SPOTIFY_API_URL`
    pub api_url: String,
    /// `SPOTIFY_MARKET`, used when a request does not name one.
    pub market: String,
    /// `TOKENS_PATH`
    pub tokens_path: PathBuf,
    /// `SCHEDULE_PATH`
    pub schedule_path: PathBuf,
    /// `SCHEDULE_TZ`, the zone trigger expressions are evaluated in.
    pub schedule_tz: Tz,
    /// `CORS_ORIGIN`: `*`, or a comma separated list of origins.
    pub cors_origin: Option<String>,
    /// `APP_ENV == "production"`
    pub production: bool,
    /// `OPENAI_API_KEY`
    pub openai_api_key: Option<String>,
    /// `OPENAI_MODEL`
    pub openai_model: String,
    /// `OPENAI_API_URL`
    pub openai_url: String,
}

impl Default for Config {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            server_addr: DEFAULT_SERVER_ADDRESS.to_string(),
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            market: "BR".to_string(),
            tokens_path: dir.join("tokens.json"),
            schedule_path: dir.join("schedule.json"),
            schedule_tz: DEFAULT_SCHEDULE_TZ,
            cors_origin: None,
            production: false,
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_url: DEFAULT_OPENAI_URL.to_string(),
        }
    }
}

impl Config {
    /// Reads every setting from the process environment, falling back to
    /// the defaults for unset or blank variables.
    ///
    /// Missing client secrets are not an error here: they only fail OAuth
    /// operations, see [`Config::client_credentials`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let mut server_addr = var("SERVER_ADDRESS").unwrap_or(defaults.server_addr);
        if let Some(port) = var("PORT") {
            let port: u16 = port.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: "PORT",
                    value: port.clone(),
                    reason: e.to_string(),
                }
            })?;
            let host = server_addr
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            server_addr = format!("{host}:{port}");
        }

        let schedule_tz = match var("SCHEDULE_TZ") {
            Some(name) => Tz::from_str(&name).map_err(|e| ConfigError::Invalid {
                key: "SCHEDULE_TZ",
                value: name.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.schedule_tz,
        };

        Ok(Self {
            server_addr,
            client_id: var("SPOTIFY_API_AUTH_CLIENT_ID"),
            client_secret: var("SPOTIFY_API_AUTH_CLIENT_SECRET"),
            redirect_uri: var("SPOTIFY_API_REDIRECT_URI").unwrap_or(defaults.redirect_uri),
            scope: var("SPOTIFY_API_AUTH_SCOPE").unwrap_or(defaults.scope),
            auth_url: var("SPOTIFY_API_AUTH_URL").unwrap_or(defaults.auth_url),
            token_url: var("SPOTIFY_API_TOKEN_URL").unwrap_or(defaults.token_url),
            api_url: var("SPOTIFY_API_URL").unwrap_or(defaults.api_url),
            market: var("SPOTIFY_MARKET").unwrap_or(defaults.market),
            tokens_path: var("TOKENS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.tokens_path),
            schedule_path: var("SCHEDULE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.schedule_path),
            schedule_tz,
            cors_origin: var("CORS_ORIGIN"),
            production: var("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_url: var("OPENAI_API_URL").unwrap_or(defaults.openai_url),
        })
    }

    /// Client identity for the accounts service.
    ///
    /// # Errors
    ///
    /// [`SpotifyError::Configuration`] naming every missing variable.
    pub fn client_credentials(&self) -> Result<ClientCredentials, SpotifyError> {
        match (&self.client_id, &self.client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(ClientCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
            }),
            (id, secret) => {
                let mut missing = Vec::new();
                if id.is_none() {
                    missing.push("SPOTIFY_API_AUTH_CLIENT_ID");
                }
                if secret.is_none() {
                    missing.push("SPOTIFY_API_AUTH_CLIENT_SECRET");
                }
                Err(SpotifyError::Configuration(missing.join(", ")))
            }
        }
    }

    /// Logs the effective configuration. Secrets are reported as set/unset.
    pub fn log_summary(&self) {
        let set = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };
        tracing::info!(
            server_addr = %self.server_addr,
            redirect_uri = %self.redirect_uri,
            tokens_path = %self.tokens_path.display(),
            schedule_path = %self.schedule_path.display(),
            schedule_tz = %self.schedule_tz,
            client_id = set(&self.client_id),
            client_secret = set(&self.client_secret),
            openai_api_key = set(&self.openai_api_key),
            openai_model = %self.openai_model,
            cors_origin = self.cors_origin.as_deref().unwrap_or("(default)"),
            production = self.production,
            "configuration loaded"
        );
        if self.client_id.is_none() || self.client_secret.is_none() {
            tracing::warn!("Spotify client credentials are missing, OAuth operations will fail");
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credentials_name_every_variable() {
        let config = Config::default();
        match config.client_credentials() {
            Err(SpotifyError::Configuration(msg)) => {
                assert!(msg.contains("SPOTIFY_API_AUTH_CLIENT_ID"));
                assert!(msg.contains("SPOTIFY_API_AUTH_CLIENT_SECRET"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn credentials_when_both_set() {
        let config = Config {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..Config::default()
        };
        let creds = config.client_credentials().unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.client_secret, "secret");
    }
}
