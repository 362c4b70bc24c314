//! Error types shared by the token cache, the upstream client, the planner
//! and the HTTP layer.
//!
//! Every error that reaches a caller of the proxy carries an HTTP status, a
//! human readable message and (for upstream failures) the parsed upstream
//! payload, so the route layer can report it without inspecting variants.

use serde_json::Value;

/// Failures of an authenticated call against the Spotify Web API or the
/// Spotify accounts service.
///
/// `Clone` because one refresh outcome is handed to every caller that was
/// waiting on the same in-flight refresh.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpotifyError {
    /// Client identity secrets are not configured. Fatal for any OAuth
    /// operation and never retried.
    #[error("missing configuration: {0}")]
    Configuration(String),

    /// No refresh credential is stored: the user never completed the
    /// authorization flow (or the stored value is blank).
    #[error("no refresh token stored, visit /auth/login to connect your account")]
    NoCredential,

    /// Non-2xx response from Spotify, after the single 401 retry if any.
    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        raw: Value,
    },

    /// DNS, connection, TLS or timeout failure before any HTTP status was
    /// received.
    #[error("request failed: {0}")]
    Transport(String),
}

impl SpotifyError {
    /// HTTP status to report for this error.
    pub fn status(&self) -> u16 {
        match self {
            SpotifyError::Configuration(_) => 500,
            SpotifyError::NoCredential => 401,
            SpotifyError::Upstream { status, .. } => *status,
            SpotifyError::Transport(_) => 500,
        }
    }

    /// Upstream payload kept for diagnostics, when there is one.
    pub fn raw(&self) -> Option<&Value> {
        match self {
            SpotifyError::Upstream { raw, .. } if !raw.is_null() => Some(raw),
            _ => None,
        }
    }

    /// Builds an upstream error from an HTTP status and the parsed body.
    ///
    /// The status embedded in Spotify's `{"error": {"status", "message"}}`
    /// envelope wins over the transport status; the accounts service's
    /// `error_description` is used when there is no envelope message.
    pub fn from_response(http_status: u16, raw: Value) -> Self {
        let status = raw
            .pointer("/error/status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(http_status);

        let message = raw
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| raw.get("error_description").and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| {
                reqwest::StatusCode::from_u16(http_status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Spotify request failed")
                    .to_string()
            });

        SpotifyError::Upstream {
            status,
            message,
            raw,
        }
    }
}

impl From<reqwest::Error> for SpotifyError {
    fn from(err: reqwest::Error) -> Self {
        SpotifyError::Transport(err.to_string())
    }
}

/// Failures writing one of the JSON stores. Reads never fail: they fall
/// back to an empty value instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode store contents: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors raised by the AI playlist planner.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("OPENAI_API_KEY is not configured")]
    NotConfigured,

    #[error("{message}")]
    Upstream {
        status: u16,
        message: String,
        raw: Value,
    },

    #[error("planner returned no usable plan")]
    InvalidPlan { raw: Value },

    #[error("planner request failed: {0}")]
    Transport(String),
}

impl PlannerError {
    pub fn status(&self) -> u16 {
        match self {
            PlannerError::NotConfigured => 400,
            PlannerError::Upstream { status, .. } => *status,
            PlannerError::InvalidPlan { .. } => 500,
            PlannerError::Transport(_) => 500,
        }
    }

    pub fn raw(&self) -> Option<&Value> {
        match self {
            PlannerError::Upstream { raw, .. } | PlannerError::InvalidPlan { raw } => Some(raw),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PlannerError {
    fn from(err: reqwest::Error) -> Self {
        PlannerError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_status_and_message_win() {
        let err = SpotifyError::from_response(
            400,
            json!({"error": {"status": 404, "message": "Player command failed: No active device found"}}),
        );
        assert_eq!(err.status(), 404);
        assert_eq!(
            err.to_string(),
            "Player command failed: No active device found"
        );
        assert!(err.raw().is_some());
    }

    #[test]
    fn accounts_error_description_is_used() {
        let err = SpotifyError::from_response(
            400,
            json!({"error": "invalid_grant", "error_description": "Refresh token revoked"}),
        );
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "Refresh token revoked");
    }

    #[test]
    fn falls_back_to_reason_phrase() {
        let err = SpotifyError::from_response(502, Value::Null);
        assert_eq!(err.status(), 502);
        assert_eq!(err.to_string(), "Bad Gateway");
        assert!(err.raw().is_none());
    }
}
