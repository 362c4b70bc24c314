//! OAuth plumbing: the accounts-service token endpoint and the in-memory
//! access token cache.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use parking_lot::Mutex;
use reqwest::{Client, header::AUTHORIZATION};
use serde_json::Value;
use url::Url;

use crate::{
    config::{ClientCredentials, Config},
    error::SpotifyError,
    management::CredentialStore,
    scheduler::clock::Clock,
    types::Token,
    utils,
};

/// Subtracted from the declared token lifetime before caching.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::seconds(60);

// Upper bound on a declared `expires_in`, in seconds.
const MAX_DECLARED_LIFETIME: u64 = 86_400;

/// Builds the URL the browser is sent to in order to grant access.
///
/// # Errors
///
/// [`SpotifyError::Configuration`] when the client id is missing or the
/// configured authorize URL does not parse.
pub fn authorize_url(config: &Config, state: &str) -> Result<String, SpotifyError> {
    let client_id = config.client_id.as_deref().ok_or_else(|| {
        SpotifyError::Configuration("SPOTIFY_API_AUTH_CLIENT_ID".to_string())
    })?;

    let url = Url::parse_with_params(
        &config.auth_url,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", config.scope.as_str()),
            ("state", state),
        ],
    )
    .map_err(|e| SpotifyError::Configuration(format!("SPOTIFY_API_AUTH_URL: {e}")))?;

    Ok(url.to_string())
}

/// Grant exchanges against the OAuth token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchanges the long-lived refresh credential for a fresh access token.
    async fn refresh(&self, refresh_token: &str) -> Result<Token, SpotifyError>;

    /// Exchanges an authorization code from the login redirect.
    async fn exchange_code(&self, code: &str) -> Result<Token, SpotifyError>;
}

/// The Spotify accounts service, authenticated with the client id and secret.
pub struct SpotifyAccounts {
    http: Client,
    token_url: String,
    redirect_uri: String,
    credentials: Result<ClientCredentials, SpotifyError>,
}

impl SpotifyAccounts {
    pub fn new(http: Client, config: &Config) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            redirect_uri: config.redirect_uri.clone(),
            credentials: config.client_credentials(),
        }
    }

    async fn grant(&self, form: &[(&str, &str)]) -> Result<Token, SpotifyError> {
        let credentials = self.credentials.clone()?;

        let res = self
            .http
            .post(&self.token_url)
            .header(
                AUTHORIZATION,
                utils::basic_auth_header(&credentials.client_id, &credentials.client_secret),
            )
            .form(form)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        let raw = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| {
            if text.is_empty() {
                Value::Null
            } else {
                serde_json::json!({ "raw": text })
            }
        });

        if !status.is_success() {
            return Err(SpotifyError::from_response(status.as_u16(), raw));
        }

        serde_json::from_value::<Token>(raw.clone()).map_err(|e| SpotifyError::Upstream {
            status: 502,
            message: format!("unexpected token response: {e}"),
            raw,
        })
    }
}

#[async_trait]
impl TokenEndpoint for SpotifyAccounts {
    async fn refresh(&self, refresh_token: &str) -> Result<Token, SpotifyError> {
        self.grant(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn exchange_code(&self, code: &str) -> Result<Token, SpotifyError> {
        self.grant(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }
}

type RefreshFlight = Shared<BoxFuture<'static, Result<String, SpotifyError>>>;

enum Phase {
    Empty,
    Valid {
        token: String,
        expires_at: DateTime<Utc>,
    },
    Refreshing(RefreshFlight),
}

struct CacheState {
    phase: Phase,
    /// Bumped on every refresh start and every invalidation. A refresh only
    /// publishes its result if the generation it started under is current.
    generation: u64,
}

struct Inner {
    credentials: CredentialStore,
    endpoint: Arc<dyn TokenEndpoint>,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
    refreshes: AtomicU64,
}

/// Short-lived access token with single-flight refresh.
///
/// Concurrent callers that find the cache empty or expired share one
/// in-flight exchange and all receive its outcome. The exchange runs on its
/// own task so it completes even if every waiter is dropped.
#[derive(Clone)]
pub struct TokenCache {
    inner: Arc<Inner>,
}

impl TokenCache {
    pub fn new(
        credentials: CredentialStore,
        endpoint: Arc<dyn TokenEndpoint>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                credentials,
                endpoint,
                clock,
                state: Mutex::new(CacheState {
                    phase: Phase::Empty,
                    generation: 0,
                }),
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a token that is valid right now, refreshing if needed.
    ///
    /// # Errors
    ///
    /// [`SpotifyError::NoCredential`] when no refresh credential is stored,
    /// otherwise whatever the token endpoint reported.
    pub async fn access_token(&self) -> Result<String, SpotifyError> {
        let flight = {
            let mut state = self.inner.state.lock();
            if let Phase::Valid { token, expires_at } = &state.phase {
                if self.inner.clock.now() < *expires_at {
                    return Ok(token.clone());
                }
            }
            match &state.phase {
                Phase::Refreshing(flight) => flight.clone(),
                _ => self.start_refresh(&mut state),
            }
        };

        flight.await
    }

    /// Drops any cached token. The next [`TokenCache::access_token`] call
    /// starts a fresh exchange, and a refresh already in flight will not
    /// publish its result.
    pub fn invalidate(&self) {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        state.phase = Phase::Empty;
    }

    /// Drops the cached token only if it is still `rejected`.
    ///
    /// Used after a 401: when another caller already replaced the token, or a
    /// refresh is already running, the newer state is kept.
    pub fn invalidate_token(&self, rejected: &str) {
        let mut state = self.inner.state.lock();
        let stale = match &state.phase {
            Phase::Valid { token, .. } => token == rejected,
            Phase::Empty => false,
            Phase::Refreshing(_) => false,
        };
        if stale {
            state.generation += 1;
            state.phase = Phase::Empty;
            tracing::info!("access token rejected upstream, cache invalidated");
        }
    }

    /// Number of exchanges attempted against the token endpoint.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::Relaxed)
    }

    fn start_refresh(&self, state: &mut CacheState) -> RefreshFlight {
        state.generation += 1;
        let generation = state.generation;

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.refresh(generation).await });
        let flight = async move {
            task.await.unwrap_or_else(|e| {
                Err(SpotifyError::Transport(format!("token refresh aborted: {e}")))
            })
        }
        .boxed()
        .shared();

        state.phase = Phase::Refreshing(flight.clone());
        flight
    }
}

impl Inner {
    async fn refresh(&self, generation: u64) -> Result<String, SpotifyError> {
        let outcome = self.exchange().await;

        let mut state = self.state.lock();
        if state.generation == generation {
            state.phase = match &outcome {
                Ok((token, expires_at)) => Phase::Valid {
                    token: token.clone(),
                    expires_at: *expires_at,
                },
                Err(_) => Phase::Empty,
            };
        }
        drop(state);

        match outcome {
            Ok((token, expires_at)) => {
                tracing::debug!(%expires_at, "access token refreshed");
                Ok(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, status = e.status(), "access token refresh failed");
                Err(e)
            }
        }
    }

    async fn exchange(&self) -> Result<(String, DateTime<Utc>), SpotifyError> {
        let record = self.credentials.load().await;
        let refresh_token = record.refresh_token().ok_or(SpotifyError::NoCredential)?;

        self.refreshes.fetch_add(1, Ordering::Relaxed);
        let token = self.endpoint.refresh(refresh_token).await?;

        let lifetime = Duration::seconds(token.expires_in.min(MAX_DECLARED_LIFETIME) as i64);
        let expires_at = self.clock.now() + lifetime - EXPIRY_SAFETY_MARGIN;
        Ok((token.access_token, expires_at))
    }
}
