//! Authenticated calls against the Spotify Web API.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{Value, json};
use url::Url;

use crate::{error::SpotifyError, spotify::auth::TokenCache};

/// Outbound request descriptor, independent of the HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Status and unparsed body of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one attempt with the given bearer token.
///
/// Implementations report connection-level failures as
/// [`SpotifyError::Transport`] and every HTTP status as a [`RawResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &UpstreamRequest, token: String)
    -> Result<RawResponse, SpotifyError>;
}

pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &UpstreamRequest,
        token: String,
    ) -> Result<RawResponse, SpotifyError> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .bearer_auth(token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        Ok(RawResponse { status, body })
    }
}

/// Successful upstream result.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    /// 204: the call succeeded and there is nothing to return.
    NoContent,
    Json(Value),
}

impl UpstreamBody {
    pub fn into_value(self) -> Value {
        match self {
            UpstreamBody::NoContent => Value::Null,
            UpstreamBody::Json(value) => value,
        }
    }
}

/// Parses a response body. Never fails: empty text is `null` and anything
/// that is not JSON is wrapped as `{"raw": text}`.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// Percent-encodes one caller-supplied path segment such as a playlist id,
/// so `/`, `?` and `#` cannot change the shape of the upstream URL.
pub fn path_segment(raw: &str) -> String {
    // byte_serialize writes a literal `+` as %2B, so every `+` left is a space.
    url::form_urlencoded::byte_serialize(raw.trim().as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Retry policy for rejected credentials: one attempt, and on a 401 a
/// forced token refresh followed by exactly one more attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnauthorizedRetry;

impl UnauthorizedRetry {
    /// Runs `attempt` with a token from `tokens`.
    ///
    /// If the forced refresh after a 401 fails, the first response is
    /// returned unchanged and the caller reports it as an upstream error.
    pub async fn run<F, Fut>(
        &self,
        tokens: &TokenCache,
        mut attempt: F,
    ) -> Result<RawResponse, SpotifyError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<RawResponse, SpotifyError>>,
    {
        let token = tokens.access_token().await?;
        let first = attempt(token.clone()).await?;
        if first.status != 401 {
            return Ok(first);
        }

        tokens.invalidate_token(&token);
        match tokens.access_token().await {
            Ok(fresh) => attempt(fresh).await,
            Err(e) => {
                tracing::warn!(error = %e, "refresh after 401 failed, giving up on retry");
                Ok(first)
            }
        }
    }
}

/// Fixed delays between the calls of one bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between chunks of a playlist write.
    pub write: Duration,
    /// Between pages of a paged read.
    pub read: Duration,
    /// Between delete chunks while clearing a playlist.
    pub clear: Duration,
    /// Between catalog searches when resolving planner queries.
    pub search: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            write: Duration::from_millis(40),
            read: Duration::from_millis(40),
            clear: Duration::from_millis(60),
            search: Duration::from_millis(70),
        }
    }
}

impl Pacing {
    /// No delays at all.
    pub fn none() -> Self {
        Self {
            write: Duration::ZERO,
            read: Duration::ZERO,
            clear: Duration::ZERO,
            search: Duration::ZERO,
        }
    }
}

/// Spotify Web API client sharing one [`TokenCache`].
#[derive(Clone)]
pub struct SpotifyClient {
    tokens: TokenCache,
    transport: Arc<dyn Transport>,
    base_url: String,
    retry: UnauthorizedRetry,
    pacing: Pacing,
}

impl SpotifyClient {
    pub fn new(tokens: TokenCache, transport: Arc<dyn Transport>, base_url: &str) -> Self {
        Self {
            tokens,
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry: UnauthorizedRetry,
            pacing: Pacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Absolute URL for an API path such as `me/player/devices`.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, SpotifyError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut url = Url::parse(&raw)
            .map_err(|e| SpotifyError::Configuration(format!("SPOTIFY_API_URL: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Executes one authenticated call with the 401 retry policy.
    pub async fn call(&self, request: UpstreamRequest) -> Result<UpstreamBody, SpotifyError> {
        let transport = &self.transport;
        let request = &request;
        let res = self
            .retry
            .run(&self.tokens, |token| transport.send(request, token))
            .await?;

        if res.status == 204 {
            return Ok(UpstreamBody::NoContent);
        }

        let value = parse_body(&res.body);
        if (200..300).contains(&res.status) {
            Ok(UpstreamBody::Json(value))
        } else {
            Err(SpotifyError::from_response(res.status, value))
        }
    }

    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, SpotifyError> {
        let url = self.endpoint(path, query)?;
        self.get_url(url).await
    }

    /// GET against an absolute URL, e.g. a `next` cursor from a paging object.
    pub async fn get_url(&self, url: Url) -> Result<Value, SpotifyError> {
        self.call(UpstreamRequest::new(Method::GET, url))
            .await
            .map(UpstreamBody::into_value)
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<UpstreamBody, SpotifyError> {
        let mut request = UpstreamRequest::new(method, self.endpoint(path, query)?);
        request.body = body;
        self.call(request).await
    }
}
