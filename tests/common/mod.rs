#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;

use spotdeck::{
    config::Config,
    error::{PlannerError, SpotifyError},
    management::CredentialStore,
    planner::PlaylistPlanner,
    scheduler::{Clock, ManualClock},
    spotify::{
        auth::{TokenCache, TokenEndpoint},
        client::{Pacing, RawResponse, SpotifyClient, Transport, UpstreamRequest},
    },
    types::{CredentialRecord, PlaylistPlan, Token},
};

pub const API_BASE: &str = "https://api.test/v1";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
}

pub fn token(access: &str, expires_in: u64) -> Token {
    Token {
        access_token: access.to_string(),
        refresh_token: None,
        scope: None,
        expires_in,
    }
}

/// Token endpoint that answers from a script, then with `access-{n}`.
pub struct FakeTokenEndpoint {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<Token, SpotifyError>>>,
    delay: Duration,
    expires_in: u64,
}

impl FakeTokenEndpoint {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            expires_in: 3600,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = expires_in;
        self
    }

    pub fn then(self, outcome: Result<Token, SpotifyError>) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn refresh(&self, refresh_token: &str) -> Result<Token, SpotifyError> {
        assert_eq!(refresh_token, "stored-refresh");
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(token(&format!("access-{n}"), self.expires_in)))
    }

    async fn exchange_code(&self, code: &str) -> Result<Token, SpotifyError> {
        Ok(Token {
            access_token: format!("code-access-{code}"),
            refresh_token: Some("stored-refresh".to_string()),
            scope: Some("user-read-private".to_string()),
            expires_in: 3600,
        })
    }
}

type Responder = Box<dyn Fn(&UpstreamRequest) -> Result<RawResponse, SpotifyError> + Send + Sync>;

/// One request seen by [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub request: UpstreamRequest,
    pub token: String,
}

impl Recorded {
    /// Path and query relative to [`API_BASE`].
    pub fn target(&self) -> String {
        let url = self.request.url.as_str();
        url.strip_prefix(API_BASE)
            .unwrap_or(url)
            .trim_start_matches('/')
            .to_string()
    }
}

/// Transport that records every attempt. Scripted responses are used first,
/// then the responder.
pub struct RecordingTransport {
    seen: Mutex<Vec<Recorded>>,
    script: Mutex<VecDeque<Result<RawResponse, SpotifyError>>>,
    responder: Responder,
}

impl RecordingTransport {
    pub fn new(
        responder: impl Fn(&UpstreamRequest) -> Result<RawResponse, SpotifyError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
        }
    }

    /// Answers every request with 204.
    pub fn no_content() -> Self {
        Self::new(|_| Ok(raw(204, "")))
    }

    pub fn then(self, outcome: Result<RawResponse, SpotifyError>) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    pub fn seen(&self) -> Vec<Recorded> {
        self.seen.lock().clone()
    }

    pub fn targets(&self) -> Vec<String> {
        self.seen.lock().iter().map(Recorded::target).collect()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        request: &UpstreamRequest,
        token: String,
    ) -> Result<RawResponse, SpotifyError> {
        self.seen.lock().push(Recorded {
            request: request.clone(),
            token,
        });
        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| (self.responder)(request))
    }
}

pub fn raw(status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        body: body.to_string(),
    }
}

/// Planner returning a fixed plan.
pub struct FakePlanner {
    pub plan: PlaylistPlan,
}

impl FakePlanner {
    pub fn new(queries: &[&str]) -> Self {
        Self {
            plan: PlaylistPlan {
                name: "Morning".to_string(),
                description: "easy start".to_string(),
                tracks: queries.iter().map(|q| q.to_string()).collect(),
            },
        }
    }
}

#[async_trait]
impl PlaylistPlanner for FakePlanner {
    async fn plan(&self, _prompt: &str, _count: usize) -> Result<PlaylistPlan, PlannerError> {
        Ok(self.plan.clone())
    }
}

/// Temporary data directory with `tokens.json` and `schedule.json` paths.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::new(self.dir.path().join("tokens.json"))
    }

    pub fn schedule_path(&self) -> std::path::PathBuf {
        self.dir.path().join("schedule.json")
    }

    /// Stores a refresh credential so token exchanges can happen.
    pub async fn connect(&self) -> CredentialStore {
        let store = self.credentials();
        store
            .save(&CredentialRecord {
                refresh_token: Some("stored-refresh".to_string()),
                ..CredentialRecord::default()
            })
            .await
            .unwrap();
        store
    }

    pub async fn write_schedule(&self, doc: &Value) {
        std::fs::write(self.schedule_path(), serde_json::to_string_pretty(doc).unwrap()).unwrap();
    }

    pub fn config(&self) -> Config {
        Config {
            api_url: API_BASE.to_string(),
            tokens_path: self.dir.path().join("tokens.json"),
            schedule_path: self.schedule_path(),
            schedule_tz: chrono_tz::UTC,
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            ..Config::default()
        }
    }
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

pub fn client(
    credentials: CredentialStore,
    endpoint: Arc<FakeTokenEndpoint>,
    transport: Arc<RecordingTransport>,
    clock: Arc<dyn Clock>,
) -> SpotifyClient {
    let tokens = TokenCache::new(credentials, endpoint, clock);
    SpotifyClient::new(tokens, transport, API_BASE).with_pacing(Pacing::none())
}

/// Polls `done` until it holds, for at most two seconds.
pub async fn eventually(done: impl Fn() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
