//! Shared application state, the route table and the HTTP listener.

use std::{future::Future, net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use axum::{
    Extension, Router,
    http::{HeaderValue, StatusCode},
    routing::{delete, get, post, put},
};
use reqwest::Client;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    Res, api,
    config::Config,
    error::SpotifyError,
    management::{CredentialStore, ScheduleStore},
    planner::{OpenAiPlanner, PlaylistPlanner},
    scheduler::{Clock, ScheduleEngine, SystemClock},
    spotify::{
        auth::{SpotifyAccounts, TokenCache, TokenEndpoint},
        client::{Pacing, ReqwestTransport, SpotifyClient, Transport},
    },
};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a handler needs. Cheap to clone: every field is shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub credentials: CredentialStore,
    pub accounts: Arc<dyn TokenEndpoint>,
    pub client: SpotifyClient,
    pub schedules: ScheduleStore,
    pub engine: ScheduleEngine,
    pub planner: Arc<dyn PlaylistPlanner>,
}

impl AppState {
    /// Wires the production collaborators: the Spotify accounts service, a
    /// reqwest transport, the OpenAI planner and the system clock.
    pub fn from_config(config: Config) -> Result<Self, SpotifyError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let accounts = Arc::new(SpotifyAccounts::new(http.clone(), &config));
        let planner = Arc::new(OpenAiPlanner::new(http.clone(), &config));
        let transport = Arc::new(ReqwestTransport::new(http));

        Ok(Self::new(
            config,
            accounts,
            transport,
            planner,
            Arc::new(SystemClock),
            Pacing::default(),
        ))
    }

    /// Builds the state from explicit collaborators.
    pub fn new(
        config: Config,
        accounts: Arc<dyn TokenEndpoint>,
        transport: Arc<dyn Transport>,
        planner: Arc<dyn PlaylistPlanner>,
        clock: Arc<dyn Clock>,
        pacing: Pacing,
    ) -> Self {
        let credentials = CredentialStore::new(&config.tokens_path);
        let schedules = ScheduleStore::new(&config.schedule_path);

        let tokens = TokenCache::new(credentials.clone(), Arc::clone(&accounts), Arc::clone(&clock));
        let client = SpotifyClient::new(tokens, transport, &config.api_url).with_pacing(pacing);
        let engine = ScheduleEngine::new(
            schedules.clone(),
            client.clone(),
            clock,
            config.schedule_tz,
        );

        Self {
            config: Arc::new(config),
            credentials,
            accounts,
            client,
            schedules,
            engine,
            planner,
        }
    }
}

fn cors_layer(config: &Config) -> Option<CorsLayer> {
    match config.cors_origin.as_deref() {
        Some("*") => Some(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .filter_map(|o| match HeaderValue::from_str(o) {
                    Ok(v) => Some(v),
                    Err(_) => {
                        tracing::warn!(origin = o, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            Some(
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        }
        None if !config.production => Some(CorsLayer::very_permissive()),
        None => None,
    }
}

/// The full route table with CORS and request tracing applied.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(api::health))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/auth/login", get(api::auth::login))
        .route("/auth/callback", get(api::auth::callback))
        .route("/api/auth/status", get(api::auth::status))
        .route("/api/me", get(api::search::me))
        .route("/api/search/{kind}", get(api::search::search))
        .route("/api/search-track", get(api::search::search_track))
        .route("/api/search-playlist", get(api::search::search_playlist))
        .route("/api/search-artist", get(api::search::search_artist))
        .route("/api/search-album", get(api::search::search_album))
        .route("/api/artist-albums", get(api::search::artist_albums))
        .route("/api/me/playlists", get(api::playlists::my_playlists))
        .route("/api/playlists/create", post(api::playlists::create))
        .route("/api/playlists/{id}", get(api::playlists::get))
        .route("/api/playlists/{id}/details", put(api::playlists::update_details))
        .route(
            "/api/playlists/{id}/items",
            get(api::playlists::items).put(api::playlists::update_items),
        )
        .route("/api/playlists/{id}/items/all", get(api::playlists::items_all))
        .route("/api/playlists/{id}/add-items", post(api::playlists::add_items))
        .route(
            "/api/playlists/{id}/remove-items",
            delete(api::playlists::remove_items),
        )
        .route("/api/playlists/{id}/clear", put(api::playlists::clear))
        .route("/api/playlists/{id}/follow", put(api::playlists::follow))
        .route(
            "/api/playlists/{id}/unfollow",
            delete(api::playlists::unfollow),
        )
        .route("/api/player/devices", get(api::player::devices))
        .route("/api/player/state", get(api::player::state))
        .route("/api/player/play-context", put(api::player::play_context))
        .route("/api/player/play-uris", put(api::player::play_uris))
        .route("/api/player/pause", put(api::player::pause))
        .route("/api/player/resume", put(api::player::resume))
        .route("/api/player/seek", put(api::player::seek))
        .route("/api/player/shuffle", put(api::player::shuffle))
        .route("/api/player/next", post(api::player::next))
        .route("/api/player/previous", post(api::player::previous))
        .route(
            "/api/schedule",
            get(api::schedule::list).put(api::schedule::replace),
        )
        .route("/api/schedule/reload", post(api::schedule::reload))
        .route("/api/ai/playlist/preview", post(api::ai::preview))
        .route("/api/ai/playlist/create", post(api::ai::create));

    let mut router = router.layer(Extension(state.clone()));
    if let Some(cors) = cors_layer(&state.config) {
        router = router.layer(cors);
    }
    router.layer(TraceLayer::new_for_http())
}

/// Prepares the stores, arms the schedule and serves until `shutdown`
/// resolves. Timers are stopped once the listener has drained.
pub async fn serve<F>(state: AppState, shutdown: F) -> Res<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    state.config.log_summary();
    state.credentials.ensure_exists().await?;
    state.schedules.ensure_exists().await?;

    let addr = SocketAddr::from_str(&state.config.server_addr)
        .map_err(|e| format!("invalid server address {}: {e}", state.config.server_addr))?;

    state.engine.compile().await;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API listening");

    let engine = state.engine.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    engine.stop_all();
    tracing::info!("server shut down");
    Ok(())
}

/// Runs the server until Ctrl+C or SIGTERM.
pub async fn start_api_server(state: AppState) -> Res<()> {
    serve(state, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
