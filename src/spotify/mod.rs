//! # Spotify Integration Module
//!
//! Interface to the Spotify Web API and the Spotify accounts service. Every
//! outbound call of the control panel, whether it comes from an HTTP route
//! or from a scheduled playback, goes through this module.
//!
//! ## Architecture
//!
//! ```text
//! Routes / Schedule Engine
//!          ↓
//! Endpoint helpers (player, playlist, search)
//!          ↓
//! SpotifyClient ── UnauthorizedRetry ── TokenCache ── CredentialStore
//!          ↓                                 ↓
//!      Transport                       TokenEndpoint
//!          ↓                                 ↓
//! Spotify Web API                   Spotify accounts service
//! ```
//!
//! ## Core Modules
//!
//! - [`auth`] - Token endpoint exchanges, the authorize URL and the
//!   single-flight [`TokenCache`](auth::TokenCache)
//! - [`client`] - [`SpotifyClient`](client::SpotifyClient): bearer auth,
//!   one retry after a 401, body parsing and error mapping
//! - [`uri`] - Normalisation of web links into `spotify:` URIs and play payloads
//! - [`player`] - Device listing and transport controls
//! - [`playlist`] - Playlist CRUD with chunked, paced bulk writes
//! - [`search`] - Catalog search with normalised pagination
//!
//! ## Error Handling
//!
//! Every function returns [`SpotifyError`](crate::error::SpotifyError). Only a
//! 401 is retried, exactly once, after a forced token refresh. Rate limits
//! and server errors are reported to the caller unchanged.
//!
//! ## Token Management
//!
//! Access tokens are cached until 60 seconds before their declared expiry.
//! Concurrent callers that need a new token share a single exchange.

pub mod auth;
pub mod client;
pub mod player;
pub mod playlist;
pub mod search;
pub mod uri;
