//! # CLI Module
//!
//! User-facing commands of the `spotdeck` binary. Each command builds the
//! shared [`AppState`](crate::server::AppState) from the loaded
//! [`Config`](crate::config::Config) and reports with the colored output
//! macros (`info!`, `success!`, `warning!`, `error!`).
//!
//! ## Commands
//!
//! - [`serve`] - runs the HTTP API and the schedule engine until Ctrl+C
//! - [`auth`] - connects a Spotify account through the browser
//! - [`status`] - shows the stored credential and the schedule at a glance
//! - [`list_schedule`] - prints every schedule entry with its next fire
//!
//! ## Usage
//!
//! ```bash
//! spotdeck auth             # connect your Spotify account once
//! spotdeck schedule list    # check what will play and when
//! spotdeck serve            # run the backend
//! ```

mod auth;
mod schedule;
mod serve;
mod status;

pub use auth::auth;
pub use schedule::list_schedule;
pub use serve::serve;
pub use status::status;

use crate::{config::Config, error, server::AppState};

/// Builds the application state or exits with a readable message.
fn app_state(config: Config) -> AppState {
    match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => error!("Cannot initialize HTTP client: {}", e),
    }
}
