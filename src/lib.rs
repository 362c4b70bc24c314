//! Spotify Control Panel Backend Library
//!
//! This library implements the backend of a single-user Spotify control panel:
//! a REST proxy that holds one long-lived OAuth credential and exchanges it for
//! short-lived access tokens on demand, plus a cron-style engine that starts
//! playback of a track, album or playlist at fixed times.
//!
//! # Modules
//!
//! - `api` - HTTP handlers for the proxy and administrative surface
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error taxonomy shared by every layer
//! - `management` - Durable credential and schedule stores
//! - `planner` - AI-assisted playlist planning
//! - `scheduler` - Trigger expressions, clocks and the schedule engine
//! - `server` - Router construction and the HTTP listener
//! - `spotify` - Spotify Web API client, token cache and endpoint helpers
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers
//!
//! # Example
//!
//! ```
//! use spotdeck::{config, server};
//!
//! #[tokio::main]
//! async fn main() -> spotdeck::Res<()> {
//!     config::load_env().await?;
//!     let config = config::Config::from_env()?;
//!     let state = server::AppState::from_config(config)?;
//!     server::start_api_server(state).await
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod management;
pub mod planner;
pub mod scheduler;
pub mod server;
pub mod spotify;
pub mod types;
pub mod utils;

/// A convenient Result type alias for operations that may fail.
///
/// Used at the binary boundary (`main`, CLI commands, server start-up) where
/// errors from different layers meet and only need to be reported. Library
/// code below that boundary returns the typed errors from [`error`].
///
/// # Type Parameters
///
/// - `T` - The success type returned on successful operations
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Used by CLI commands for general information and status updates. Server
/// diagnostics go through `tracing` instead.
///
/// # Example
///
/// ```
/// info!("Opening browser for authorization...");
/// info!("{} schedule entries loaded", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// # Example
///
/// ```
/// success!("Authorization stored");
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only for fatal CLI errors: the process terminates with exit code 1 right
/// after printing.
///
/// # Example
///
/// ```
/// error!("Cannot load configuration: {}", e);
/// // Program exits here - code after this will not execute
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// # Example
///
/// ```
/// warning!("Failed to open browser, open {} manually", url);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
