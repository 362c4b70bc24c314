use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::oneshot;
use url::Url;

use crate::{config::Config, error, info, server, success, warning};

const MAX_WAIT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Local login page. The redirect URI already points at this server, so its
/// origin is reused.
fn login_url(config: &Config) -> String {
    match Url::parse(&config.redirect_uri) {
        Ok(mut url) => {
            url.set_path("/auth/login");
            url.set_query(None);
            url.to_string()
        }
        Err(_) => format!("http://{}/auth/login", config.server_addr),
    }
}

/// Starts the server, opens the login page and waits until the callback
/// has stored a new refresh credential.
pub async fn auth(config: Config) {
    if let Err(e) = config.client_credentials() {
        error!("Cannot authorize: {}", e);
    }

    let url = login_url(&config);
    let state = super::app_state(config);
    let credentials = state.credentials.clone();
    let before = credentials.load().await.updated_at;

    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(state, async move {
        let _ = stopped.await;
    }));

    info!("Opening {} in your browser...", url);
    if webbrowser::open(&url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            url
        );
    }

    let pb = ProgressBar::new_spinner();
    pb.set_message("Waiting for Spotify authorization...");
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let start = Instant::now();
    let mut connected = false;
    while start.elapsed() < MAX_WAIT {
        if server.is_finished() {
            break;
        }
        let record = credentials.load().await;
        if record.refresh_token().is_some() && record.updated_at != before {
            connected = true;
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    pb.finish_and_clear();

    let _ = stop.send(());
    match server.await {
        Ok(Err(e)) => warning!("Server stopped with an error: {}", e),
        Err(e) => warning!("Server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    if connected {
        success!("Spotify account connected.");
    } else {
        error!("Authorization failed or timed out.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_follows_redirect_origin() {
        let config = Config {
            redirect_uri: "http://127.0.0.1:4000/auth/callback?x=1".into(),
            ..Config::default()
        };
        assert_eq!(login_url(&config), "http://127.0.0.1:4000/auth/login");

        let config = Config {
            redirect_uri: "not a url".into(),
            server_addr: "0.0.0.0:3001".into(),
            ..Config::default()
        };
        assert_eq!(login_url(&config), "http://0.0.0.0:3001/auth/login");
    }
}
