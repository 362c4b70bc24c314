use serde_json::Value;

use crate::{config::Config, info, scheduler::engine::CompiledJob, success, warning};

/// Shows whether an account is connected, who it is and how many schedule
/// entries would be armed.
pub async fn status(config: Config) {
    let state = super::app_state(config);

    info!("Tokens file: {}", state.credentials.path().display());
    let record = state.credentials.load().await;
    if record.refresh_token().is_none() {
        warning!("No Spotify account connected, run `spotdeck auth`");
    } else {
        success!(
            "Spotify account connected (updated {})",
            record.updated_at.as_deref().unwrap_or("unknown")
        );
        if let Some(scope) = &record.scope {
            info!("Scope: {}", scope);
        }

        match state.client.get("me", &[]).await {
            Ok(me) => info!(
                "Signed in as {}",
                me.get("display_name")
                    .or_else(|| me.get("id"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            ),
            Err(e) => warning!("Cannot reach Spotify: {}", e),
        }
    }

    info!("Schedule file: {}", state.schedules.path().display());
    let entries = state.schedules.load().await;
    let armed = entries
        .iter()
        .filter(|e| CompiledJob::compile((*e).clone()).is_ok())
        .count();
    info!(
        "{} schedule entries, {} would be armed ({})",
        entries.len(),
        armed,
        state.config.schedule_tz
    );
}
