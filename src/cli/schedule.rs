use chrono::Utc;
use tabled::Table;

use crate::{
    config::Config,
    info,
    management::ScheduleStore,
    scheduler::engine::CompiledJob,
    types::{ScheduleEntry, ScheduleTableRow},
    warning,
};

fn next_fire(entry: &ScheduleEntry, config: &Config) -> String {
    match CompiledJob::compile(entry.clone()) {
        Ok(job) => job
            .cron
            .next_after(Utc::now(), config.schedule_tz)
            .map(|at| {
                at.with_timezone(&config.schedule_tz)
                    .format("%Y-%m-%d %H:%M %Z")
                    .to_string()
            })
            .unwrap_or_else(|| "never".to_string()),
        Err(reason) => format!("skipped ({reason})"),
    }
}

/// Prints every stored entry with the instant it will next fire.
pub async fn list_schedule(config: Config) {
    let store = ScheduleStore::new(&config.schedule_path);
    let document = store.load_document().await;

    if document.legacy {
        warning!(
            "{} has no items list, it will be rewritten on the next save",
            store.path().display()
        );
    }
    if document.items.is_empty() {
        info!("No schedule entries in {}", store.path().display());
        return;
    }

    let rows: Vec<ScheduleTableRow> = document
        .items
        .iter()
        .map(|entry| ScheduleTableRow {
            id: entry.id.clone(),
            title: entry.title.clone().unwrap_or_default(),
            cron: entry.cron.clone(),
            uri: entry.uri.clone(),
            enabled: entry.enabled,
            next_fire: next_fire(entry, &config),
        })
        .collect();

    println!("{}", Table::new(rows));
    info!(
        "{} entries, times in {}",
        document.items.len(),
        config.schedule_tz
    );
}
