//! Turns schedule entries into live timers and runs them.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::task::AbortHandle;

use crate::{
    management::ScheduleStore,
    scheduler::{
        clock::Clock,
        cron::{CronError, CronExpression, CronParser},
    },
    spotify::{client::SpotifyClient, player, uri},
    types::{PlayRequest, ScheduleDocument, ScheduleEntry},
};

/// Why an entry did not get a timer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("disabled")]
    Disabled,
    #[error("invalid trigger expression: {0}")]
    InvalidCron(#[from] CronError),
    #[error("unresolvable target {0:?}")]
    Unresolvable(String),
}

/// An entry ready to be armed: parsed trigger plus the play payload built
/// from the target at compile time.
#[derive(Debug, Clone)]
pub struct CompiledJob {
    pub entry: ScheduleEntry,
    pub cron: CronExpression,
    pub payload: PlayRequest,
}

impl CompiledJob {
    pub fn compile(entry: ScheduleEntry) -> Result<Self, SkipReason> {
        if !entry.enabled {
            return Err(SkipReason::Disabled);
        }
        let cron = CronParser::parse(entry.cron.trim())?;
        let payload = uri::play_request_for(&entry.uri, entry.start_from_beginning)
            .ok_or_else(|| SkipReason::Unresolvable(entry.uri.clone()))?;
        Ok(Self {
            entry,
            cron,
            payload,
        })
    }
}

/// Devices a fire is sent to, in priority order: the entry's `deviceId`, the
/// entry's `devices`, the store's `deviceId`, the store's `devices`. Empty
/// means "whatever device is active".
pub fn resolve_devices(document: &ScheduleDocument, entry: &ScheduleEntry) -> Vec<String> {
    fn single(id: Option<&str>) -> Option<Vec<String>> {
        id.map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| vec![d.to_string()])
    }

    fn list(ids: &[String]) -> Option<Vec<String>> {
        let ids: Vec<String> = ids
            .iter()
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();
        (!ids.is_empty()).then_some(ids)
    }

    single(entry.device_id.as_deref())
        .or_else(|| entry.devices.as_deref().and_then(list))
        .or_else(|| single(document.device_id.as_deref()))
        .or_else(|| list(&document.devices))
        .unwrap_or_default()
}

/// One armed timer.
struct ActiveTimer {
    entry_id: String,
    handle: AbortHandle,
}

struct EngineInner {
    store: ScheduleStore,
    client: SpotifyClient,
    clock: Arc<dyn Clock>,
    tz: Tz,
    timers: Mutex<Vec<ActiveTimer>>,
    compiling: tokio::sync::Mutex<()>,
    fires: AtomicU64,
}

/// Owns every active timer. Timers are never diffed: each compile stops all
/// of them and arms a fresh set from the store.
#[derive(Clone)]
pub struct ScheduleEngine {
    inner: Arc<EngineInner>,
}

impl ScheduleEngine {
    pub fn new(store: ScheduleStore, client: SpotifyClient, clock: Arc<dyn Clock>, tz: Tz) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                client,
                clock,
                tz,
                timers: Mutex::new(Vec::new()),
                compiling: tokio::sync::Mutex::new(()),
                fires: AtomicU64::new(0),
            }),
        }
    }

    /// Stops all timers and arms one per enabled, valid entry in the store.
    ///
    /// Skipped entries are only logged at debug level; the returned count is
    /// the number of timers created.
    pub async fn compile(&self) -> usize {
        let _compiling = self.inner.compiling.lock().await;
        self.stop_all();

        let entries = self.inner.store.load().await;
        let now = self.inner.clock.now();
        let mut armed = Vec::new();

        for entry in entries {
            let entry_id = entry.id.clone();
            let job = match CompiledJob::compile(entry) {
                Ok(job) => job,
                Err(reason) => {
                    tracing::debug!(entry_id = %entry_id, %reason, "schedule entry skipped");
                    continue;
                }
            };

            // The first fire is fixed here, so a clock that moves right
            // after compile cannot make the timer miss it.
            let first = job.cron.next_after(now, self.inner.tz);
            tracing::debug!(
                entry_id = %entry_id,
                cron = %job.cron,
                next_fire = ?first,
                "schedule entry armed"
            );

            let inner = Arc::clone(&self.inner);
            let task = tokio::spawn(run_timer(inner, Arc::new(job), first));
            armed.push(ActiveTimer {
                entry_id,
                handle: task.abort_handle(),
            });
        }

        let count = armed.len();
        *self.inner.timers.lock() = armed;
        tracing::info!(tasks_created = count, "schedule compiled");
        count
    }

    /// Same as [`ScheduleEngine::compile`]. Executions already in flight
    /// run to completion; only future fires are affected.
    pub async fn reload(&self) -> usize {
        self.compile().await
    }

    /// Aborts every timer.
    pub fn stop_all(&self) {
        let timers = std::mem::take(&mut *self.inner.timers.lock());
        for timer in &timers {
            timer.handle.abort();
        }
        if !timers.is_empty() {
            tracing::debug!(stopped = timers.len(), "schedule timers stopped");
        }
    }

    pub fn active_timers(&self) -> usize {
        self.inner.timers.lock().len()
    }

    /// Ids of the entries that currently have a timer.
    pub fn armed_entries(&self) -> Vec<String> {
        self.inner
            .timers
            .lock()
            .iter()
            .map(|t| t.entry_id.clone())
            .collect()
    }

    /// Number of fires since start-up.
    pub fn fire_count(&self) -> u64 {
        self.inner.fires.load(Ordering::Relaxed)
    }

    /// Runs the playback sequence of `job` once, as a fire would.
    pub async fn execute(&self, job: &CompiledJob) {
        self.inner.execute(job).await;
    }
}

async fn run_timer(inner: Arc<EngineInner>, job: Arc<CompiledJob>, first: Option<DateTime<Utc>>) {
    let mut next = first;
    while let Some(at) = next {
        inner.clock.sleep_until(at).await;
        inner.fires.fetch_add(1, Ordering::Relaxed);

        // Detached, so aborting this timer on reload leaves the run alone.
        let runner = Arc::clone(&inner);
        let fired = Arc::clone(&job);
        tokio::spawn(async move { runner.execute(&fired).await });

        let from = inner.clock.now().max(at);
        next = job.cron.next_after(from, inner.tz);
    }
    tracing::debug!(entry_id = %job.entry.id, "no further fire instants, timer finished");
}

impl EngineInner {
    async fn execute(&self, job: &CompiledJob) {
        let document = self.store.load_document().await;
        let fresh = document.items.iter().find(|e| e.id == job.entry.id);
        let entry = fresh.unwrap_or(&job.entry);

        let payload = match fresh {
            Some(current) => uri::play_request_for(&current.uri, job.entry.start_from_beginning)
                .unwrap_or_else(|| {
                    tracing::warn!(
                        entry_id = %job.entry.id,
                        uri = %current.uri,
                        "stored target no longer resolves, using the compiled one"
                    );
                    job.payload.clone()
                }),
            None => job.payload.clone(),
        };

        let devices = resolve_devices(&document, entry);
        let targets: Vec<Option<&str>> = if devices.is_empty() {
            vec![None]
        } else {
            devices.iter().map(|d| Some(d.as_str())).collect()
        };

        tracing::info!(
            entry_id = %job.entry.id,
            label = %entry.label(),
            target = %payload.target(),
            devices = devices.len(),
            "scheduled playback firing"
        );

        for device in targets {
            let device_id = device.unwrap_or("active");

            if let Err(e) = player::shuffle(&self.client, job.entry.shuffle, device).await {
                tracing::warn!(
                    entry_id = %job.entry.id,
                    device_id,
                    status = e.status(),
                    error = %e,
                    "scheduled shuffle failed, skipping device"
                );
                continue;
            }

            match player::play(&self.client, &payload, device).await {
                Ok(()) => tracing::info!(
                    entry_id = %job.entry.id,
                    device_id,
                    "scheduled playback started"
                ),
                Err(e) => tracing::warn!(
                    entry_id = %job.entry.id,
                    device_id,
                    status = e.status(),
                    error = %e,
                    "scheduled playback failed"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_and_invalid_entries_do_not_compile() {
        let mut disabled = ScheduleEntry::new("a", "30 7 * * *", "spotify:playlist:X");
        disabled.enabled = false;
        assert_eq!(
            CompiledJob::compile(disabled).unwrap_err(),
            SkipReason::Disabled
        );

        let bad_cron = ScheduleEntry::new("b", "not a cron", "spotify:playlist:X");
        assert!(matches!(
            CompiledJob::compile(bad_cron),
            Err(SkipReason::InvalidCron(_))
        ));

        let bad_uri = ScheduleEntry::new("c", "30 7 * * *", "https://open.spotify.com/user/x");
        assert!(matches!(
            CompiledJob::compile(bad_uri),
            Err(SkipReason::Unresolvable(_))
        ));
    }

    #[test]
    fn device_resolution_order() {
        let mut doc = ScheduleDocument {
            device_id: Some("store-1".into()),
            devices: vec!["store-2".into(), "store-3".into()],
            ..ScheduleDocument::default()
        };
        let mut entry = ScheduleEntry::new("a", "* * * * *", "spotify:track:t");
        assert_eq!(resolve_devices(&doc, &entry), vec!["store-1"]);

        doc.device_id = None;
        assert_eq!(resolve_devices(&doc, &entry), vec!["store-2", "store-3"]);

        entry.devices = Some(vec!["  ".into(), "entry-2".into()]);
        assert_eq!(resolve_devices(&doc, &entry), vec!["entry-2"]);

        entry.device_id = Some("entry-1".into());
        assert_eq!(resolve_devices(&doc, &entry), vec!["entry-1"]);

        let empty = ScheduleDocument::default();
        let bare = ScheduleEntry::new("b", "* * * * *", "spotify:track:t");
        assert!(resolve_devices(&empty, &bare).is_empty());
    }
}
