use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::{
    error::StoreError,
    types::{ScheduleDocument, ScheduleEntry},
};

/// Durable home of the schedule (`schedule.json`).
///
/// Layout: `{"items": [...], "deviceId"?, "devices"?, ...}`. Top-level keys
/// other than `items` belong to whoever wrote them and survive every save.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    path: PathBuf,
}

impl ScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries currently on disk. Empty when the file is missing or corrupt.
    pub async fn load(&self) -> Vec<ScheduleEntry> {
        self.load_document().await.items
    }

    /// Reads the whole document, including the store-level device defaults.
    ///
    /// Entries with odd field types load with those fields blanked, so an
    /// edit round trip keeps them. Items that are not objects are skipped
    /// with a warning.
    pub async fn load_document(&self) -> ScheduleDocument {
        let Some(raw) = self.read_raw().await else {
            return ScheduleDocument::default();
        };

        let legacy = !raw.get("items").is_some_and(Value::is_array);
        let items = raw
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        serde_json::from_value::<ScheduleEntry>(item.clone())
                            .map_err(|e| {
                                tracing::warn!(index, error = %e, "skipping malformed schedule item")
                            })
                            .ok()
                    })
                    .collect()
            })
            .unwrap_or_default();

        let device_id = raw
            .get("deviceId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let devices = raw
            .get("devices")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        ScheduleDocument {
            items,
            device_id,
            devices,
            legacy,
        }
    }

    /// Replaces the entry list, keeping every other top-level key on disk.
    pub async fn save(&self, items: &[ScheduleEntry]) -> Result<(), StoreError> {
        let mut doc = match self.read_raw().await {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        doc.insert("items".to_string(), serde_json::to_value(items)?);

        let json = serde_json::to_string_pretty(&Value::Object(doc))?;
        super::write_json(&self.path, json).await
    }

    /// Creates `{"items": []}` when no schedule exists yet.
    pub async fn ensure_exists(&self) -> Result<(), StoreError> {
        if async_fs::metadata(&self.path).await.is_ok() {
            return Ok(());
        }
        self.save(&[]).await
    }

    async fn read_raw(&self) -> Option<Value> {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "cannot read schedule store");
                }
                return None;
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(value @ Value::Object(_)) => Some(value),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "schedule store is not a JSON object");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "schedule store is not valid JSON");
                None
            }
        }
    }
}
