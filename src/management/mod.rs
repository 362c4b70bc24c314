mod credentials;
mod schedule;

pub use credentials::CredentialStore;
pub use schedule::ScheduleStore;

use std::path::Path;

use crate::error::StoreError;

/// Writes `json` to `path`, creating parent directories first.
async fn write_json(path: &Path, json: String) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            async_fs::create_dir_all(parent).await.map_err(io_err)?;
        }
    }

    async_fs::write(path, json).await.map_err(io_err)
}
