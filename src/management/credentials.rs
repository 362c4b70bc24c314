use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::{
    error::StoreError,
    types::{CredentialRecord, Token},
};

/// Durable home of the refresh credential (`tokens.json`).
///
/// The only writer is the authorization callback. The token cache reads the
/// file on every refresh so a newly completed login takes effect without a
/// restart.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the credential record.
    ///
    /// Fails soft: a missing, unreadable or malformed file yields an empty
    /// record, which callers treat as "not connected".
    pub async fn load(&self) -> CredentialRecord {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "cannot read credential store");
                }
                return CredentialRecord::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "credential store is not valid JSON");
            CredentialRecord::default()
        })
    }

    pub async fn save(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(record)?;
        super::write_json(&self.path, json).await
    }

    /// Records the outcome of an authorization-code exchange.
    ///
    /// Keeps the previously stored refresh credential when the grant did not
    /// include one, and stamps the write time.
    pub async fn store_grant(&self, token: &Token) -> Result<CredentialRecord, StoreError> {
        let mut record = self.load().await;
        if let Some(refresh) = token.refresh_token.as_deref().filter(|t| !t.trim().is_empty()) {
            record.refresh_token = Some(refresh.to_string());
        }
        if token.scope.is_some() {
            record.scope = token.scope.clone();
        }
        record.updated_at = Some(Utc::now().to_rfc3339());

        self.save(&record).await?;
        Ok(record)
    }

    /// Creates an empty `{}` store when none exists yet.
    pub async fn ensure_exists(&self) -> Result<(), StoreError> {
        if async_fs::metadata(&self.path).await.is_ok() {
            return Ok(());
        }
        super::write_json(&self.path, "{}".to_string()).await
    }

    /// Whether a usable refresh credential is stored.
    pub async fn is_connected(&self) -> bool {
        self.load().await.refresh_token().is_some()
    }
}
