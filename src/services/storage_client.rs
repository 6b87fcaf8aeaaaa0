//! Blob store client
//!
//! Session uploads live in an external blob store; the pipeline only ever
//! lists a session prefix and fetches individual blobs to local disk.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::RawFile;

/// Blob store client errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage API error {0}: {1}")]
    Api(u16, String),

    #[error("Failed to write {0}: {1}")]
    Write(String, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Read access to the session blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List all blobs under a prefix (e.g. `sessions/<id>`).
    async fn list(&self, prefix: &str) -> Result<Vec<RawFile>, StorageError>;

    /// Download one blob to a local destination.
    async fn fetch(&self, path: &str, dest: &Path) -> Result<(), StorageError>;
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    files: Vec<ListedFile>,
}

#[derive(Debug, Deserialize)]
struct ListedFile {
    name: String,
    url: String,
    path: String,
}

/// Production client against the storage service's REST surface.
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBlobStore {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Network(e.to_string()))?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<RawFile>, StorageError> {
        let url = format!("{}/list", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api(status.as_u16(), body));
        }

        let listing: ListResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Parse(e.to_string()))?;

        Ok(listing
            .files
            .into_iter()
            .map(|f| RawFile {
                name: f.name,
                url: f.url,
                path: f.path,
            })
            .collect())
    }

    async fn fetch(&self, path: &str, dest: &Path) -> Result<(), StorageError> {
        let url = format!("{}/download", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("path", path)])
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api(status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| StorageError::Write(dest.display().to_string(), e.to_string()))?;

        Ok(())
    }
}
