//! Public object storage on Google Cloud Storage.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, error};

use crate::error::{require, MissingSecret};

const GCS_API: &str = "https://storage.googleapis.com";
const TOKEN_HINT: &str = "Set STORAGE_ACCESS_TOKEN to an OAuth token with storage write access.";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    MissingSecret(#[from] MissingSecret),
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    fn bucket(&self) -> &str;

    /// Store an object readable by anyone and return its public URL.
    async fn upload_public(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    async fn bucket_exists(&self) -> Result<bool, StorageError>;
}

pub struct GcsStorage {
    client: Client,
    bucket: String,
    access_token: Option<String>,
}

impl GcsStorage {
    pub fn new(client: Client, bucket: String, access_token: Option<String>) -> Self {
        Self {
            client,
            bucket,
            access_token,
        }
    }

    fn token(&self) -> Result<&str, MissingSecret> {
        require(self.access_token.as_deref(), "STORAGE_ACCESS_TOKEN", TOKEN_HINT)
    }
}

pub fn public_url(bucket: &str, path: &str) -> String {
    format!("{}/{}/{}", GCS_API, bucket, path)
}

#[async_trait]
impl ObjectStorage for GcsStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload_public(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let token = self.token()?;

        let response = self
            .client
            .post(format!("{}/upload/storage/v1/b/{}/o", GCS_API, self.bucket))
            .query(&[
                ("uploadType", "media"),
                ("name", path),
                ("predefinedAcl", "publicRead"),
            ])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Upload of {} failed: {} - {}", path, status, body);
            return Err(StorageError::Status { status, body });
        }

        debug!("Uploaded {} to bucket {}", path, self.bucket);
        Ok(public_url(&self.bucket, path))
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        let token = self.token()?;

        let response = self
            .client
            .get(format!("{}/storage/v1/b/{}", GCS_API, self.bucket))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(StorageError::Status {
                status,
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
