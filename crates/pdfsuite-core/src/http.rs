//! HTTP collaborators
//!
//! Storage follows the `/storage/v1/object/{bucket}/{path}` convention and
//! functions live under `/functions/v1/{name}`. Both send the API key as an
//! `apikey` header and as a bearer token.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::env;
use tracing::debug;

use crate::error::{InvokeError, StorageError};
use crate::file::PendingFile;
use crate::invoker::{FunctionRouting, InvokePayload, InvokeResponse, RemoteInvoker};
use crate::operation::OperationKind;
use crate::storage::{object_path, StorageAdapter, StoredFile};

pub use crate::storage::DEFAULT_BUCKET;

pub const ENV_URL: &str = "PDFSUITE_URL";
pub const ENV_API_KEY: &str = "PDFSUITE_API_KEY";
pub const ENV_BUCKET: &str = "PDFSUITE_BUCKET";

/// Connection settings shared by [`HttpStorage`] and [`HttpInvoker`]
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub bucket: String,
    pub routing: FunctionRouting,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("routing", &self.routing)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            routing: FunctionRouting::default(),
        }
    }

    /// Read `PDFSUITE_URL`, `PDFSUITE_API_KEY` and `PDFSUITE_BUCKET`.
    ///
    /// Unset values stay empty and surface as configuration errors on first use.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            env::var(ENV_URL).unwrap_or_default(),
            env::var(ENV_API_KEY).unwrap_or_default(),
        );
        if let Ok(bucket) = env::var(ENV_BUCKET) {
            if !bucket.trim().is_empty() {
                config.bucket = bucket;
            }
        }
        config
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_routing(mut self, routing: FunctionRouting) -> Self {
        self.routing = routing;
        self
    }

    /// Name of the first missing setting, if any
    pub fn missing_setting(&self) -> Option<&'static str> {
        if self.base_url.trim().is_empty() {
            Some("base URL")
        } else if self.api_key.trim().is_empty() {
            Some("API key")
        } else {
            None
        }
    }

    pub fn object_url(&self, file_path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            file_path.trim_start_matches('/')
        )
    }

    pub fn public_url(&self, file_path: &str) -> String {
        format!(
            "{}/storage/v1/public/{}/{}",
            self.base_url,
            self.bucket,
            file_path.trim_start_matches('/')
        )
    }

    pub fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, name)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Pull a readable message out of an error body
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        ["error", "message"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    });
    match message {
        Some(message) => format!("HTTP {}: {}", status.as_u16(), message),
        None if body.trim().is_empty() => format!("HTTP {}", status.as_u16()),
        None => format!("HTTP {}: {}", status.as_u16(), body.trim()),
    }
}

#[derive(Debug, Clone)]
pub struct HttpStorage {
    client: Client,
    config: ClientConfig,
}

impl HttpStorage {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn ensure_configured(&self) -> Result<(), StorageError> {
        match self.config.missing_setting() {
            Some(setting) => Err(StorageError::Configuration(setting.to_string())),
            None => Ok(()),
        }
    }

    /// Delete a stored object
    pub async fn remove(&self, file_path: &str) -> Result<(), StorageError> {
        self.ensure_configured()?;
        let response = self
            .config
            .authorize(self.client.delete(self.config.object_url(file_path)))
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected(error_message(status, &body)));
        }
        Ok(())
    }

    /// Fetch the bytes behind a public URL, such as a result artifact
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected(error_message(status, &body)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl StorageAdapter for HttpStorage {
    async fn upload(&self, file: &PendingFile, folder: &str) -> Result<StoredFile, StorageError> {
        self.ensure_configured()?;
        let file_path = object_path(file, folder);
        debug!(path = %file_path, bytes = file.len(), "Uploading object");

        let response = self
            .config
            .authorize(self.client.post(self.config.object_url(&file_path)))
            .header(CONTENT_TYPE, file.media_type())
            .body(file.bytes().to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected(error_message(status, &body)));
        }

        Ok(StoredFile {
            public_url: self.config.public_url(&file_path),
            file_path,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: Client,
    config: ClientConfig,
}

impl HttpInvoker {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl RemoteInvoker for HttpInvoker {
    async fn invoke(
        &self,
        kind: OperationKind,
        payload: &InvokePayload,
    ) -> Result<InvokeResponse, InvokeError> {
        if let Some(setting) = self.config.missing_setting() {
            return Err(InvokeError::Configuration(setting.to_string()));
        }
        let name = self.config.routing.function_name(kind);
        debug!(function = %name, "Calling remote function");

        let response = self
            .config
            .authorize(self.client.post(self.config.function_url(&name)))
            .json(payload)
            .send()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;

        // Error replies carry the same JSON shape, so parse regardless of status
        match serde_json::from_slice::<InvokeResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(InvokeError::Status(status.as_u16())),
            Err(e) => Err(InvokeError::Malformed(e.to_string())),
        }
    }
}
