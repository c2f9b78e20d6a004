use crate::config::ApiCredential;
use crate::constants::{REMOTE_TIMEOUT_SECS, TINIFY_SHRINK_URL, TINIFY_USER};
use crate::error::{ConfigError, FileError, FileErrorKind};
use reqwest::header::LOCATION;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a remote compression request did not produce bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("credentials rejected: {0}")]
    Auth(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("input rejected: {0}")]
    Unsupported(String),
}

impl From<RemoteError> for FileError {
    fn from(err: RemoteError) -> Self {
        let kind = match err {
            RemoteError::Auth(_) => FileErrorKind::RemoteAuthFailure,
            RemoteError::Quota(_) => FileErrorKind::RemoteQuotaExceeded,
            RemoteError::Network(_) => FileErrorKind::RemoteNetworkFailure,
            RemoteError::Unsupported(_) => FileErrorKind::UnsupportedFormat,
        };
        FileError::new(kind, err.to_string())
    }
}

/// A service that takes image bytes and hands back smaller ones.
///
/// Called concurrently from the batch workers.
pub trait RemoteCompressor: Send + Sync {
    fn compress(&self, source: &[u8]) -> Result<Vec<u8>, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct TinifyErrorBody {
    error: String,
    message: String,
}

/// Maps a failed Tinify response onto a [`RemoteError`].
pub fn classify_response(status: StatusCode, body: &str) -> RemoteError {
    let detail = match serde_json::from_str::<TinifyErrorBody>(body) {
        Ok(parsed) => format!("{} ({})", parsed.message, parsed.error),
        Err(_) => format!("HTTP {}", status),
    };

    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::Quota(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            RemoteError::Unsupported(detail)
        }
        _ => RemoteError::Network(detail),
    }
}

/// Client for the Tinify (TinyPNG) shrink API.
///
/// Owns a small tokio runtime so the synchronous batch workers can drive
/// the async HTTP client with `block_on`.
pub struct TinifyClient {
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    credential: ApiCredential,
    endpoint: String,
}

impl TinifyClient {
    pub fn new(credential: ApiCredential) -> crate::error::Result<Self> {
        Self::with_endpoint(credential, TINIFY_SHRINK_URL)
    }

    pub fn with_endpoint(
        credential: ApiCredential,
        endpoint: impl Into<String>,
    ) -> crate::error::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| ConfigError::RemoteClient(format!("failed to create runtime: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REMOTE_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConfigError::RemoteClient(e.to_string()))?;

        Ok(Self {
            http,
            runtime,
            credential,
            endpoint: endpoint.into(),
        })
    }

    /// Uploads `source` and downloads the compressed result.
    pub async fn shrink(&self, source: Vec<u8>) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(TINIFY_USER, Some(self.credential.expose()))
            .body(source)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, &body));
        }

        let output_url = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Network("response carried no output location".to_string()))?;
        debug!("Fetching compressed output from {}", output_url);

        let download = self
            .http
            .get(&output_url)
            .basic_auth(TINIFY_USER, Some(self.credential.expose()))
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = download.status();
        if !status.is_success() {
            let body = download.text().await.unwrap_or_default();
            return Err(classify_response(status, &body));
        }

        let bytes = download
            .bytes()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl RemoteCompressor for TinifyClient {
    fn compress(&self, source: &[u8]) -> Result<Vec<u8>, RemoteError> {
        self.runtime.block_on(self.shrink(source.to_vec()))
    }
}
