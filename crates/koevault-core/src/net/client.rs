//! HTTP transport shared by catalog fetches and asset downloads.
//!
//! One pooled client pair behind a single type:
//! - an API client with a total request timeout, for small JSON payloads
//!   (master database files, scenario assets)
//! - a download client with only a connect timeout, for streaming audio
//!   bodies of unknown size
//!
//! Connections are reused across requests and HTTP/2 multiplexing is
//! negotiated where the server supports it.

use crate::config::NetworkConfig;
use crate::{KoevaultError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Anything that can fetch a remote asset into a local file.
///
/// The download scheduler is written against this seam so pooling and
/// failure isolation can be exercised without a network.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch `url` and write the body to `dest`. Returns bytes written.
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// Anything that can fetch a remote JSON document.
///
/// Returns an untyped value so the trait stays object safe; callers
/// deserialize into their own models.
#[async_trait]
pub trait JsonSource: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value>;
}

/// Pooled HTTP client with a fixed identifying `User-Agent`.
pub struct HttpClient {
    api: Client,
    download: Client,
}

impl HttpClient {
    /// Create a new HTTP client pair with default configuration.
    pub fn new() -> Result<Self> {
        let api = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| KoevaultError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: Some(e.to_string()),
            })?;

        // Separate client for downloads: connect timeout only, no total
        // timeout. A total timeout would kill long solo-track downloads;
        // the stream loop below surfaces per-chunk failures instead.
        let download = Client::builder()
            .connect_timeout(NetworkConfig::DOWNLOAD_CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| KoevaultError::Network {
                message: format!("Failed to create download HTTP client: {}", e),
                cause: Some(e.to_string()),
            })?;

        Ok(Self { api, download })
    }

    /// GET a JSON document and deserialize it.
    ///
    /// A non-2xx status is an error here: every JSON endpoint this crate
    /// talks to answers 200 with a body, so anything else means the
    /// resource is missing or the mirror is unhealthy.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);
        let response = self
            .api
            .get(url)
            .send()
            .await
            .map_err(|e| KoevaultError::Network {
                message: format!("GET {} failed: {}", url, e),
                cause: Some(e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KoevaultError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| KoevaultError::Network {
            message: format!("Error reading body of {}: {}", url, e),
            cause: Some(e.to_string()),
        })?;

        serde_json::from_str(&body).map_err(KoevaultError::from)
    }
}

#[async_trait]
impl JsonSource for HttpClient {
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value> {
        self.get_json(url).await
    }
}

#[async_trait]
impl AssetSource for HttpClient {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .download
            .get(url)
            .send()
            .await
            .map_err(|e| KoevaultError::Network {
                message: format!("GET {} failed: {}", url, e),
                cause: Some(e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KoevaultError::DownloadFailed {
                url: url.to_string(),
                message: format!("HTTP status {}", status),
            });
        }

        let mut file =
            std::fs::File::create(dest).map_err(|e| KoevaultError::io_with_path(e, dest))?;

        let mut bytes_written: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| KoevaultError::Network {
                message: format!("Error reading download stream: {}", e),
                cause: Some(e.to_string()),
            })?;

            file.write_all(&chunk)
                .map_err(|e| KoevaultError::io_with_path(e, dest))?;
            bytes_written += chunk.len() as u64;
        }

        file.flush()
            .map_err(|e| KoevaultError::io_with_path(e, dest))?;

        Ok(bytes_written)
    }
}
