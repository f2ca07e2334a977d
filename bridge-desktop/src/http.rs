//! Media Downloader Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    MediaDownloader, TempFile,
};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

/// Large media can take a long time to transfer
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Retry behavior for transient server failures (5xx, 429)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for DownloadRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl DownloadRetryPolicy {
    /// Exponential backoff before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Reqwest-based media downloader
///
/// Streams response bodies straight to disk so large files never sit in
/// memory. Each download lands in its own uniquely prefixed file inside the
/// temp directory.
pub struct ReqwestMediaDownloader {
    client: Client,
    temp_dir: PathBuf,
    retry: DownloadRetryPolicy,
}

impl ReqwestMediaDownloader {
    /// Create a downloader writing into the system temp directory
    pub fn new() -> Result<Self> {
        Self::with_temp_dir(std::env::temp_dir())
    }

    /// Create a downloader writing into `temp_dir`
    pub fn with_temp_dir(temp_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("content-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client, temp_dir))
    }

    /// Create a downloader around a preconfigured client
    pub fn with_client(client: Client, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            temp_dir: temp_dir.into(),
            retry: DownloadRetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: DownloadRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn temp_path(&self, file_name: &str) -> PathBuf {
        self.temp_dir
            .join(format!("{}_{}", Uuid::new_v4().simple(), file_name))
    }

    /// Send a GET, retrying transient failures
    async fn fetch(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.retry.max_attempts {
            debug!(attempt = attempt + 1, url, "Requesting media");

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if !status.is_server_error() && status.as_u16() != 429 {
                        return Err(BridgeError::OperationFailed(format!(
                            "HTTP {} for {}",
                            status.as_u16(),
                            url
                        )));
                    }

                    warn!(
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        "Media request failed with retryable status"
                    );
                    last_error = Some(BridgeError::OperationFailed(format!(
                        "HTTP {} for {}",
                        status.as_u16(),
                        url
                    )));
                }
                Err(e) if e.is_builder() => {
                    return Err(BridgeError::OperationFailed(format!(
                        "Invalid media URL {}: {}",
                        url, e
                    )));
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempt + 1, "Media request failed");
                    last_error = Some(if e.is_timeout() {
                        BridgeError::OperationFailed("Request timed out".to_string())
                    } else {
                        BridgeError::OperationFailed(e.to_string())
                    });
                }
            }

            attempt += 1;
            if attempt < self.retry.max_attempts {
                let delay = self.retry.delay(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

#[async_trait]
impl MediaDownloader for ReqwestMediaDownloader {
    async fn download_to_temp(&self, url: &str, file_name: &str) -> Result<TempFile> {
        let response = self.fetch(url).await?;

        let name = safe_file_name(file_name);
        let path = self.temp_path(&name);

        match stream_to_file(response, &path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, "Downloaded media");
                Ok(TempFile { path, name })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    debug!(path = %path.display(), "No partial download to remove: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    async fn discard(&self, file: &TempFile) -> Result<()> {
        match fs::remove_file(&file.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }
}

async fn stream_to_file(response: Response, path: &Path) -> Result<u64> {
    let mut file = fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk
            .map_err(|e| BridgeError::OperationFailed(format!("Download interrupted: {}", e)))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

/// File name safe to create on any desktop filesystem
fn safe_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}
