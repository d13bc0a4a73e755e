//! Artifact downloads

use crate::error::{SparkleError, SparkleResult};
use crate::ui::{DownloadProgress, UiContext};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Some release hosts reject requests without a browser-like agent
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// One file to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub dest: PathBuf,
    /// Expected SHA-256, lowercase hex
    pub sha256: Option<String>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, digest: Option<&str>) -> Self {
        self.sha256 = digest.map(str::to_lowercase);
        self
    }

    /// Last path segment of the URL
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

/// Network seam of the resolver
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `request.url` to `request.dest`, verifying the digest if one is given
    async fn fetch(&self, request: &DownloadRequest) -> SparkleResult<()>;
}

/// Blocking HTTP client run on the blocking pool, with bounded retries
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    ui: UiContext,
    attempts: u32,
    delay: Duration,
}

impl HttpFetcher {
    pub fn new(ui: UiContext) -> Self {
        Self {
            ui,
            attempts: MAX_ATTEMPTS,
            delay: RETRY_DELAY,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &DownloadRequest) -> SparkleResult<()> {
        info!("Downloading {} to {}", request.url, request.dest.display());

        if let Some(parent) = request.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SparkleError::io(format!("creating {}", parent.display()), e))?;
        }

        let partial = partial_path(&request.dest);
        let mut attempt = 1;
        loop {
            let url = request.url.clone();
            let target = partial.clone();
            let ui = self.ui.clone();
            let label = request.file_name().to_string();

            let result = tokio::task::spawn_blocking(move || download_blocking(&url, &target, &ui, &label))
                .await
                .map_err(|e| SparkleError::Internal(format!("download task failed: {}", e)))?;

            match result {
                Ok(()) => break,
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    warn!("Download attempt {}/{} failed: {}", attempt, self.attempts, e);
                    attempt += 1;
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&partial).await;
                    return Err(e);
                }
            }
        }

        if let Some(ref expected) = request.sha256 {
            let actual = sha256_file(&partial).await?;
            if &actual != expected {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(SparkleError::ChecksumMismatch {
                    path: request.dest.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!("Checksum verified for {}", request.dest.display());
        }

        tokio::fs::rename(&partial, &request.dest)
            .await
            .map_err(|e| SparkleError::io(format!("finalizing {}", request.dest.display()), e))
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn download_blocking(url: &str, target: &Path, ui: &UiContext, label: &str) -> SparkleResult<()> {
    let download_err = |reason: String| SparkleError::Download {
        url: url.to_string(),
        reason,
    };

    let response = match ureq::get(url).header("User-Agent", USER_AGENT).call() {
        Ok(response) => response,
        Err(ureq::Error::StatusCode(403)) => {
            return Err(download_err(
                "HTTP 403 Forbidden: the download URL may have changed or requires authentication".to_string(),
            ))
        }
        Err(ureq::Error::StatusCode(code)) => return Err(download_err(format!("HTTP {}", code))),
        Err(e) => return Err(download_err(e.to_string())),
    };

    let progress = DownloadProgress::new(ui, label);
    if let Some(total) = response.body().content_length() {
        progress.set_length(total);
    }

    let mut reader = response.into_body().into_reader();
    let mut file = File::create(target).map_err(|e| SparkleError::io(format!("creating {}", target.display()), e))?;
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                progress.reset();
                return Err(download_err(e.to_string()));
            }
        };
        file.write_all(&buffer[..n])
            .map_err(|e| SparkleError::io(format!("writing {}", target.display()), e))?;
        progress.advance(n as u64);
    }

    file.flush()
        .map_err(|e| SparkleError::io(format!("writing {}", target.display()), e))?;
    progress.finish();
    Ok(())
}

/// Hex SHA-256 of a file
pub async fn sha256_file(path: &Path) -> SparkleResult<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = File::open(&path).map_err(|e| SparkleError::io(format!("reading {}", path.display()), e))?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher).map_err(|e| SparkleError::io(format!("hashing {}", path.display()), e))?;
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| SparkleError::Internal(format!("hash task failed: {}", e)))?
}
