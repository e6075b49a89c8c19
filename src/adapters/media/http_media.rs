//! Implements MediaPort: downloads post attachments over HTTP into the media directory.

use crate::domain::{MediaError, MediaRef};
use crate::ports::MediaPort;
use crate::shared::retry::{RetryPolicy, retry_transient};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4", "mov"];

pub struct HttpMedia {
    client: reqwest::Client,
    dir: PathBuf,
    retry: RetryPolicy,
}

impl HttpMedia {
    pub fn new(dir: impl AsRef<Path>, timeout: Duration) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Network(format!("media HTTP client: {}", e)))?;
        Ok(Self {
            client,
            dir: dir.as_ref().to_path_buf(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), MediaError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MediaError::Timeout
            } else {
                MediaError::Network(format!("GET {}: {}", url, e))
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(if status.is_server_error() {
                MediaError::Network(format!("GET {}: {}", url, status))
            } else {
                MediaError::Rejected(format!("GET {}: {}", url, status))
            });
        }
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                MediaError::Timeout
            } else {
                MediaError::Network(format!("read body {}: {}", url, e))
            }
        })?;

        // Write next to the target and rename, so a partial download is never reused.
        let part = dest.with_extension("part");
        let mut f = fs::File::create(&part)
            .await
            .map_err(|e| MediaError::Io(format!("create {}: {}", part.display(), e)))?;
        f.write_all(&bytes)
            .await
            .map_err(|e| MediaError::Io(format!("write {}: {}", part.display(), e)))?;
        f.sync_all()
            .await
            .map_err(|e| MediaError::Io(format!("sync {}: {}", part.display(), e)))?;
        drop(f);
        fs::rename(&part, dest)
            .await
            .map_err(|e| MediaError::Io(format!("rename {}: {}", dest.display(), e)))
    }
}

/// Lowercased file extension of a URL path, ignoring query and fragment.
pub fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

pub fn is_supported(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext)
}

#[async_trait::async_trait]
impl MediaPort for HttpMedia {
    async fn download(&self, post_id: &str, refs: &[MediaRef]) -> Result<Vec<PathBuf>, MediaError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MediaError::Io(format!("create {}: {}", self.dir.display(), e)))?;

        let mut files = Vec::new();
        let mut unsupported = Vec::new();
        for (i, media) in refs.iter().enumerate() {
            let ext = url_extension(&media.url).unwrap_or_default();
            if !is_supported(&ext) {
                warn!(url = %media.url, ext = %ext, "unsupported media type, skipping");
                unsupported.push(ext);
                continue;
            }
            let dest = self.dir.join(format!("post_{}_media_{}.{}", post_id, i, ext));
            if fs::try_exists(&dest).await.unwrap_or(false) {
                debug!(path = %dest.display(), "media already downloaded");
                files.push(dest);
                continue;
            }
            retry_transient(self.retry, "media", || self.fetch_to(&media.url, &dest)).await?;
            info!(path = %dest.display(), kind = ?media.kind, "downloaded media");
            files.push(dest);
        }

        if files.is_empty() && !unsupported.is_empty() {
            return Err(MediaError::UnsupportedFormat(unsupported.join(",")));
        }
        Ok(files)
    }

    async fn purge_older_than(&self, age: Duration) -> Result<usize, MediaError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(MediaError::Io(format!("read {}: {}", self.dir.display(), e))),
        };
        let cutoff = SystemTime::now()
            .checked_sub(age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MediaError::Io(format!("read {}: {}", self.dir.display(), e)))?
        {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            let old = meta.modified().map(|m| m < cutoff).unwrap_or(false);
            if meta.is_file() && old {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %entry.path().display(), error = %e, "failed to remove old media"),
                }
            }
        }
        if removed > 0 {
            info!(removed, "cleaned up old media files");
        }
        Ok(removed)
    }
}
