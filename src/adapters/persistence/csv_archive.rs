//! Append-only CSV log of fetched posts. Uses the `csv` crate for quoting.
//!
//! Format: `id;author;timestamp;text;media` (semicolon-delimited, one header row).

use crate::domain::{DomainError, Post};
use crate::ports::ArchivePort;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub struct CsvArchive {
    path: PathBuf,
}

impl CsvArchive {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// Serialize posts to CSV rows, with the header when `header` is set.
pub fn posts_to_csv(posts: &[Post], header: bool) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_writer(Vec::new());

    if header {
        wtr.write_record(["id", "author", "timestamp", "text", "media"])?;
    }

    for post in posts {
        // Newlines are flattened so each post stays on one line.
        let clean_text = post.text.replace('\n', " ").replace('\r', "");
        let media = post
            .media_refs
            .iter()
            .map(|m| m.url.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        wtr.write_record([
            post.id.as_str(),
            post.author.as_str(),
            &post.timestamp.to_rfc3339(),
            &clean_text,
            &media,
        ])?;
    }

    wtr.flush()?;
    wtr.into_inner()
        .map_err(|e| csv::Error::from(std::io::Error::other(e.to_string())))
}

#[async_trait::async_trait]
impl ArchivePort for CsvArchive {
    async fn append(&self, posts: &[Post]) -> Result<(), DomainError> {
        if posts.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::State(format!("create archive dir: {}", e)))?;
        }
        let is_new = fs::metadata(&self.path)
            .await
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let bytes = posts_to_csv(posts, is_new)
            .map_err(|e| DomainError::State(format!("archive CSV: {}", e)))?;

        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DomainError::State(format!("open archive: {}", e)))?;
        f.write_all(&bytes)
            .await
            .map_err(|e| DomainError::State(format!("write archive: {}", e)))?;
        f.flush()
            .await
            .map_err(|e| DomainError::State(format!("flush archive: {}", e)))?;

        debug!(path = %self.path.display(), rows = posts.len(), "archived fetched posts");
        Ok(())
    }
}
