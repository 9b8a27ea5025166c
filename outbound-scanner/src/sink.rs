use crate::error::{Result, ScanError};
use crate::extract::has_line_break;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_OUTPUT_FILE: &str = "external_links.txt";

/// Append-only, line-per-link destination for external links.
///
/// The file is opened in append mode for the lifetime of the handle, so
/// existing content from earlier runs is kept. Each link is written as one
/// `write_all` under a lock; concurrent writers never interleave lines.
pub struct ExternalLinkSink {
    path: PathBuf,
    file: Mutex<File>,
    written: AtomicUsize,
}

impl ExternalLinkSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        debug!("Appending external links to {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
            written: AtomicUsize::new(0),
        })
    }

    /// Append `link` as one line. A link containing CR or LF is refused,
    /// since it would split into more than one record.
    pub async fn persist(&self, link: &str) -> Result<()> {
        if has_line_break(link) {
            return Err(ScanError::MalformedUrl(link.escape_debug().to_string()));
        }

        let line = format!("{}\n", link);

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Lines written through this handle (not counting pre-existing content).
    pub fn written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and sync to disk, consuming the handle.
    pub async fn close(self) -> Result<()> {
        let mut file = self.file.into_inner();
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}
