//! Shared append-only output file
//!
//! Every worker appends through one [`OutputSink`]. Each record goes out as a
//! single write of `line + '\n'` under a lock, so lines never interleave.

use enrich_common::Result;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl OutputSink {
    /// Open `path` for appending, creating it if needed. Existing content is
    /// kept.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append one record line.
    pub async fn append_line(&self, line: &str) -> Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
