// src/store/mod.rs
//! Durable pipeline state: processed ids, the reason log and dedup.
//!
//! Single-writer invariant: exactly one pipeline process owns a state dir at a
//! time. Within the process all writes are serialized.

pub mod dedup;
pub mod processed;

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

pub use dedup::{DedupFilter, DedupVerdict};
pub use processed::{StateStore, TerminalRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("corrupt state file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("writing {path} failed after {attempts} attempt(s): {source}")]
    Write {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },
}

/// Write `bytes` to `path` via a sibling temp file + rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut f = tokio::fs::File::create(&tmp).await?;
    f.write_all(bytes).await?;
    f.sync_all().await?;
    drop(f);
    tokio::fs::rename(&tmp, path).await
}

/// Append one line, creating the file (and parents) when missing.
pub(crate) async fn append_line(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut f = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    f.write_all(buf.as_bytes()).await?;
    f.sync_data().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested").join("index.json");
        write_atomic(&p, b"{\"a\":1}").await.unwrap();
        write_atomic(&p, b"{\"a\":2}").await.unwrap();
        assert_eq!(std::fs::read_to_string(&p).unwrap(), "{\"a\":2}");
        assert!(!dir.path().join("nested").join("index.json.tmp").exists());
    }
}
