// src/queue.rs
//! Directory queue of candidate JSON files written by upstream producers
//! (scrapers, user picks).
//!
//! Layout: `<queue>/*.json` pending, `<queue>/invalid/` unparseable files,
//! `<queue>/archive/<id>.json` terminal candidates with their stage results.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::candidate::{identity_fingerprint, Candidate};
use crate::store::write_atomic;

pub const INVALID_DIR: &str = "invalid";
pub const ARCHIVE_DIR: &str = "archive";

/// A pending candidate and the file it came from.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub path: PathBuf,
    pub candidate: Candidate,
}

pub struct CandidateQueue {
    dir: PathBuf,
}

impl CandidateQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive_path(&self, id: &str) -> PathBuf {
        self.dir.join(ARCHIVE_DIR).join(format!("{id}.json"))
    }

    /// Pending candidates, oldest `discovered_at` first (id breaks ties).
    /// Files that do not parse are moved to `invalid/`.
    pub async fn load(&self) -> io::Result<Vec<QueueEntry>> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut entries = Vec::new();
        let mut rd = tokio::fs::read_dir(&self.dir).await?;
        while let Some(de) = rd.next_entry().await? {
            let path = de.path();
            if !de.file_type().await?.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Candidate>(&raw) {
                Ok(mut c) => {
                    if c.id.trim().is_empty() {
                        c.id = identity_fingerprint(
                            c.external_id.as_deref(),
                            &c.link,
                            &c.title,
                            &c.text,
                        );
                    }
                    entries.push(QueueEntry { path, candidate: c });
                }
                Err(e) => {
                    warn!(target: "pipeline", file = %path.display(), error = %e, "invalid candidate file");
                    self.quarantine(&path).await?;
                }
            }
        }
        entries.sort_by(|a, b| {
            a.candidate
                .discovered_at
                .cmp(&b.candidate.discovered_at)
                .then_with(|| a.candidate.id.cmp(&b.candidate.id))
        });
        debug!(target: "pipeline", pending = entries.len(), "queue loaded");
        Ok(entries)
    }

    /// Write a new pending candidate as `<id>.json`.
    pub async fn enqueue(&self, c: &Candidate) -> io::Result<PathBuf> {
        let path = self.dir.join(format!("{}.json", c.id));
        let bytes = serde_json::to_vec_pretty(c)?;
        write_atomic(&path, &bytes).await?;
        Ok(path)
    }

    /// Persist in-flight progress (stage results, status) over the pending file.
    pub async fn save_progress(&self, entry_path: &Path, c: &Candidate) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(c)?;
        write_atomic(entry_path, &bytes).await
    }

    /// Move a terminal candidate to `archive/<id>.json`.
    pub async fn archive(&self, entry_path: &Path, c: &Candidate) -> io::Result<PathBuf> {
        let dest = self.archive_path(&c.id);
        let bytes = serde_json::to_vec_pretty(c)?;
        write_atomic(&dest, &bytes).await?;
        match tokio::fs::remove_file(entry_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok(dest)
    }

    /// Drop a pending file without archiving it.
    pub async fn discard(&self, entry_path: &Path) -> io::Result<()> {
        match tokio::fs::remove_file(entry_path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    async fn quarantine(&self, path: &Path) -> io::Result<()> {
        let dir = self.dir.join(INVALID_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tokio::fs::rename(path, dir.join(name)).await
    }
}
