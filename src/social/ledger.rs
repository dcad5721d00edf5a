// src/social/ledger.rs
//! `{"posted_articles": [id, ...]}`: ids that were offered to social platforms.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::{write_atomic, StoreError};

pub const LEDGER_FILE: &str = "social_ledger.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    posted_articles: Vec<String>,
}

pub struct SocialLedger {
    path: PathBuf,
    state: tokio::sync::Mutex<LedgerFile>,
}

impl SocialLedger {
    pub async fn open(state_dir: &Path) -> Result<Self, StoreError> {
        let path = state_dir.join(LEDGER_FILE);
        let file = match tokio::fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => LedgerFile::default(),
            Ok(s) => serde_json::from_str(&s).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => LedgerFile::default(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Self {
            path,
            state: tokio::sync::Mutex::new(file),
        })
    }

    pub async fn is_offered(&self, id: &str) -> bool {
        self.state
            .lock()
            .await
            .posted_articles
            .iter()
            .any(|p| p == id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.posted_articles.len()
    }

    /// Persist the claim for `id`. `Ok(false)` when it was claimed before.
    pub async fn claim(&self, id: &str) -> Result<bool, StoreError> {
        let mut st = self.state.lock().await;
        if st.posted_articles.iter().any(|p| p == id) {
            return Ok(false);
        }
        st.posted_articles.push(id.to_string());
        let bytes = serde_json::to_vec_pretty(&*st).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        if let Err(source) = write_atomic(&self.path, &bytes).await {
            st.posted_articles.pop();
            return Err(StoreError::Write {
                path: self.path.clone(),
                attempts: 1,
                source,
            });
        }
        Ok(true)
    }
}
