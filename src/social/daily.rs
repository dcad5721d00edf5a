// src/social/daily.rs
//! Per-platform daily post caps (`social_daily.json`), reset at UTC midnight.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::write_atomic;

pub const DAILY_FILE: &str = "social_daily.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DailyCounts {
    date: String,
    #[serde(default)]
    counts: BTreeMap<String, u32>,
    #[serde(skip)]
    saturated: bool,
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

pub struct DailyCaps {
    path: PathBuf,
    cap: u32,
    state: tokio::sync::Mutex<DailyCounts>,
}

impl DailyCaps {
    /// A missing file starts today from zero. A corrupt one is logged and
    /// replaced. A file that exists but cannot be read leaves today's count
    /// unknown, so every platform counts as capped until the next UTC day.
    pub async fn open(state_dir: &Path, cap: u32) -> Self {
        let path = state_dir.join(DAILY_FILE);
        let counts = match tokio::fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(target: "social", error = %e, "daily counter corrupt; starting fresh");
                DailyCounts::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => DailyCounts::default(),
            Err(e) => {
                tracing::warn!(
                    target: "social",
                    path = %path.display(),
                    error = %e,
                    "daily counter unreadable; holding social posts until tomorrow"
                );
                DailyCounts {
                    date: today(),
                    counts: BTreeMap::new(),
                    saturated: true,
                }
            }
        };
        Self {
            path,
            cap,
            state: tokio::sync::Mutex::new(counts),
        }
    }

    /// Take one slot for `platform` if today's cap allows it.
    pub async fn try_take(&self, platform: &str) -> bool {
        let mut st = self.state.lock().await;
        let today = today();
        if st.date != today {
            st.date = today;
            st.counts.clear();
            st.saturated = false;
        }
        if st.saturated {
            return false;
        }
        let used = st.counts.entry(platform.to_string()).or_insert(0);
        if *used >= self.cap {
            return false;
        }
        *used += 1;

        match serde_json::to_vec(&*st) {
            Ok(bytes) => {
                if let Err(e) = write_atomic(&self.path, &bytes).await {
                    tracing::warn!(target: "social", error = %e, "cannot persist daily counter");
                }
            }
            Err(e) => tracing::warn!(target: "social", error = %e, "cannot encode daily counter"),
        }
        true
    }

    pub async fn used(&self, platform: &str) -> u32 {
        let st = self.state.lock().await;
        if st.date != today() {
            return 0;
        }
        st.counts.get(platform).copied().unwrap_or(0)
    }
}
