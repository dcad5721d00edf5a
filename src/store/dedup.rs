// src/store/dedup.rs
//! Duplicate detection by identity and by content.
//!
//! Identity: the candidate id against the processed set and ids accepted
//! earlier in this run. Content: normalized title + image URL against the
//! published site index and candidates accepted earlier in this run. A content
//! match that carries the candidate's own id is not a duplicate, so a crash
//! between publishing and recording the terminal state replays cleanly.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use super::StateStore;
use crate::candidate::Candidate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupVerdict {
    Unique,
    DuplicateIdentity,
    DuplicateContent { existing_id: String },
}

impl DedupVerdict {
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, DedupVerdict::Unique)
    }
}

#[derive(Default)]
struct RunState {
    accepted_ids: HashSet<String>,
    /// content fingerprint → id that owns it
    content: HashMap<String, String>,
}

pub struct DedupFilter {
    store: Arc<StateStore>,
    state: Mutex<RunState>,
}

impl DedupFilter {
    /// `history` is `(content_fingerprint, id)` for every already published article.
    pub fn new(store: Arc<StateStore>, history: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut st = RunState::default();
        for (fp, id) in history {
            st.content.entry(fp).or_insert(id);
        }
        Self {
            store,
            state: Mutex::new(st),
        }
    }

    /// Check and, when unique, reserve the candidate's identity and content in
    /// one critical section.
    pub fn check_and_accept(&self, c: &Candidate) -> DedupVerdict {
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let verdict = self.verdict(&st, c);
        if verdict == DedupVerdict::Unique {
            st.accepted_ids.insert(c.id.clone());
            if let Some(fp) = c.content_fingerprint() {
                st.content.entry(fp).or_insert_with(|| c.id.clone());
            }
        }
        verdict
    }

    fn verdict(&self, st: &RunState, c: &Candidate) -> DedupVerdict {
        if self.store.exists(&c.id) || st.accepted_ids.contains(&c.id) {
            return DedupVerdict::DuplicateIdentity;
        }
        if let Some(fp) = c.content_fingerprint() {
            if let Some(owner) = st.content.get(&fp) {
                if owner != &c.id {
                    return DedupVerdict::DuplicateContent {
                        existing_id: owner.clone(),
                    };
                }
            }
        }
        DedupVerdict::Unique
    }
}
