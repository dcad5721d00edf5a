// src/error.rs
use std::io;
use std::path::PathBuf;

use crate::candidate::ResultsError;
use crate::publish::PublishError;
use crate::store::StoreError;

/// Errors that abort a run. Per-candidate business outcomes and exhausted
/// retries are not errors; they end up in the candidate status.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("state store: {0}")]
    Store(#[from] StoreError),
    #[error("publish: {0}")]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Results(#[from] ResultsError),
    #[error("queue {path}: {source}")]
    Queue {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
