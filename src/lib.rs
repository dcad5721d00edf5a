// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod ai;
pub mod candidate;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod publish;
pub mod queue;
pub mod retry;
pub mod schema;
pub mod social;
pub mod stages;
pub mod store;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::candidate::{Candidate, CandidateStatus, Importance, StageName};
pub use crate::config::PipelineConfig;
pub use crate::context::PipelineContext;
pub use crate::driver::{run_candidate, run_pass, RunSummary};
pub use crate::error::PipelineError;
