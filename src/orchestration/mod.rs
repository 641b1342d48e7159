//! # Job Orchestration
//!
//! The end-to-end sequence of one job: descriptor parsing, workspace
//! lifecycle, fetch, decode, validation, artifact materialization and
//! publication under a run-scoped prefix.

pub mod orchestrator;
pub mod types;
pub mod workspace;

pub use orchestrator::JobOrchestrator;
pub use types::{PublishedArtifact, RunContext, RunReport};
pub use workspace::Workspace;
