#![allow(clippy::doc_markdown)] // Allow technical terms like JSON, CSV in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Validator Worker
//!
//! Queue-triggered worker that validates uploaded tabular data files and
//! publishes the results of each run to an object store.
//!
//! ## Overview
//!
//! A job message names an uploaded object and a validation profile. For each
//! message the [`JobOrchestrator`] fetches the object into a scoped local
//! workspace, decodes it, runs the validation engine with auto-merge, writes
//! the run's artifacts and publishes them under `{run_id}/` in the output
//! container. The workspace is removed on every exit path.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Job descriptors and the queue abstraction
//! - [`orchestration`] - Per-job phase sequencing and workspaces
//! - [`storage`] - Object store trait with local and in-memory backends
//! - [`table`] - Input decoding (CSV, TSV, JSON records)
//! - [`validation`] - Validation engine trait and the YAML rules engine
//! - [`artifacts`] - Artifact naming and the standard writers
//! - [`worker`] - Queue consumption runtime and bootstrap
//! - [`config`] - Layered configuration loading
//! - [`error`] - Phase-tagged job errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use validator_worker::config::ConfigLoader;
//! use validator_worker::worker::bootstrap_worker;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//! let runtime = bootstrap_worker(config).await?;
//! runtime.run_until(tokio::signal::ctrl_c()).await?;
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod orchestration;
pub mod storage;
pub mod table;
pub mod validation;
pub mod worker;

pub use config::{ConfigLoader, WorkerConfig};
pub use error::{ErrorCategory, JobError, JobPhase, Result};
pub use messaging::JobDescriptor;
pub use orchestration::{JobOrchestrator, RunReport};
pub use worker::{bootstrap_worker, MessageOutcome, WorkerRuntime};
