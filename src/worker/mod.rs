//! # Worker
//!
//! Queue consumption around the job orchestrator: bootstrap from
//! configuration and the runtime loop that settles messages.

pub mod bootstrap;
pub mod runtime;

pub use bootstrap::{bootstrap_worker, BootstrapError};
pub use runtime::{MessageOutcome, WorkerRuntime};
