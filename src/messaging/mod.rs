//! # Messaging Module
//!
//! Queue-facing types: the job message payload, the at-least-once
//! [`JobQueue`] contract and its in-memory and spool-directory backends.

pub mod directory_queue;
pub mod errors;
pub mod job;
pub mod queue;

pub use directory_queue::DirectoryQueue;
pub use errors::{QueueError, QueueResult};
pub use job::JobDescriptor;
pub use queue::{DeadLetter, InMemoryJobQueue, JobQueue, QueueMessage};
