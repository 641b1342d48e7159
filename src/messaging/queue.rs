//! # Job Queue Abstraction
//!
//! At-least-once delivery contract consumed by the worker runtime. A received
//! message stays in flight until it is completed, abandoned (made visible
//! again for redelivery) or dead-lettered. Each receive increments the
//! message's dequeue count.

use super::errors::{QueueError, QueueResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// A delivered queue message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub body: Vec<u8>,
    /// Number of times this message has been delivered, including this one
    pub dequeue_count: u32,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Take the next visible message, if any
    async fn receive(&self) -> QueueResult<Option<QueueMessage>>;

    /// Acknowledge successful processing
    async fn complete(&self, message: &QueueMessage) -> QueueResult<()>;

    /// Return the message to the queue for redelivery
    async fn abandon(&self, message: &QueueMessage) -> QueueResult<()>;

    /// Remove the message permanently, recording why
    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> QueueResult<()>;
}

/// A message removed by [`JobQueue::dead_letter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub message: QueueMessage,
    pub reason: String,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<QueueMessage>,
    inflight: HashMap<String, QueueMessage>,
    completed: Vec<String>,
    dead_letters: Vec<DeadLetter>,
}

/// Process-local queue, used in tests and embedded setups
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its id
    pub fn enqueue(&self, body: impl Into<Vec<u8>>) -> String {
        let id = Uuid::new_v4().to_string();
        self.state.lock().pending.push_back(QueueMessage {
            id: id.clone(),
            body: body.into(),
            dequeue_count: 0,
        });
        id
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn inflight_len(&self) -> usize {
        self.state.lock().inflight.len()
    }

    pub fn completed(&self) -> Vec<String> {
        self.state.lock().completed.clone()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().dead_letters.clone()
    }

    fn take_inflight(state: &mut QueueState, message: &QueueMessage) -> QueueResult<QueueMessage> {
        state
            .inflight
            .remove(&message.id)
            .ok_or_else(|| QueueError::unknown_message(&message.id))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn receive(&self) -> QueueResult<Option<QueueMessage>> {
        let mut state = self.state.lock();
        let Some(mut message) = state.pending.pop_front() else {
            return Ok(None);
        };
        message.dequeue_count += 1;
        state.inflight.insert(message.id.clone(), message.clone());
        Ok(Some(message))
    }

    async fn complete(&self, message: &QueueMessage) -> QueueResult<()> {
        let mut state = self.state.lock();
        let done = Self::take_inflight(&mut state, message)?;
        state.completed.push(done.id);
        Ok(())
    }

    async fn abandon(&self, message: &QueueMessage) -> QueueResult<()> {
        let mut state = self.state.lock();
        let returned = Self::take_inflight(&mut state, message)?;
        state.pending.push_back(returned);
        Ok(())
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> QueueResult<()> {
        let mut state = self.state.lock();
        let dead = Self::take_inflight(&mut state, message)?;
        state.dead_letters.push(DeadLetter {
            message: dead,
            reason: reason.to_string(),
        });
        Ok(())
    }
}
