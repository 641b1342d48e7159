//! # Queue Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Message not in flight: {message_id}")]
    UnknownMessage { message_id: String },

    #[error("Queue I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl QueueError {
    pub fn unknown_message(message_id: impl Into<String>) -> Self {
        Self::UnknownMessage {
            message_id: message_id.into(),
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
