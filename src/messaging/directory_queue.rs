//! Spool-directory queue.
//!
//! Layout under the queue root:
//!
//! ```text
//! pending/       visible messages, one JSON payload per file
//! inflight/      claimed messages
//! dead-letter/   dead-lettered payloads plus a `.reason` file each
//! meta/          per-message delivery counts
//! ```
//!
//! Claiming is a rename from `pending/` to `inflight/`, so concurrent
//! consumers never receive the same message twice. Messages left in
//! `inflight/` by a crashed process are returned by [`DirectoryQueue::recover`].

use super::errors::QueueResult;
use super::queue::{JobQueue, QueueMessage};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const PENDING: &str = "pending";
const INFLIGHT: &str = "inflight";
const DEAD_LETTER: &str = "dead-letter";
const META: &str = "meta";

#[derive(Debug, Default, Serialize, Deserialize)]
struct DeliveryMeta {
    dequeue_count: u32,
}

#[derive(Debug, Clone)]
pub struct DirectoryQueue {
    root: PathBuf,
}

impl DirectoryQueue {
    /// Open the queue, creating its directories
    pub async fn open(root: impl Into<PathBuf>) -> QueueResult<Self> {
        let queue = Self { root: root.into() };
        for dir in [PENDING, INFLIGHT, DEAD_LETTER, META] {
            tokio::fs::create_dir_all(queue.root.join(dir)).await?;
        }
        Ok(queue)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, dir: &str, id: &str) -> PathBuf {
        self.root.join(dir).join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.root.join(META).join(format!("{id}.json"))
    }

    /// Write a new pending message and return its id
    pub async fn enqueue(&self, body: &[u8]) -> QueueResult<String> {
        let id = format!(
            "{}-{}.json",
            Utc::now().format("%Y%m%d%H%M%S%3f"),
            Uuid::new_v4().simple()
        );
        // Stage outside pending/ so consumers never read a partial file
        let staging = self.path(INFLIGHT, &format!(".{id}.tmp"));
        tokio::fs::write(&staging, body).await?;
        tokio::fs::rename(&staging, self.path(PENDING, &id)).await?;
        Ok(id)
    }

    /// Move messages abandoned by a crashed consumer back to pending
    pub async fn recover(&self) -> QueueResult<usize> {
        let mut recovered = 0;
        for id in self.list(INFLIGHT).await? {
            tokio::fs::rename(self.path(INFLIGHT, &id), self.path(PENDING, &id)).await?;
            recovered += 1;
        }
        if recovered > 0 {
            warn!(recovered, queue = %self.root.display(), "Recovered in-flight messages");
        }
        Ok(recovered)
    }

    /// Sorted file names in one of the queue directories
    async fn list(&self, dir: &str) -> QueueResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(self.root.join(dir)).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Delivery count recorded for a message; an unreadable record counts as
    /// no prior deliveries
    async fn read_meta(&self, id: &str) -> QueueResult<DeliveryMeta> {
        match tokio::fs::read(self.meta_path(id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(message_id = %id, error = %e, "Discarding corrupt delivery metadata");
                DeliveryMeta::default()
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(DeliveryMeta::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_meta(&self, id: &str, meta: &DeliveryMeta) -> QueueResult<()> {
        let staging = self.root.join(META).join(format!(".{id}.tmp"));
        tokio::fs::write(&staging, serde_json::to_vec(meta)?).await?;
        tokio::fs::rename(&staging, self.meta_path(id)).await?;
        Ok(())
    }

    /// Count a delivery of a claimed message and read its body
    async fn deliver(&self, id: &str) -> QueueResult<QueueMessage> {
        let mut meta = self.read_meta(id).await?;
        meta.dequeue_count += 1;
        self.write_meta(id, &meta).await?;
        let body = tokio::fs::read(self.path(INFLIGHT, id)).await?;
        Ok(QueueMessage {
            id: id.to_string(),
            body,
            dequeue_count: meta.dequeue_count,
        })
    }

    async fn remove_meta(&self, id: &str) -> QueueResult<()> {
        match tokio::fs::remove_file(self.meta_path(id)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl JobQueue for DirectoryQueue {
    async fn receive(&self) -> QueueResult<Option<QueueMessage>> {
        for id in self.list(PENDING).await? {
            let claimed = self.path(INFLIGHT, &id);
            match tokio::fs::rename(self.path(PENDING, &id), &claimed).await {
                Ok(()) => {}
                // Another consumer claimed it first
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            return match self.deliver(&id).await {
                Ok(message) => {
                    debug!(message_id = %id, dequeue_count = message.dequeue_count, "Claimed message");
                    Ok(Some(message))
                }
                Err(e) => {
                    // Release the claim so the message stays visible
                    if let Err(rollback) = tokio::fs::rename(&claimed, self.path(PENDING, &id)).await {
                        warn!(message_id = %id, error = %rollback, "Failed to release claimed message");
                    }
                    Err(e)
                }
            };
        }
        Ok(None)
    }

    async fn complete(&self, message: &QueueMessage) -> QueueResult<()> {
        tokio::fs::remove_file(self.path(INFLIGHT, &message.id)).await?;
        self.remove_meta(&message.id).await
    }

    async fn abandon(&self, message: &QueueMessage) -> QueueResult<()> {
        tokio::fs::rename(
            self.path(INFLIGHT, &message.id),
            self.path(PENDING, &message.id),
        )
        .await?;
        Ok(())
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> QueueResult<()> {
        tokio::fs::rename(
            self.path(INFLIGHT, &message.id),
            self.path(DEAD_LETTER, &message.id),
        )
        .await?;
        tokio::fs::write(
            self.path(DEAD_LETTER, &format!("{}.reason", message.id)),
            reason,
        )
        .await?;
        self.remove_meta(&message.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_claim_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DirectoryQueue::open(dir.path()).await.unwrap();
        let first = queue.enqueue(b"one").await.unwrap();
        let _second = queue.enqueue(b"two").await.unwrap();

        let message = queue.receive().await.unwrap().unwrap();
        assert_eq!(message.id, first);
        assert_eq!(message.body, b"one");
        assert_eq!(message.dequeue_count, 1);

        queue.complete(&message).await.unwrap();
        assert!(!dir.path().join("inflight").join(&first).exists());
        assert!(!dir.path().join("meta").join(format!("{first}.json")).exists());
    }

    #[tokio::test]
    async fn test_abandon_counts_deliveries() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DirectoryQueue::open(dir.path()).await.unwrap();
        queue.enqueue(b"retry me").await.unwrap();

        let m = queue.receive().await.unwrap().unwrap();
        queue.abandon(&m).await.unwrap();
        let m = queue.receive().await.unwrap().unwrap();
        assert_eq!(m.dequeue_count, 2);
        assert!(queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dead_letter_records_reason() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DirectoryQueue::open(dir.path()).await.unwrap();
        let id = queue.enqueue(b"{}").await.unwrap();

        let m = queue.receive().await.unwrap().unwrap();
        queue.dead_letter(&m, "MALFORMED_JOB").await.unwrap();

        let dead = dir.path().join("dead-letter");
        assert!(dead.join(&id).is_file());
        let reason = std::fs::read_to_string(dead.join(format!("{id}.reason"))).unwrap();
        assert_eq!(reason, "MALFORMED_JOB");
    }

    #[tokio::test]
    async fn test_corrupt_delivery_meta_does_not_strand_message() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DirectoryQueue::open(dir.path()).await.unwrap();
        let id = queue.enqueue(b"payload").await.unwrap();
        let meta = dir.path().join("meta").join(format!("{id}.json"));
        std::fs::write(&meta, b"").unwrap();

        let message = queue.receive().await.unwrap().unwrap();
        assert_eq!(message.id, id);
        assert_eq!(message.body, b"payload");
        assert_eq!(message.dequeue_count, 1);
        assert_eq!(std::fs::read_dir(dir.path().join("pending")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("inflight")).unwrap().count(), 1);

        let rewritten: DeliveryMeta = serde_json::from_slice(&std::fs::read(&meta).unwrap()).unwrap();
        assert_eq!(rewritten.dequeue_count, 1);
        let staged = std::fs::read_dir(dir.path().join("meta"))
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().starts_with('.'))
            .count();
        assert_eq!(staged, 0);

        queue.complete(&message).await.unwrap();
        assert!(queue.receive().await.unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path().join("inflight")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_bookkeeping_releases_claim() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DirectoryQueue::open(dir.path()).await.unwrap();
        // A directory at the meta path makes reading it fail
        let id = queue.enqueue(b"payload").await.unwrap();
        std::fs::create_dir(dir.path().join("meta").join(format!("{id}.json"))).unwrap();

        assert!(queue.receive().await.is_err());
        assert!(dir.path().join("pending").join(&id).is_file());
        assert!(!dir.path().join("inflight").join(&id).exists());
    }

    #[tokio::test]
    async fn test_recover_returns_inflight_messages() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DirectoryQueue::open(dir.path()).await.unwrap();
        queue.enqueue(b"x").await.unwrap();
        let _claimed = queue.receive().await.unwrap().unwrap();

        let reopened = DirectoryQueue::open(dir.path()).await.unwrap();
        assert_eq!(reopened.recover().await.unwrap(), 1);
        let again = reopened.receive().await.unwrap().unwrap();
        assert_eq!(again.dequeue_count, 2);
    }
}
