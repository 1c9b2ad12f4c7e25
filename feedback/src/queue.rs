//! Partitioned in-process feedback queue.
//!
//! Every event for a user hashes to the same partition, and each partition
//! has exactly one consumer, so one user's events are applied in arrival
//! order while different users proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

use crate::error::{FeedbackError, Result};
use crate::event::FeedbackEvent;

/// Partition index for `user_id`.
pub fn partition_for(user_id: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    (hasher.finish() % partitions.max(1) as u64) as usize
}

/// Producer side of the queue. Cheap to clone.
#[derive(Clone)]
pub struct FeedbackQueue {
    senders: Arc<RwLock<Vec<mpsc::Sender<FeedbackEvent>>>>,
    partitions: usize,
}

impl FeedbackQueue {
    /// Create a queue with `partitions` bounded channels of `capacity` each.
    ///
    /// Returns the receivers in partition order.
    pub fn bounded(
        partitions: usize,
        capacity: usize,
    ) -> (Self, Vec<mpsc::Receiver<FeedbackEvent>>) {
        let partitions = partitions.max(1);
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..partitions)
            .map(|_| mpsc::channel(capacity.max(1)))
            .unzip();

        let queue = Self {
            senders: Arc::new(RwLock::new(senders)),
            partitions,
        };
        (queue, receivers)
    }

    /// Number of partitions.
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Enqueue without waiting. A full or closed partition is reported as
    /// [`FeedbackError::QueueUnavailable`].
    pub async fn enqueue(&self, event: FeedbackEvent) -> Result<usize> {
        let partition = partition_for(&event.user_id, self.partitions);
        let senders = self.senders.read().await;
        let sender = senders
            .get(partition)
            .ok_or_else(|| FeedbackError::QueueUnavailable("queue is shut down".to_string()))?;

        sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                FeedbackError::QueueUnavailable(format!("partition {partition} is full"))
            }
            mpsc::error::TrySendError::Closed(_) => {
                FeedbackError::QueueUnavailable(format!("partition {partition} is closed"))
            }
        })?;

        debug!(partition, "enqueued feedback event");
        Ok(partition)
    }

    /// Stop accepting events. Consumers drain what is already queued.
    pub async fn close(&self) {
        self.senders.write().await.clear();
        info!("Feedback queue closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub async fn is_closed(&self) -> bool {
        self.senders.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use insight_ranking::FeedbackType;
    use pretty_assertions::assert_eq;

    use crate::event::FeedbackRequest;

    fn event(user_id: &str) -> FeedbackEvent {
        FeedbackRequest::new("c1", user_id, FeedbackType::Like)
            .validate(Utc::now())
            .unwrap()
    }

    #[test]
    fn test_partition_is_stable() {
        for user in ["alice", "bob", "carol"] {
            let p = partition_for(user, 4);
            assert!(p < 4);
            assert_eq!(partition_for(user, 4), p);
        }
        assert_eq!(partition_for("anyone", 1), 0);
    }

    #[tokio::test]
    async fn test_same_user_same_partition_in_order() {
        let (queue, mut receivers) = FeedbackQueue::bounded(4, 16);
        let first = event("alice");
        let second = event("alice");

        let p1 = queue.enqueue(first.clone()).await.unwrap();
        let p2 = queue.enqueue(second.clone()).await.unwrap();
        assert_eq!(p1, p2);

        let rx = &mut receivers[p1];
        assert_eq!(rx.recv().await.unwrap().feedback_id, first.feedback_id);
        assert_eq!(rx.recv().await.unwrap().feedback_id, second.feedback_id);
    }

    #[tokio::test]
    async fn test_full_partition_is_unavailable() {
        let (queue, _receivers) = FeedbackQueue::bounded(1, 1);
        queue.enqueue(event("alice")).await.unwrap();

        let err = queue.enqueue(event("alice")).await.unwrap_err();
        assert!(matches!(err, FeedbackError::QueueUnavailable(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_and_drains() {
        let (queue, mut receivers) = FeedbackQueue::bounded(1, 4);
        queue.enqueue(event("alice")).await.unwrap();
        queue.close().await;

        assert!(queue.is_closed().await);
        assert!(matches!(
            queue.enqueue(event("alice")).await,
            Err(FeedbackError::QueueUnavailable(_))
        ));

        assert!(receivers[0].recv().await.is_some());
        assert!(receivers[0].recv().await.is_none());
    }
}
