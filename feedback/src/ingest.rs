//! Synchronous ingestion boundary.
//!
//! Validates an event, checks that both ids are known, and enqueues it. The
//! profile update happens later on a worker, so accepting feedback never
//! waits on the update path.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use insight_ranking::{ContentCatalog, ProfileStore};

use crate::error::{FeedbackError, Result};
use crate::event::{FeedbackReceipt, FeedbackRequest};
use crate::queue::FeedbackQueue;

/// Accepts feedback requests and hands them to the worker queue.
#[derive(Clone)]
pub struct IngestionService {
    queue: FeedbackQueue,
    profiles: Arc<dyn ProfileStore>,
    catalog: Arc<dyn ContentCatalog>,
}

impl IngestionService {
    /// Create a service enqueueing onto `queue`.
    pub fn new(
        queue: FeedbackQueue,
        profiles: Arc<dyn ProfileStore>,
        catalog: Arc<dyn ContentCatalog>,
    ) -> Self {
        Self {
            queue,
            profiles,
            catalog,
        }
    }

    /// Validate and enqueue one request.
    ///
    /// Validation and unknown-id failures are permanent and nothing is
    /// queued; [`FeedbackError::QueueUnavailable`] is safe to retry.
    pub async fn submit(&self, request: FeedbackRequest) -> Result<FeedbackReceipt> {
        let event = request.validate(Utc::now()).inspect_err(|e| {
            debug!("rejected feedback request: {e}");
        })?;

        if !self.catalog.contains(&event.content_id).await? {
            return Err(FeedbackError::ContentNotFound(event.content_id));
        }
        if self.profiles.read(&event.user_id).await?.is_none() {
            return Err(FeedbackError::UserNotFound(event.user_id));
        }

        let receipt = FeedbackReceipt::accepted(&event);
        let feedback_id = event.feedback_id;
        let partition = self.queue.enqueue(event).await.inspect_err(|e| {
            warn!(%feedback_id, "could not enqueue feedback: {e}");
        })?;

        debug!(%feedback_id, partition, "feedback accepted");
        Ok(receipt)
    }
}
