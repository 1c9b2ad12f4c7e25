//! Feedback events as received and as queued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use insight_ranking::FeedbackType;

use crate::error::{FeedbackError, Result};

/// Request body of `POST /api/v1/feedback`.
///
/// `feedback_type` stays a string here so an unknown value is reported as a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// Item the feedback is about.
    pub content_id: String,

    /// User giving the feedback.
    pub user_id: String,

    /// One of the [`FeedbackType`] wire names.
    pub feedback_type: String,
}

impl FeedbackRequest {
    /// Create a request.
    pub fn new(
        content_id: impl Into<String>,
        user_id: impl Into<String>,
        feedback_type: FeedbackType,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            user_id: user_id.into(),
            feedback_type: feedback_type.as_str().to_string(),
        }
    }

    /// Check shape and enumeration membership, producing a queueable event.
    pub fn validate(self, received_at: DateTime<Utc>) -> Result<FeedbackEvent> {
        let content_id = self.content_id.trim();
        if content_id.is_empty() {
            return Err(FeedbackError::Validation(
                "content_id must not be empty".to_string(),
            ));
        }

        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(FeedbackError::Validation(
                "user_id must not be empty".to_string(),
            ));
        }

        let feedback_type = self
            .feedback_type
            .parse::<FeedbackType>()
            .map_err(|e| FeedbackError::UnknownFeedbackType(e.0))?;

        Ok(FeedbackEvent {
            feedback_id: Uuid::now_v7(),
            content_id: content_id.to_string(),
            user_id: user_id.to_string(),
            feedback_type,
            received_at,
        })
    }
}

/// A validated feedback event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// Identifier returned to the caller.
    pub feedback_id: Uuid,

    /// Item the feedback is about.
    pub content_id: String,

    /// User giving the feedback.
    pub user_id: String,

    /// What the user said.
    pub feedback_type: FeedbackType,

    /// When ingestion accepted the event.
    pub received_at: DateTime<Utc>,
}

/// Status reported in a [`FeedbackReceipt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Queued, not yet applied.
    Accepted,
}

/// Response body for an accepted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    /// Identifier of the queued event.
    pub feedback_id: Uuid,

    /// Always `accepted`.
    pub status: ReceiptStatus,

    /// When the event was accepted.
    pub timestamp: DateTime<Utc>,
}

impl FeedbackReceipt {
    /// Receipt for a queued event.
    pub fn accepted(event: &FeedbackEvent) -> Self {
        Self {
            feedback_id: event.feedback_id,
            status: ReceiptStatus::Accepted,
            timestamp: event.received_at,
        }
    }
}
