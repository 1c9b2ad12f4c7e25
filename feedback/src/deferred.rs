//! Record of `NOT_NOW` feedback.
//!
//! `NOT_NOW` never moves a profile vector, but the deferrals are kept so a
//! later temporal model can use them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::event::FeedbackEvent;

/// One deferral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deferral {
    /// Deferred item.
    pub content_id: String,

    /// When the user deferred it.
    pub deferred_at: DateTime<Utc>,
}

/// Per-user list of deferrals, oldest first.
#[derive(Default)]
pub struct DeferredFeedbackLog {
    entries: RwLock<HashMap<String, Vec<Deferral>>>,
}

impl DeferredFeedbackLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `NOT_NOW` event.
    pub async fn record(&self, event: &FeedbackEvent) {
        self.entries
            .write()
            .await
            .entry(event.user_id.clone())
            .or_default()
            .push(Deferral {
                content_id: event.content_id.clone(),
                deferred_at: event.received_at,
            });
    }

    /// Deferrals for one user.
    pub async fn for_user(&self, user_id: &str) -> Vec<Deferral> {
        self.entries
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of deferrals.
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }

    /// Whether nothing has been deferred.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
