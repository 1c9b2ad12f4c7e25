//! Ranking entry point used by the serving layer.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::config::ScorerConfig;
use crate::content::ContentCatalog;
use crate::error::{RankingError, Result};
use crate::profile::ProfileStore;
use crate::scorer::{ContentScorer, RankingResult, compare_results};

/// A candidate that could not be ranked.
#[derive(Debug)]
pub struct RankingFailure {
    /// Candidate identifier.
    pub content_id: String,

    /// Why it was excluded.
    pub error: RankingError,
}

/// Ranked candidates plus the ones that were excluded.
#[derive(Debug, Default)]
pub struct RankingOutcome {
    /// Scored candidates, best first.
    pub ranked: Vec<RankingResult>,

    /// Candidates excluded from `ranked`, in request order.
    pub failures: Vec<RankingFailure>,
}

impl RankingOutcome {
    /// Identifiers of the ranked candidates, best first.
    pub fn ranked_ids(&self) -> Vec<&str> {
        self.ranked.iter().map(|r| r.content_id.as_str()).collect()
    }
}

/// Scores candidate items against a user's stored profile.
///
/// A bad candidate never fails the whole call: it is logged and reported in
/// [`RankingOutcome::failures`]. Only an unknown or unreadable profile fails
/// the request.
pub struct Ranker {
    profiles: Arc<dyn ProfileStore>,
    catalog: Arc<dyn ContentCatalog>,
    scorer: ContentScorer,
}

impl Ranker {
    /// Create a new ranker builder.
    pub fn builder() -> RankerBuilder {
        RankerBuilder::new()
    }

    /// Create a ranker with the default scorer.
    pub fn new(profiles: Arc<dyn ProfileStore>, catalog: Arc<dyn ContentCatalog>) -> Self {
        Self {
            profiles,
            catalog,
            scorer: ContentScorer::default(),
        }
    }

    /// Get the scorer.
    pub fn scorer(&self) -> &ContentScorer {
        &self.scorer
    }

    /// Rank `candidate_ids` for `user_id` as of `now`.
    pub async fn rank(
        &self,
        user_id: &str,
        candidate_ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<RankingOutcome> {
        let profile = self
            .profiles
            .read(user_id)
            .await?
            .ok_or_else(|| RankingError::ProfileNotFound(user_id.to_string()))?;

        let mut outcome = RankingOutcome::default();
        let mut seen = HashSet::new();

        for content_id in candidate_ids {
            if !seen.insert(content_id.as_str()) {
                continue;
            }

            let item = match self.catalog.get(content_id).await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    warn!(user_id, content_id = %content_id, "candidate not in catalog");
                    outcome.failures.push(RankingFailure {
                        content_id: content_id.clone(),
                        error: RankingError::ContentNotFound(content_id.clone()),
                    });
                    continue;
                }
                Err(e) => {
                    error!(user_id, content_id = %content_id, "catalog lookup failed: {e}");
                    outcome.failures.push(RankingFailure {
                        content_id: content_id.clone(),
                        error: e,
                    });
                    continue;
                }
            };

            match self
                .scorer
                .score(&profile.values, content_id, &item.signals, now)
            {
                Ok(result) => outcome.ranked.push(result),
                Err(e) => {
                    error!(user_id, content_id = %content_id, "failed to score candidate: {e}");
                    outcome.failures.push(RankingFailure {
                        content_id: content_id.clone(),
                        error: e.into(),
                    });
                }
            }
        }

        outcome.ranked.sort_by(compare_results);

        debug!(
            user_id,
            ranked = outcome.ranked.len(),
            failed = outcome.failures.len(),
            "ranked candidates"
        );

        Ok(outcome)
    }
}

/// Builder for [`Ranker`].
pub struct RankerBuilder {
    profiles: Option<Arc<dyn ProfileStore>>,
    catalog: Option<Arc<dyn ContentCatalog>>,
    scorer: ScorerConfig,
}

impl RankerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            profiles: None,
            catalog: None,
            scorer: ScorerConfig::default(),
        }
    }

    /// Set the profile store.
    pub fn with_profile_store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(store);
        self
    }

    /// Set the content catalog.
    pub fn with_catalog(mut self, catalog: Arc<dyn ContentCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the scorer configuration.
    pub fn with_scorer_config(mut self, config: ScorerConfig) -> Self {
        self.scorer = config;
        self
    }

    /// Build the ranker.
    pub fn build(self) -> Result<Ranker> {
        let profiles = self
            .profiles
            .ok_or_else(|| RankingError::Config("ranker needs a profile store".to_string()))?;
        let catalog = self
            .catalog
            .ok_or_else(|| RankingError::Config("ranker needs a content catalog".to_string()))?;

        Ok(Ranker {
            profiles,
            catalog,
            scorer: ContentScorer::new(self.scorer)?,
        })
    }
}

impl Default for RankerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentItem, ContentSignals, InMemoryContentCatalog};
    use crate::profile::InMemoryProfileStore;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn item(id: &str, embedding: Vec<f32>, age_hours: i64) -> ContentItem {
        ContentItem::new(
            id,
            ContentSignals::new(embedding, now() - Duration::hours(age_hours), 0.5, 0.5),
        )
    }

    async fn ranker(items: Vec<ContentItem>) -> Ranker {
        let profiles = InMemoryProfileStore::new();
        profiles.initialize("u1", &[1.0, 0.0]).await.unwrap();
        Ranker::new(
            Arc::new(profiles),
            Arc::new(InMemoryContentCatalog::from_items(items)),
        )
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_rank_orders_by_score() {
        let ranker = ranker(vec![
            item("far", vec![0.0, 1.0], 0),
            item("near", vec![1.0, 0.0], 0),
            item("mid", vec![0.6, 0.8], 0),
        ])
        .await;

        let outcome = ranker
            .rank("u1", &ids(&["far", "near", "mid"]), now())
            .await
            .unwrap();
        assert_eq!(outcome.ranked_ids(), vec!["near", "mid", "far"]);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_fails_request() {
        let ranker = ranker(vec![item("a", vec![1.0, 0.0], 0)]).await;
        let err = ranker.rank("nobody", &ids(&["a"]), now()).await.unwrap_err();
        assert!(matches!(err, RankingError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_content_is_isolated() {
        let ranker = ranker(vec![item("a", vec![1.0, 0.0], 0)]).await;
        let outcome = ranker.rank("u1", &ids(&["ghost", "a"]), now()).await.unwrap();

        assert_eq!(outcome.ranked_ids(), vec!["a"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].content_id, "ghost");
        assert!(matches!(
            outcome.failures[0].error,
            RankingError::ContentNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_duplicates_scored_once() {
        let ranker = ranker(vec![item("a", vec![1.0, 0.0], 0)]).await;
        let outcome = ranker.rank("u1", &ids(&["a", "a", "a"]), now()).await.unwrap();
        assert_eq!(outcome.ranked.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let ranker = ranker(Vec::new()).await;
        let outcome = ranker.rank("u1", &[], now()).await.unwrap();
        assert!(outcome.ranked.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_builder_requires_stores() {
        assert!(matches!(
            Ranker::builder().build(),
            Err(RankingError::Config(_))
        ));
    }

    #[test]
    fn test_builder_rejects_bad_weights() {
        let result = Ranker::builder()
            .with_profile_store(Arc::new(InMemoryProfileStore::new()))
            .with_catalog(Arc::new(InMemoryContentCatalog::new()))
            .with_scorer_config(ScorerConfig::default().with_weights(0.5, 0.5, 0.5, 0.5))
            .build();
        assert!(result.is_err());
    }
}
