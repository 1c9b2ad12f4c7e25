//! Content items and the per-item signals consumed by scoring.
//!
//! Signals are produced upstream (embedding, quality estimation, popularity
//! aggregation) and are read-only here.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::info;

use insight_embeddings::Embedding;

use crate::error::Result;

/// Inputs to scoring for one content item.
///
/// Every field is optional on the wire so that an absent signal is reported
/// as [`ScoringError::MissingSignal`](crate::ScoringError::MissingSignal)
/// instead of being defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSignals {
    /// Unit-normalized item embedding.
    #[serde(default)]
    pub embedding: Option<Embedding>,

    /// Publication time.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    /// Externally computed quality estimate in [0, 1].
    #[serde(default)]
    pub quality: Option<f32>,

    /// Normalized interaction aggregate in [0, 1].
    #[serde(default)]
    pub interaction: Option<f32>,
}

impl ContentSignals {
    /// Signals with every field present.
    pub fn new(
        embedding: Embedding,
        published_at: DateTime<Utc>,
        quality: f32,
        interaction: f32,
    ) -> Self {
        Self {
            embedding: Some(embedding),
            published_at: Some(published_at),
            quality: Some(quality),
            interaction: Some(interaction),
        }
    }
}

/// A content item as known to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier.
    pub id: String,

    /// Text to embed when no precomputed embedding exists.
    #[serde(default)]
    pub text: Option<String>,

    /// Scoring inputs.
    #[serde(default)]
    pub signals: ContentSignals,

    /// Generic direction of the item's topic, if known.
    #[serde(default)]
    pub topic_prototype: Option<Embedding>,
}

impl ContentItem {
    /// Create an item with the given signals.
    pub fn new(id: impl Into<String>, signals: ContentSignals) -> Self {
        Self {
            id: id.into(),
            text: None,
            signals,
            topic_prototype: None,
        }
    }

    /// Attach source text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach a topic prototype vector.
    pub fn with_topic_prototype(mut self, prototype: Embedding) -> Self {
        self.topic_prototype = Some(prototype);
        self
    }
}

/// Read-only lookup of content items.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    /// Fetch an item by id.
    async fn get(&self, content_id: &str) -> Result<Option<ContentItem>>;

    /// Whether an item exists.
    async fn contains(&self, content_id: &str) -> Result<bool> {
        Ok(self.get(content_id).await?.is_some())
    }
}

/// Catalog held entirely in memory.
#[derive(Default)]
pub struct InMemoryContentCatalog {
    items: RwLock<HashMap<String, ContentItem>>,
}

impl InMemoryContentCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog from a list of items.
    pub fn from_items(items: impl IntoIterator<Item = ContentItem>) -> Self {
        let items = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        Self {
            items: RwLock::new(items),
        }
    }

    /// Insert or replace an item.
    pub async fn insert(&self, item: ContentItem) {
        self.items.write().await.insert(item.id.clone(), item);
    }

    /// Number of items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the catalog is empty.
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl ContentCatalog for InMemoryContentCatalog {
    async fn get(&self, content_id: &str) -> Result<Option<ContentItem>> {
        Ok(self.items.read().await.get(content_id).cloned())
    }
}

/// Catalog loaded once from a JSON array of [`ContentItem`]s.
pub struct JsonContentCatalog {
    inner: InMemoryContentCatalog,
}

impl JsonContentCatalog {
    /// Load the catalog from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let items: Vec<ContentItem> = serde_json::from_str(&content)?;
        info!("Loaded {} content items from {}", items.len(), path.display());
        Ok(Self {
            inner: InMemoryContentCatalog::from_items(items),
        })
    }

    /// Number of items.
    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    /// Whether the catalog is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }
}

#[async_trait]
impl ContentCatalog for JsonContentCatalog {
    async fn get(&self, content_id: &str) -> Result<Option<ContentItem>> {
        self.inner.get(content_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_catalog() {
        let catalog = InMemoryContentCatalog::new();
        catalog
            .insert(ContentItem::new("a", ContentSignals::default()).with_text("hello"))
            .await;

        assert!(catalog.contains("a").await.unwrap());
        assert!(!catalog.contains("b").await.unwrap());
        assert_eq!(
            catalog.get("a").await.unwrap().unwrap().text.as_deref(),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn test_json_catalog_with_partial_signals() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "x", "signals": {"embedding": [1.0, 0.0], "quality": 0.5}},
                {"id": "y", "text": "an article about tokio"}
            ]"#,
        )
        .unwrap();

        let catalog = JsonContentCatalog::load(&path).await.unwrap();
        assert_eq!(catalog.len().await, 2);

        let x = catalog.get("x").await.unwrap().unwrap();
        assert_eq!(x.signals.quality, Some(0.5));
        assert!(x.signals.published_at.is_none());

        let y = catalog.get("y").await.unwrap().unwrap();
        assert_eq!(y.signals, ContentSignals::default());
    }
}
