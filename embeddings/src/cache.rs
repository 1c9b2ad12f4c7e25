//! Embedding cache so feedback on the same item does not re-embed its text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;
use crate::error::Result;
use crate::provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};

/// Cache entry for an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// SHA-256 of the model name and text.
    pub key: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Insertion order, used for oldest-first eviction.
    pub sequence: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    next_sequence: u64,
}

/// Bounded cache for embeddings, optionally persisted as JSON.
pub struct EmbeddingCache {
    state: Arc<RwLock<CacheState>>,

    /// Path for persistent cache storage.
    cache_path: Option<PathBuf>,

    /// Maximum cache size.
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            cache_path: None,
            max_entries: max_entries.max(1),
        }
    }

    /// Create a cache with persistent storage.
    pub async fn with_persistence(path: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let cache = Self {
            cache_path: Some(path.as_ref().to_path_buf()),
            ..Self::new(max_entries)
        };

        cache.load().await?;
        Ok(cache)
    }

    /// Compute a stable key for cache lookup.
    fn hash_key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str) -> Option<Embedding> {
        let key = Self::hash_key(text, model);
        let state = self.state.read().await;
        state.entries.get(&key).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) -> Result<()> {
        let key = Self::hash_key(text, model);

        {
            let mut state = self.state.write().await;

            if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
                if let Some(oldest_key) = state
                    .entries
                    .values()
                    .min_by_key(|e| e.sequence)
                    .map(|e| e.key.clone())
                {
                    state.entries.remove(&oldest_key);
                }
            }

            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.entries.insert(
                key.clone(),
                CacheEntry {
                    key,
                    embedding,
                    model: model.to_string(),
                    sequence,
                },
            );
        }

        debug!("Cached embedding for text (model: {model})");

        if self.cache_path.is_some() {
            self.save().await?;
        }

        Ok(())
    }

    /// Check if an embedding is cached.
    pub async fn contains(&self, text: &str, model: &str) -> bool {
        let key = Self::hash_key(text, model);
        self.state.read().await.entries.contains_key(&key)
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.state.write().await.entries.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        let mut models: Vec<String> = state.entries.values().map(|e| e.model.clone()).collect();
        models.sort();
        models.dedup();
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.max_entries,
            models,
        }
    }

    /// Save cache to disk.
    async fn save(&self) -> Result<()> {
        if let Some(ref path) = self.cache_path {
            let content = {
                let state = self.state.read().await;
                let mut entries: Vec<&CacheEntry> = state.entries.values().collect();
                entries.sort_by_key(|e| e.sequence);
                serde_json::to_string(&entries)?
            };

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }

            let temp_path = path.with_extension("json.tmp");
            fs::write(&temp_path, content).await?;
            fs::rename(&temp_path, path).await?;
        }
        Ok(())
    }

    /// Load cache from disk.
    async fn load(&self) -> Result<()> {
        if let Some(ref path) = self.cache_path {
            if fs::try_exists(path).await? {
                let content = fs::read_to_string(path).await?;
                let entries: Vec<CacheEntry> = serde_json::from_str(&content)?;

                let mut state = self.state.write().await;
                for entry in entries {
                    state.next_sequence = state.next_sequence.max(entry.sequence + 1);
                    state.entries.insert(entry.key.clone(), entry);
                }

                info!("Loaded {} cache entries from disk", state.entries.len());
            }
        }
        Ok(())
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Models with cached embeddings.
    pub models: Vec<String>,
}

/// A provider that consults an [`EmbeddingCache`] before calling through.
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[async_trait]
impl<P> EmbeddingProvider for CachedProvider<P>
where
    P: EmbeddingProvider,
{
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn default_model(&self) -> &str {
        self.provider.default_model()
    }

    fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    fn max_input_chars(&self) -> usize {
        self.provider.max_input_chars()
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());

        if let Some(embedding) = self.cache.get(&request.text, &model).await {
            debug!("Cache hit for embedding");
            return Ok(EmbeddingResponse {
                embedding,
                model,
                tokens_used: None,
            });
        }

        let text = request.text.clone();
        let response = self.provider.embed(request).await?;
        self.cache
            .put(&text, &model, response.embedding.clone())
            .await?;

        Ok(response)
    }

    fn is_available(&self) -> bool {
        self.provider.is_available()
    }
}
