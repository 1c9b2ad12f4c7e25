//! Profile vector storage.
//!
//! One unit-length vector per user. Writes are compare-and-swap on the
//! version the writer last read, so two workers racing on the same user
//! cannot silently overwrite each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use insight_embeddings::{Embedding, vector};

use crate::error::{RankingError, Result};

/// A user's stored profile vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileVector {
    /// Owner of the profile.
    pub user_id: String,

    /// Unit-normalized interest vector.
    pub values: Embedding,

    /// Incremented on every successful write.
    pub version: u64,

    /// When the vector was last written.
    pub updated_at: DateTime<Utc>,
}

impl ProfileVector {
    /// Dimension of the vector.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Result of a compare-and-swap write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The write was applied; holds the stored profile.
    Written(ProfileVector),

    /// Someone else wrote first; the caller should re-read and retry.
    Conflict,
}

/// Minimal persistence interface for profile vectors.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read a user's profile, `None` if the user has none.
    async fn read(&self, user_id: &str) -> Result<Option<ProfileVector>>;

    /// Replace the profile if it still matches `expected_previous`.
    async fn write(
        &self,
        user_id: &str,
        values: Embedding,
        expected_previous: &ProfileVector,
    ) -> Result<WriteOutcome>;
}

fn onboard(user_id: &str, values: &[f32]) -> Result<ProfileVector> {
    let values = vector::normalize(values);
    if values.is_empty() || vector::norm(&values) == 0.0 {
        return Err(RankingError::InvalidProfile {
            user_id: user_id.to_string(),
            reason: "initial profile vector has zero magnitude".to_string(),
        });
    }
    Ok(ProfileVector {
        user_id: user_id.to_string(),
        values,
        version: 1,
        updated_at: Utc::now(),
    })
}

fn compare_and_swap(
    profiles: &mut HashMap<String, ProfileVector>,
    user_id: &str,
    values: Embedding,
    expected_previous: &ProfileVector,
) -> WriteOutcome {
    match profiles.get(user_id) {
        Some(current) if current.version == expected_previous.version => {
            let next = ProfileVector {
                user_id: user_id.to_string(),
                values,
                version: current.version + 1,
                updated_at: Utc::now(),
            };
            profiles.insert(user_id.to_string(), next.clone());
            WriteOutcome::Written(next)
        }
        _ => WriteOutcome::Conflict,
    }
}

/// Profile store held in process memory.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, ProfileVector>>,
}

impl InMemoryProfileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a user's profile from an onboarding vector.
    ///
    /// The vector is normalized; a zero vector is rejected.
    pub async fn initialize(&self, user_id: &str, values: &[f32]) -> Result<ProfileVector> {
        let profile = onboard(user_id, values)?;
        self.profiles
            .write()
            .await
            .insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }

    /// Number of stored profiles.
    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn read(&self, user_id: &str) -> Result<Option<ProfileVector>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn write(
        &self,
        user_id: &str,
        values: Embedding,
        expected_previous: &ProfileVector,
    ) -> Result<WriteOutcome> {
        let mut profiles = self.profiles.write().await;
        Ok(compare_and_swap(
            &mut profiles,
            user_id,
            values,
            expected_previous,
        ))
    }
}

/// Profile store persisted to a single JSON file.
///
/// The whole table is rewritten atomically (temp file + rename) after every
/// successful write.
pub struct JsonFileProfileStore {
    path: PathBuf,
    profiles: RwLock<HashMap<String, ProfileVector>>,
}

impl JsonFileProfileStore {
    /// Open the store, loading existing profiles if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let profiles = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let list: Vec<ProfileVector> = serde_json::from_str(&content)?;
            list.into_iter().map(|p| (p.user_id.clone(), p)).collect()
        } else {
            HashMap::new()
        };

        info!(
            "Opened profile store at {} with {} profiles",
            path.display(),
            profiles.len()
        );

        Ok(Self {
            path,
            profiles: RwLock::new(profiles),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create or replace a user's profile from an onboarding vector.
    pub async fn initialize(&self, user_id: &str, values: &[f32]) -> Result<ProfileVector> {
        let profile = onboard(user_id, values)?;
        let mut profiles = self.profiles.write().await;
        profiles.insert(user_id.to_string(), profile.clone());
        self.persist(&profiles).await?;
        Ok(profile)
    }

    async fn persist(&self, profiles: &HashMap<String, ProfileVector>) -> Result<()> {
        let mut list: Vec<&ProfileVector> = profiles.values().collect();
        list.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        let content = serde_json::to_string_pretty(&list)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!("Persisted {} profiles", list.len());
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for JsonFileProfileStore {
    async fn read(&self, user_id: &str) -> Result<Option<ProfileVector>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn write(
        &self,
        user_id: &str,
        values: Embedding,
        expected_previous: &ProfileVector,
    ) -> Result<WriteOutcome> {
        let mut profiles = self.profiles.write().await;
        let previous = profiles.get(user_id).cloned();
        let outcome = compare_and_swap(&mut profiles, user_id, values, expected_previous);

        if let WriteOutcome::Written(_) = outcome {
            if let Err(e) = self.persist(&profiles).await {
                // Keep memory and disk in agreement.
                match previous {
                    Some(previous) => profiles.insert(user_id.to_string(), previous),
                    None => profiles.remove(user_id),
                };
                return Err(e);
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_initialize_normalizes() {
        let store = InMemoryProfileStore::new();
        let profile = store.initialize("u1", &[3.0, 4.0]).await.unwrap();
        assert_eq!(profile.version, 1);
        assert!(vector::is_unit(&profile.values, 1e-6));
    }

    #[tokio::test]
    async fn test_initialize_rejects_zero_vector() {
        let store = InMemoryProfileStore::new();
        let err = store.initialize("u1", &[0.0, 0.0]).await.unwrap_err();
        assert!(matches!(err, RankingError::InvalidProfile { .. }));
    }

    #[tokio::test]
    async fn test_read_unknown_user() {
        let store = InMemoryProfileStore::new();
        assert!(store.read("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = InMemoryProfileStore::new();
        let original = store.initialize("u1", &[1.0, 0.0]).await.unwrap();

        let first = store
            .write("u1", vec![0.0, 1.0], &original)
            .await
            .unwrap();
        let WriteOutcome::Written(stored) = first else {
            panic!("first write should succeed");
        };
        assert_eq!(stored.version, 2);

        // A second writer still holding the original version loses.
        let stale = store
            .write("u1", vec![1.0, 0.0], &original)
            .await
            .unwrap();
        assert_eq!(stale, WriteOutcome::Conflict);
        assert_eq!(store.read("u1").await.unwrap().unwrap().values, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_write_without_profile_conflicts() {
        let store = InMemoryProfileStore::new();
        let phantom = ProfileVector {
            user_id: "ghost".into(),
            values: vec![1.0],
            version: 1,
            updated_at: Utc::now(),
        };
        let outcome = store.write("ghost", vec![1.0], &phantom).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_json_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");

        let store = JsonFileProfileStore::open(&path).await.unwrap();
        let original = store.initialize("u1", &[1.0, 0.0]).await.unwrap();
        store.write("u1", vec![0.6, 0.8], &original).await.unwrap();

        let reopened = JsonFileProfileStore::open(&path).await.unwrap();
        let profile = reopened.read("u1").await.unwrap().unwrap();
        assert_eq!(profile.values, vec![0.6, 0.8]);
        assert_eq!(profile.version, 2);
    }
}
