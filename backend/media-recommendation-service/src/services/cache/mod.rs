//! On-disk vector cache
//!
//! One bincode artifact per model: a small versioned header followed by the
//! full [`ItemVectorSet`]. Writes land in a sibling temp file that is renamed
//! into place, so readers only ever see a complete artifact.

use crate::error::{AppError, Result};
use crate::services::features::{FeatureExtractor, ItemVectorSet};
use crate::store::CatalogStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

const CACHE_MAGIC: [u8; 4] = *b"MRVC";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheHeader {
    magic: [u8; 4],
    schema_version: u32,
}

pub struct VectorCache {
    path: PathBuf,
}

impl VectorCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub async fn save(&self, set: &ItemVectorSet) -> Result<()> {
        let header = CacheHeader {
            magic: CACHE_MAGIC,
            schema_version: SCHEMA_VERSION,
        };

        let mut bytes = bincode::serialize(&header)?;
        bincode::serialize_into(&mut bytes, set)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(
            path = %self.path.display(),
            items = set.len(),
            bytes = bytes.len(),
            "Vector cache saved"
        );
        Ok(())
    }

    /// `Ok(None)` when no artifact exists. A corrupt or foreign artifact is
    /// an [`AppError::Cache`].
    pub async fn load(&self) -> Result<Option<ItemVectorSet>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = bytes.as_slice();
        let header: CacheHeader = bincode::deserialize_from(&mut reader)
            .map_err(|e| AppError::Cache(format!("Unreadable header: {}", e)))?;

        if header.magic != CACHE_MAGIC {
            return Err(AppError::Cache("Not a vector cache artifact".to_string()));
        }
        if header.schema_version != SCHEMA_VERSION {
            return Err(AppError::Cache(format!(
                "Unsupported schema version {} (expected {})",
                header.schema_version, SCHEMA_VERSION
            )));
        }

        let mut set: ItemVectorSet = bincode::deserialize_from(&mut reader)
            .map_err(|e| AppError::Cache(format!("Corrupt artifact: {}", e)))?;
        set.rehydrate();

        info!(path = %self.path.display(), items = set.len(), "Vector cache loaded");
        Ok(Some(set))
    }

    /// Load the artifact, rebuilding it from the catalog when it is missing,
    /// unreadable, or `force` is set. A failed build leaves any existing
    /// artifact untouched.
    pub async fn ensure(
        &self,
        store: &dyn CatalogStore,
        extractor: &FeatureExtractor,
        force: bool,
    ) -> Result<ItemVectorSet> {
        if force {
            info!(path = %self.path.display(), "Forced recompute of vector cache");
        } else {
            match self.load().await {
                Ok(Some(set)) => return Ok(set),
                Ok(None) => info!(path = %self.path.display(), "No vector cache, building"),
                Err(e) => warn!(error = %e, "Vector cache unusable, rebuilding"),
            }
        }

        let set = extractor.extract(store).await?;
        self.save(&set).await?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaItem, MediaItemType};
    use crate::store::{InMemoryCatalog, MockCatalogStore};
    use tempfile::TempDir;

    fn catalog() -> InMemoryCatalog {
        let items = ["ocean waves", "desert storm", "ocean storm"]
            .iter()
            .enumerate()
            .map(|(i, title)| MediaItem {
                id: format!("item-{}", i),
                item_type: MediaItemType::Book,
                title: title.to_string(),
                description: "a long journey".to_string(),
                creator: "anon".to_string(),
                genres: vec!["drama".to_string()],
                release_date: None,
                pages_runtime: Some(100 + i as i64),
                rating: 3.0,
            })
            .collect();
        InMemoryCatalog::with_items(items)
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = VectorCache::new(dir.path().join("vectors.bin"));
        let set = FeatureExtractor::new(10).extract(&catalog()).await.unwrap();

        cache.save(&set).await.unwrap();
        let loaded = cache.load().await.unwrap().unwrap();

        assert_eq!(loaded, set);
        let title = &loaded.vocabularies[&crate::models::Feature::Title];
        assert_eq!(title.column_of("ocean"), Some(1));
        assert!(!cache.temp_path().exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_loads_none() {
        let dir = TempDir::new().unwrap();
        let cache = VectorCache::new(dir.path().join("absent.bin"));
        assert!(cache.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch_is_cache_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors.bin");
        let header = CacheHeader {
            magic: CACHE_MAGIC,
            schema_version: SCHEMA_VERSION + 1,
        };
        std::fs::write(&path, bincode::serialize(&header).unwrap()).unwrap();

        let err = VectorCache::new(&path).load().await.unwrap_err();
        assert!(matches!(err, AppError::Cache(_)));
    }

    #[tokio::test]
    async fn test_ensure_builds_then_reuses() {
        let dir = TempDir::new().unwrap();
        let cache = VectorCache::new(dir.path().join("nested").join("vectors.bin"));
        let extractor = FeatureExtractor::new(2);

        let built = cache.ensure(&catalog(), &extractor, false).await.unwrap();
        assert!(cache.exists());

        // A store that fails on any read proves the artifact was reused
        let mut failing = MockCatalogStore::new();
        failing
            .expect_count()
            .returning(|| Err(AppError::Store("down".to_string())));
        let reused = cache.ensure(&failing, &extractor, false).await.unwrap();
        assert_eq!(reused, built);
    }

    #[tokio::test]
    async fn test_ensure_rebuilds_corrupt_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vectors.bin");
        std::fs::write(&path, b"garbage").unwrap();

        let cache = VectorCache::new(&path);
        let set = cache
            .ensure(&catalog(), &FeatureExtractor::new(10), false)
            .await
            .unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(cache.load().await.unwrap().unwrap(), set);
    }

    #[tokio::test]
    async fn test_failed_forced_build_keeps_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let cache = VectorCache::new(dir.path().join("vectors.bin"));
        let extractor = FeatureExtractor::new(10);
        let original = cache.ensure(&catalog(), &extractor, false).await.unwrap();

        let mut failing = MockCatalogStore::new();
        failing.expect_count().returning(|| Ok(3));
        failing
            .expect_page()
            .returning(|_, _| Err(AppError::Store("timeout".to_string())));

        let err = cache.ensure(&failing, &extractor, true).await.unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
        assert_eq!(cache.load().await.unwrap().unwrap(), original);
    }
}
