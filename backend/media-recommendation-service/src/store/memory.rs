use super::{CatalogStore, PreferenceStore};
use crate::error::{AppError, Result};
use crate::models::{
    MediaFilter, MediaItem, MediaItemType, PreferenceSignal, Polarity, RecommendedItem, SearchHit,
};
use crate::services::features::tokenize;
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// In-process media item collection.
///
/// Iteration order is insertion order, which makes it the "catalog order"
/// used for pagination and for breaking rating ties.
#[derive(Default)]
pub struct InMemoryCatalog {
    items: RwLock<Vec<MediaItem>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<MediaItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Load a JSON array of media item documents.
    ///
    /// A missing file yields an empty catalog.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Catalog file not found: {}", path.display());
            return Ok(Self::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let items: Vec<MediaItem> = serde_json::from_reader(reader)?;
        items.iter().try_for_each(check_rating)?;

        info!(
            items = items.len(),
            path = %path.display(),
            "Loaded catalog from JSON"
        );

        Ok(Self::with_items(items))
    }
}

fn check_rating(item: &MediaItem) -> Result<()> {
    if item.rating.is_finite() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Media item {} has a non-finite rating",
            item.id
        )))
    }
}

/// Popularity sort key; non-finite ratings rank below every real one
fn rank_key(item: &MediaItem) -> f64 {
    if item.rating.is_finite() {
        item.rating
    } else {
        f64::NEG_INFINITY
    }
}

/// Relevance of a record for a tokenized query.
///
/// Each query term scores one point per occurrence in title, creator or
/// description; a title hit weighs double.
fn text_score(item: &MediaItem, terms: &HashSet<String>) -> f64 {
    let count = |text: &str| -> f64 {
        tokenize(text)
            .into_iter()
            .filter(|token| terms.contains(token))
            .count() as f64
    };

    2.0 * count(&item.title) + count(&item.creator) + count(&item.description)
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn count(&self) -> Result<usize> {
        Ok(self.items.read().await.len())
    }

    async fn page(&self, offset: usize, limit: usize) -> Result<Vec<MediaItem>> {
        let items = self.items.read().await;
        Ok(items.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn ids_of_type(&self, item_type: MediaItemType) -> Result<Vec<String>> {
        let items = self.items.read().await;
        Ok(items
            .iter()
            .filter(|item| item.item_type == item_type)
            .map(|item| item.id.clone())
            .collect())
    }

    async fn item_type(&self, id: &str) -> Result<Option<MediaItemType>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item.id == id).map(|item| item.item_type))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.item_type(id).await?.is_some())
    }

    async fn popular(&self, n: usize, filter: MediaFilter) -> Result<Vec<RecommendedItem>> {
        let items = self.items.read().await;

        let mut ranked: Vec<&MediaItem> = items
            .iter()
            .filter(|item| filter.matches(item.item_type))
            .collect();

        // Stable sort keeps catalog order between equal ratings
        ranked.sort_by(|a, b| rank_key(b).total_cmp(&rank_key(a)));

        Ok(ranked
            .into_iter()
            .take(n)
            .map(|item| RecommendedItem::new(item.id.clone(), item.item_type))
            .collect())
    }

    async fn search(
        &self,
        filter: MediaFilter,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let items = self.items.read().await;
        let mut hits: Vec<SearchHit> = items
            .iter()
            .filter(|item| filter.matches(item.item_type))
            .filter_map(|item| {
                let score = text_score(item, &terms);
                (score > 0.0).then(|| SearchHit {
                    id: item.id.clone(),
                    item_type: item.item_type,
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);

        debug!(query = query, hits = hits.len(), "Catalog search completed");
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<Option<MediaItem>> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item.id == id).cloned())
    }

    async fn create(&self, item: MediaItem) -> Result<()> {
        check_rating(&item)?;
        let mut items = self.items.write().await;
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(AppError::Validation(format!(
                "Media item already exists: {}",
                item.id
            )));
        }
        items.push(item);
        Ok(())
    }

    async fn update(&self, item: MediaItem) -> Result<()> {
        check_rating(&item)?;
        let mut items = self.items.write().await;
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                *existing = item;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Media item {}", item.id))),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut items = self.items.write().await;
        items.retain(|item| item.id != id);
        Ok(())
    }
}

/// In-process preference collection, one record per (user, item)
#[derive(Default)]
pub struct InMemoryPreferences {
    records: RwLock<Vec<PreferenceSignal>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of preference documents. A missing file yields an
    /// empty collection.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Preferences file not found: {}", path.display());
            return Ok(Self::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let signals: Vec<PreferenceSignal> = serde_json::from_reader(reader)?;
        let records: Vec<PreferenceSignal> = signals
            .into_iter()
            .filter(|s| s.polarity != Polarity::None)
            .collect();

        info!(records = records.len(), "Loaded preferences from JSON");

        Ok(Self {
            records: RwLock::new(records),
        })
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferences {
    async fn user_preferences(&self, user_id: &str) -> Result<Vec<PreferenceSignal>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_preference(&self, signal: PreferenceSignal) -> Result<()> {
        let mut records = self.records.write().await;
        let position = records
            .iter()
            .position(|r| r.user_id == signal.user_id && r.item_id == signal.item_id);

        match (signal.polarity, position) {
            (Polarity::None, Some(idx)) => {
                records.remove(idx);
                info!(
                    "Preference deleted for user {} on item {}",
                    signal.user_id, signal.item_id
                );
            }
            (Polarity::None, None) => {
                info!(
                    "No preference found to delete for user {} on item {}",
                    signal.user_id, signal.item_id
                );
            }
            (polarity, Some(idx)) => {
                records[idx].polarity = polarity;
                info!(
                    "Preference updated for user {} on item {}",
                    signal.user_id, signal.item_id
                );
            }
            (_, None) => {
                info!(
                    "New preference created for user {} on item {}",
                    signal.user_id, signal.item_id
                );
                records.push(signal);
            }
        }

        Ok(())
    }

    async fn preference_for(&self, user_id: &str, item_id: &str) -> Result<Polarity> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.user_id == user_id && r.item_id == item_id)
            .map(|r| r.polarity)
            .unwrap_or_default())
    }

    async fn media_preference_counts(&self, item_id: &str) -> Result<(usize, usize)> {
        let records = self.records.read().await;
        let mut likes = 0;
        let mut dislikes = 0;

        for record in records.iter().filter(|r| r.item_id == item_id) {
            match record.polarity {
                Polarity::Like => likes += 1,
                Polarity::Dislike => dislikes += 1,
                Polarity::None => {}
            }
        }

        Ok((likes, dislikes))
    }
}
