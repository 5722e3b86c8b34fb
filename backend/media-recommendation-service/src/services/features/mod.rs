//! Feature extraction
//!
//! Turns raw catalog records into one matrix per feature:
//! - title, description, creator, genres: TF-IDF with English stop words removed
//! - release_date (epoch seconds), pages_runtime: min-max scaled single column
//!
//! The fitted state (vocabularies, idf vectors, scalers) travels with the
//! matrices in [`ItemVectorSet`] so a cached artifact is self-contained.

pub mod normalizer;
pub mod sparse;
pub mod stop_words;
pub mod tfidf;

pub use normalizer::MinMaxNormalizer;
pub use sparse::CsrMatrix;
pub use tfidf::{tokenize, TfidfVectorizer};

use crate::error::{AppError, Result};
use crate::models::{Feature, MediaItem};
use crate::store::CatalogStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Per-feature matrices for the whole catalog, row-aligned with `item_ids`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemVectorSet {
    pub item_ids: Vec<String>,
    pub features: BTreeMap<Feature, CsrMatrix>,
    pub date_normalizer: MinMaxNormalizer,
    pub runtime_normalizer: MinMaxNormalizer,
    /// Column count of each feature matrix
    pub feature_sizes: BTreeMap<Feature, usize>,
    pub vocabularies: BTreeMap<Feature, TfidfVectorizer>,
    pub built_at: DateTime<Utc>,
}

impl ItemVectorSet {
    /// Fit every feature over `items`. CPU bound; run off the async runtime.
    pub fn fit(items: &[MediaItem]) -> Self {
        let item_ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();

        let mut features = BTreeMap::new();
        let mut vocabularies = BTreeMap::new();

        for feature in Feature::TEXT {
            let documents: Vec<String> = items.iter().map(|item| text_of(item, feature)).collect();
            let (vectorizer, matrix) = TfidfVectorizer::fit_transform(&documents);
            features.insert(feature, matrix);
            vocabularies.insert(feature, vectorizer);
        }

        let dates: Vec<Option<f64>> = items
            .iter()
            .map(|item| item.release_date.map(|d| d.timestamp() as f64))
            .collect();
        let runtimes: Vec<Option<f64>> = items
            .iter()
            .map(|item| item.pages_runtime.map(|v| v as f64))
            .collect();

        let date_normalizer = MinMaxNormalizer::fit(&dates);
        let runtime_normalizer = MinMaxNormalizer::fit(&runtimes);

        features.insert(
            Feature::ReleaseDate,
            column_matrix(&date_normalizer.transform_all(&dates)),
        );
        features.insert(
            Feature::PagesRuntime,
            column_matrix(&runtime_normalizer.transform_all(&runtimes)),
        );

        let feature_sizes = features.iter().map(|(f, m)| (*f, m.cols())).collect();

        Self {
            item_ids,
            features,
            date_normalizer,
            runtime_normalizer,
            feature_sizes,
            vocabularies,
            built_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    pub fn matrix(&self, feature: Feature) -> Option<&CsrMatrix> {
        self.features.get(&feature)
    }

    /// Restore derived lookups that are not serialized
    pub fn rehydrate(&mut self) {
        self.vocabularies
            .values_mut()
            .for_each(TfidfVectorizer::rebuild_lookup);
    }
}

fn text_of(item: &MediaItem, feature: Feature) -> String {
    match feature {
        Feature::Title => item.title.clone(),
        Feature::Description => item.description.clone(),
        Feature::Creator => item.creator.clone(),
        Feature::Genres => item.genres.join(" "),
        Feature::ReleaseDate | Feature::PagesRuntime => String::new(),
    }
}

fn column_matrix(values: &[f32]) -> CsrMatrix {
    let rows = values.iter().map(|&v| vec![(0, v)]).collect();
    CsrMatrix::from_rows(1, rows)
}

/// Reads the catalog page by page and fits an [`ItemVectorSet`]
pub struct FeatureExtractor {
    batch_size: usize,
}

impl FeatureExtractor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Any page failure aborts the pass with [`AppError::Extraction`]
    pub async fn extract(&self, store: &dyn CatalogStore) -> Result<ItemVectorSet> {
        let start = Instant::now();

        let total = store
            .count()
            .await
            .map_err(|e| AppError::Extraction(format!("Failed to count catalog: {}", e)))?;

        let mut items: Vec<MediaItem> = Vec::with_capacity(total);
        let mut offset = 0;

        while offset < total {
            let page = store.page(offset, self.batch_size).await.map_err(|e| {
                AppError::Extraction(format!("Error processing batch {}: {}", offset, e))
            })?;

            if page.is_empty() {
                break;
            }

            debug!(offset = offset, size = page.len(), "Fetched catalog batch");
            offset += page.len();
            items.extend(page);
        }

        let set = tokio::task::spawn_blocking(move || ItemVectorSet::fit(&items)).await?;

        info!(
            items = set.len(),
            feature_sizes = ?set.feature_sizes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature extraction completed"
        );

        Ok(set)
    }
}
