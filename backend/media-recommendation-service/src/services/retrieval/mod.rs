//! Retrieval engine
//!
//! Request path: candidate filter → liked/disliked partition → profile
//! vector → batched cosine scan → bounded top-2n → diversity → typed results.
//!
//! The projected space is loaded once and shared behind an `Arc`. Refreshes
//! build a new space off to the side and swap it in under a short write lock.

pub mod diversity;
pub mod top_k;

pub use diversity::DiversityLayer;
pub use top_k::{BoundedTopK, ScoredRow};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    Feature, MediaFilter, Polarity, PreferenceSignal, RecommendationResult, RecommendedItem,
    SearchHit,
};
use crate::services::cache::VectorCache;
use crate::services::composer::{ProjectedVectorSpace, VectorComposer};
use crate::services::fallback::PopularityFallback;
use crate::services::features::FeatureExtractor;
use crate::store::{CatalogStore, PreferenceStore};
use crate::utils::cosine_from_parts;
use chrono::{DateTime, Utc};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Weight of the disliked-items centroid subtracted from the profile
const DISLIKE_PENALTY: f32 = 0.5;

/// Snapshot of the model currently serving requests
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub items: usize,
    pub projection_dim: usize,
    pub feature_sizes: BTreeMap<Feature, usize>,
    pub built_at: DateTime<Utc>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub generation: u64,
}

struct LoadedModel {
    space: ProjectedVectorSpace,
    loaded_at: Option<DateTime<Utc>>,
    generation: u64,
}

pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogStore>,
    preferences: Arc<dyn PreferenceStore>,
    cache: VectorCache,
    extractor: FeatureExtractor,
    composer: VectorComposer,
    fallback: PopularityFallback,
    scan_batch_size: usize,
    default_diversity: f64,
    model: RwLock<Arc<LoadedModel>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
}

impl RecommendationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        preferences: Arc<dyn PreferenceStore>,
        cache: VectorCache,
        extractor: FeatureExtractor,
        composer: VectorComposer,
    ) -> Self {
        let empty = LoadedModel {
            space: ProjectedVectorSpace::empty(composer.projection_dim()),
            loaded_at: None,
            generation: 0,
        };

        Self {
            fallback: PopularityFallback::new(Arc::clone(&catalog)),
            catalog,
            preferences,
            cache,
            extractor,
            composer,
            scan_batch_size: 10_000,
            default_diversity: 0.2,
            model: RwLock::new(Arc::new(empty)),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Wire an engine from validated configuration. Invalid weights fail here.
    pub fn from_config(
        config: &Config,
        catalog: Arc<dyn CatalogStore>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Result<Self> {
        let composer = VectorComposer::new(
            config.feature_weights()?,
            config.projection_dim,
            config.projection_seed,
        );

        Ok(Self::new(
            catalog,
            preferences,
            VectorCache::new(&config.vector_cache_path),
            FeatureExtractor::new(config.extraction_batch_size),
            composer,
        )
        .with_scan_batch_size(config.scan_batch_size)
        .with_default_diversity(config.default_diversity_factor))
    }

    pub fn with_scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size.max(1);
        self
    }

    pub fn with_default_diversity(mut self, factor: f64) -> Self {
        self.default_diversity = factor;
        self
    }

    async fn snapshot(&self) -> Arc<LoadedModel> {
        Arc::clone(&*self.model.read().await)
    }

    /// Load the model from the vector cache, building it when needed
    pub async fn initialize(&self, force_recompute: bool) -> Result<ModelInfo> {
        self.load_model(force_recompute).await
    }

    /// Re-extract the catalog and swap in the new model
    pub async fn refresh(&self) -> Result<ModelInfo> {
        self.load_model(true).await
    }

    // Single-flight: a caller that waited on an in-progress build reuses it.
    async fn load_model(&self, force: bool) -> Result<ModelInfo> {
        let observed = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.generation.load(Ordering::Acquire) != observed {
            debug!("Model was rebuilt while waiting, reusing it");
            return Ok(self.model_info().await);
        }

        let start = Instant::now();
        let set = self
            .cache
            .ensure(self.catalog.as_ref(), &self.extractor, force)
            .await?;

        let composer = self.composer.clone();
        let space = tokio::task::spawn_blocking(move || composer.build_space(&set)).await??;

        let generation = observed + 1;
        let model = Arc::new(LoadedModel {
            space,
            loaded_at: Some(Utc::now()),
            generation,
        });

        *self.model.write().await = model;
        self.generation.store(generation, Ordering::Release);

        let info = self.model_info().await;
        info!(
            items = info.items,
            projection_dim = info.projection_dim,
            generation = generation,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendation model loaded"
        );
        Ok(info)
    }

    pub async fn model_info(&self) -> ModelInfo {
        let model = self.snapshot().await;
        ModelInfo {
            items: model.space.len(),
            projection_dim: model.space.dim(),
            feature_sizes: model.space.feature_sizes.clone(),
            built_at: model.space.built_at,
            loaded_at: model.loaded_at,
            generation: model.generation,
        }
    }

    pub async fn recommend(
        &self,
        filter: MediaFilter,
        preferences: &[PreferenceSignal],
        n: usize,
        diversity_factor: f64,
    ) -> Result<RecommendationResult> {
        let mut rng = StdRng::from_entropy();
        self.recommend_with_rng(filter, preferences, n, diversity_factor, &mut rng)
            .await
    }

    pub async fn recommend_with_rng<R: Rng + Send>(
        &self,
        filter: MediaFilter,
        preferences: &[PreferenceSignal],
        n: usize,
        diversity_factor: f64,
        rng: &mut R,
    ) -> Result<RecommendationResult> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let model = self.snapshot().await;
        let space = &model.space;

        let mut candidates: Vec<usize> = match filter.item_type() {
            None => (0..space.len()).collect(),
            Some(item_type) => self
                .catalog
                .ids_of_type(item_type)
                .await?
                .iter()
                .filter_map(|id| space.row_of(id))
                .collect(),
        };
        candidates.sort_unstable();
        candidates.dedup();

        let rated_ids: HashSet<&str> = preferences
            .iter()
            .filter(|p| p.polarity != Polarity::None)
            .map(|p| p.item_id.as_str())
            .collect();

        let mut liked = BTreeSet::new();
        let mut disliked = BTreeSet::new();
        for signal in preferences {
            let Some(row) = space.row_of(&signal.item_id) else {
                continue;
            };
            if candidates.binary_search(&row).is_err() {
                continue;
            }
            match signal.polarity {
                Polarity::Like => {
                    liked.insert(row);
                }
                Polarity::Dislike => {
                    disliked.insert(row);
                }
                Polarity::None => {}
            }
        }

        if liked.is_empty() {
            debug!(filter = ?filter, "No liked items, using popularity fallback");
            return self.fallback.popular(n, filter).await;
        }

        let profile = Arc::new(build_profile(space, &liked, &disliked));
        let pool: Vec<usize> = candidates
            .into_iter()
            .filter(|row| !liked.contains(row) && !disliked.contains(row))
            .collect();

        let survivors: Vec<usize> = self
            .scan(Arc::clone(&model), profile, pool, n.saturating_mul(2))
            .await?
            .into_sorted_vec()
            .into_iter()
            .map(|entry| entry.row)
            .collect();

        let chosen = DiversityLayer::new(diversity_factor).select(&survivors, n, rng);

        let mut results = Vec::with_capacity(n.min(chosen.len()));
        let mut emitted: HashSet<&str> = HashSet::new();
        for row in chosen {
            if results.len() >= n {
                break;
            }
            let Some(id) = space.id_at(row) else {
                continue;
            };
            if rated_ids.contains(id) || !emitted.insert(id) {
                continue;
            }

            let item_type = match filter.item_type() {
                Some(item_type) => Some(item_type),
                None => self.catalog.item_type(id).await?,
            };
            match item_type {
                Some(item_type) => results.push(RecommendedItem::new(id, item_type)),
                None => debug!(id = id, "Skipping item missing from catalog"),
            }
        }

        info!(
            filter = ?filter,
            liked = liked.len(),
            disliked = disliked.len(),
            survivors = survivors.len(),
            returned = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recommendations computed"
        );

        Ok(results)
    }

    /// Cosine scan of `pool` against `profile` in independent blocking batches
    async fn scan(
        &self,
        model: Arc<LoadedModel>,
        profile: Arc<Array1<f32>>,
        pool: Vec<usize>,
        k: usize,
    ) -> Result<BoundedTopK> {
        let profile_norm = profile.dot(&*profile).sqrt();

        let tasks = pool.chunks(self.scan_batch_size).map(|batch| {
            let batch = batch.to_vec();
            let model = Arc::clone(&model);
            let profile = Arc::clone(&profile);

            tokio::task::spawn_blocking(move || {
                let mut top = BoundedTopK::new(k);
                for row in batch {
                    let dot = model.space.row(row).dot(&*profile);
                    let score = cosine_from_parts(dot, profile_norm, model.space.norm(row));
                    top.push(ScoredRow::new(row, score));
                }
                top
            })
        });

        let partials = futures::future::try_join_all(tasks).await?;
        Ok(partials
            .into_iter()
            .fold(BoundedTopK::new(k), BoundedTopK::merge))
    }

    /// Recommend from the preferences stored for `user_id`
    pub async fn recommend_for_user(
        &self,
        user_id: &str,
        filter: MediaFilter,
        n: usize,
    ) -> Result<RecommendationResult> {
        let preferences = self.preferences.user_preferences(user_id).await?;
        debug!(user_id = user_id, signals = preferences.len(), "Loaded user preferences");
        self.recommend(filter, &preferences, n, self.default_diversity)
            .await
    }

    /// Store a like/dislike (or clear it) after checking the item exists
    pub async fn record_preference(&self, signal: PreferenceSignal) -> Result<()> {
        if !self.catalog.exists(&signal.item_id).await? {
            return Err(AppError::NotFound(format!(
                "Media item {}",
                signal.item_id
            )));
        }
        self.preferences.update_preference(signal).await
    }

    pub async fn popular(&self, n: usize, filter: MediaFilter) -> Result<RecommendationResult> {
        self.fallback.popular(n, filter).await
    }

    pub async fn search(
        &self,
        filter: MediaFilter,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        self.catalog.search(filter, query, limit).await
    }
}

/// mean(liked) − 0.5 × mean(disliked); the penalty applies only with dislikes
fn build_profile(
    space: &ProjectedVectorSpace,
    liked: &BTreeSet<usize>,
    disliked: &BTreeSet<usize>,
) -> Array1<f32> {
    let mut profile = centroid(space, liked);
    if !disliked.is_empty() {
        profile.scaled_add(-DISLIKE_PENALTY, &centroid(space, disliked));
    }
    profile
}

fn centroid(space: &ProjectedVectorSpace, rows: &BTreeSet<usize>) -> Array1<f32> {
    let mut sum = Array1::zeros(space.dim());
    for &row in rows {
        sum += &space.row(row);
    }
    if !rows.is_empty() {
        sum /= rows.len() as f32;
    }
    sum
}
