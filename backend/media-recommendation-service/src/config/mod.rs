use crate::error::{AppError, Result};
use crate::models::FeatureWeights;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Catalog seed for the in-memory document store
    pub catalog_path: String,
    pub preferences_path: Option<String>,

    // Vector cache artifact
    pub vector_cache_path: String,
    pub force_recompute: bool,

    // Model build
    pub projection_dim: usize,
    pub projection_seed: u64,
    pub extraction_batch_size: usize,

    // Retrieval
    pub scan_batch_size: usize,
    pub default_diversity_factor: f64,
    pub default_limit: usize,

    // Feature weights
    pub weight_title: f64,
    pub weight_description: f64,
    pub weight_creator: f64,
    pub weight_genres: f64,
    pub weight_release_date: f64,
    pub weight_pages_runtime: f64,

    // Observability
    pub log_level: String,
    pub log_format: String,

    /// When set, the binary prints recommendations for this user after loading
    pub demo_user: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("catalog_path", "data/media_items.json")?
            .set_default("vector_cache_path", "data/vectors.bin")?
            .set_default("force_recompute", false)?
            .set_default("projection_dim", 200)?
            .set_default("projection_seed", 42)?
            .set_default("extraction_batch_size", 10_000)?
            .set_default("scan_batch_size", 10_000)?
            .set_default("default_diversity_factor", 0.2)?
            .set_default("default_limit", 10)?
            .set_default("weight_title", 0.15)?
            .set_default("weight_description", 0.3)?
            .set_default("weight_creator", 0.1)?
            .set_default("weight_genres", 0.25)?
            .set_default("weight_release_date", 0.1)?
            .set_default("weight_pages_runtime", 0.1)?
            .set_default("log_level", "info")?
            .set_default("log_format", "text")?
            .add_source(config::Environment::with_prefix("RECOMMENDER").try_parsing(true))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vector_cache_path.is_empty() {
            return Err(AppError::Configuration(
                "Vector cache path is required".to_string(),
            ));
        }

        if self.projection_dim == 0 {
            return Err(AppError::Configuration(
                "Projection dimension must be greater than 0".to_string(),
            ));
        }

        if self.extraction_batch_size == 0 || self.scan_batch_size == 0 {
            return Err(AppError::Configuration(
                "Batch sizes must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.default_diversity_factor) {
            return Err(AppError::Configuration(format!(
                "Diversity factor must be between 0 and 1, got {}",
                self.default_diversity_factor
            )));
        }

        self.feature_weights().map(|_| ())
    }

    pub fn feature_weights(&self) -> Result<FeatureWeights> {
        FeatureWeights::new(
            self.weight_title,
            self.weight_description,
            self.weight_creator,
            self.weight_genres,
            self.weight_release_date,
            self.weight_pages_runtime,
        )
    }
}
