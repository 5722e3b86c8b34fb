pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::{
    FeatureExtractor, ModelInfo, RecommendationEngine, VectorCache, VectorComposer,
};
pub use store::{CatalogStore, InMemoryCatalog, InMemoryPreferences, PreferenceStore};
