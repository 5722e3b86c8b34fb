pub mod cache;
pub mod composer;
pub mod fallback;
pub mod features;
pub mod retrieval;

pub use cache::VectorCache;
pub use composer::{ProjectedVectorSpace, RandomProjection, VectorComposer};
pub use fallback::PopularityFallback;
pub use features::{FeatureExtractor, ItemVectorSet};
pub use retrieval::{DiversityLayer, ModelInfo, RecommendationEngine};
