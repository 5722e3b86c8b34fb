use crate::error::Result;
use crate::models::{MediaFilter, RecommendationResult};
use crate::store::CatalogStore;
use std::sync::Arc;
use tracing::debug;

/// Popularity fallback used when a user has no positive signal.
///
/// Ranking is by static catalog rating; ties keep catalog order.
pub struct PopularityFallback {
    catalog: Arc<dyn CatalogStore>,
}

impl PopularityFallback {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    pub async fn popular(&self, n: usize, filter: MediaFilter) -> Result<RecommendationResult> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let items = self.catalog.popular(n, filter).await?;
        debug!(filter = ?filter, requested = n, returned = items.len(), "Popularity fallback");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{MediaItemType, RecommendedItem};
    use crate::store::MockCatalogStore;

    #[tokio::test]
    async fn test_delegates_to_catalog() {
        let mut store = MockCatalogStore::new();
        store
            .expect_popular()
            .withf(|n, filter| *n == 2 && *filter == MediaFilter::Movie)
            .returning(|_, _| Ok(vec![RecommendedItem::new("m1", MediaItemType::Movie)]));

        let fallback = PopularityFallback::new(Arc::new(store));
        let items = fallback.popular(2, MediaFilter::Movie).await.unwrap();
        assert_eq!(items, vec![RecommendedItem::new("m1", MediaItemType::Movie)]);
    }

    #[tokio::test]
    async fn test_zero_limit_skips_store() {
        let fallback = PopularityFallback::new(Arc::new(MockCatalogStore::new()));
        assert!(fallback.popular(0, MediaFilter::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let mut store = MockCatalogStore::new();
        store
            .expect_popular()
            .returning(|_, _| Err(AppError::Store("offline".to_string())));

        let fallback = PopularityFallback::new(Arc::new(store));
        assert!(matches!(
            fallback.popular(3, MediaFilter::All).await,
            Err(AppError::Store(_))
        ));
    }
}
