use anyhow::{Context, Result};
use media_recommendation::models::MediaFilter;
use media_recommendation::{
    CatalogStore, Config, InMemoryCatalog, InMemoryPreferences, PreferenceStore,
    RecommendationEngine,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if config.log_format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config);

    info!(
        catalog = %config.catalog_path,
        cache = %config.vector_cache_path,
        "Starting media-recommendation-service"
    );

    let catalog: Arc<dyn CatalogStore> = Arc::new(
        InMemoryCatalog::from_json_file(&config.catalog_path)
            .context("Failed to load media catalog")?,
    );

    let preferences: Arc<dyn PreferenceStore> = match &config.preferences_path {
        Some(path) => Arc::new(
            InMemoryPreferences::from_json_file(path).context("Failed to load preferences")?,
        ),
        None => Arc::new(InMemoryPreferences::new()),
    };

    let engine = RecommendationEngine::from_config(&config, catalog, preferences)
        .context("Invalid recommendation engine configuration")?;

    let model = engine
        .initialize(config.force_recompute)
        .await
        .context("Failed to load recommendation model")?;

    info!(
        items = model.items,
        projection_dim = model.projection_dim,
        feature_sizes = ?model.feature_sizes,
        built_at = %model.built_at,
        "Recommendation model ready"
    );

    if let Some(user_id) = &config.demo_user {
        let items = engine
            .recommend_for_user(user_id, MediaFilter::All, config.default_limit)
            .await
            .with_context(|| format!("Failed to recommend for user {}", user_id))?;

        info!(user_id = %user_id, count = items.len(), "Demo recommendations");
        println!("{}", serde_json::to_string_pretty(&items)?);
    }

    Ok(())
}
