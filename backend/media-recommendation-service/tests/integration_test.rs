use media_recommendation::models::{
    FeatureWeights, MediaFilter, MediaItem, MediaItemType, Polarity, PreferenceSignal,
    RecommendedItem,
};
use media_recommendation::{
    AppError, CatalogStore, FeatureExtractor, InMemoryCatalog, InMemoryPreferences,
    PreferenceStore, RecommendationEngine, VectorCache, VectorComposer,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn media(id: &str, item_type: MediaItemType, title: &str, genres: &[&str], rating: f64) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        item_type,
        title: title.to_string(),
        description: format!("{} story", title),
        creator: String::new(),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        release_date: None,
        pages_runtime: None,
        rating,
    }
}

fn engine_for(
    catalog: Arc<InMemoryCatalog>,
    preferences: Arc<InMemoryPreferences>,
    cache_path: &Path,
) -> RecommendationEngine {
    RecommendationEngine::new(
        catalog as Arc<dyn CatalogStore>,
        preferences as Arc<dyn PreferenceStore>,
        VectorCache::new(cache_path),
        FeatureExtractor::new(4),
        VectorComposer::new(FeatureWeights::default(), 256, 42),
    )
    .with_scan_batch_size(3)
}

async fn ready_engine(items: Vec<MediaItem>, dir: &TempDir) -> RecommendationEngine {
    let engine = engine_for(
        Arc::new(InMemoryCatalog::with_items(items)),
        Arc::new(InMemoryPreferences::new()),
        &dir.path().join("vectors.bin"),
    );
    engine.initialize(false).await.unwrap();
    engine
}

fn like(id: &str) -> PreferenceSignal {
    PreferenceSignal::new("u1", id, Polarity::Like)
}

fn dislike(id: &str) -> PreferenceSignal {
    PreferenceSignal::new("u1", id, Polarity::Dislike)
}

/// Twenty books: one space-opera cluster and one cooking cluster
fn clustered_catalog() -> Vec<MediaItem> {
    let mut items = Vec::new();
    for i in 0..10 {
        items.push(media(
            &format!("space-{}", i),
            MediaItemType::Book,
            &format!("galactic empire starship saga volume{}", i),
            &["scifi"],
            5.0,
        ));
        items.push(media(
            &format!("food-{}", i),
            MediaItemType::Book,
            &format!("kitchen recipes baking bread volume{}", i),
            &["cooking"],
            5.0,
        ));
    }
    items
}

#[tokio::test]
async fn test_no_preferences_returns_highest_rated() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(
        vec![
            media("A", MediaItemType::Book, "alpha", &[], 9.0),
            media("B", MediaItemType::Movie, "bravo", &[], 7.0),
            media("C", MediaItemType::Book, "charlie", &[], 5.0),
        ],
        &dir,
    )
    .await;

    let items = engine.recommend(MediaFilter::All, &[], 2, 0.2).await.unwrap();
    assert_eq!(
        items,
        vec![
            RecommendedItem::new("A", MediaItemType::Book),
            RecommendedItem::new("B", MediaItemType::Movie),
        ]
    );
}

#[tokio::test]
async fn test_like_and_dislike_steer_profile() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(
        vec![
            media("A", MediaItemType::Movie, "galactic empire war", &["scifi"], 5.0),
            media("B", MediaItemType::Movie, "kitchen baking recipes", &["cooking"], 9.0),
            media("C", MediaItemType::Movie, "galactic empire rebellion", &["scifi"], 1.0),
            media("D", MediaItemType::Movie, "kitchen bread recipes", &["cooking"], 8.0),
        ],
        &dir,
    )
    .await;

    let mut rng = StdRng::seed_from_u64(7);
    let items = engine
        .recommend_with_rng(MediaFilter::All, &[like("A"), dislike("B")], 1, 0.0, &mut rng)
        .await
        .unwrap();

    assert_eq!(items, vec![RecommendedItem::new("C", MediaItemType::Movie)]);
}

#[tokio::test]
async fn test_zero_likes_matches_popular() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(clustered_catalog(), &dir).await;

    for filter in [MediaFilter::All, MediaFilter::Book, MediaFilter::Movie] {
        let recommended = engine.recommend(filter, &[], 5, 0.5).await.unwrap();
        let popular = engine.popular(5, filter).await.unwrap();
        assert_eq!(recommended, popular);
    }
}

fn abc_books() -> Vec<MediaItem> {
    vec![
        media("A", MediaItemType::Book, "alpha", &[], 9.0),
        media("B", MediaItemType::Book, "bravo", &[], 7.0),
        media("C", MediaItemType::Book, "charlie", &[], 5.0),
    ]
}

#[tokio::test]
async fn test_dislikes_only_match_popular() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(abc_books(), &dir).await;

    let items = engine
        .recommend(MediaFilter::All, &[dislike("A")], 2, 0.0)
        .await
        .unwrap();
    assert_eq!(items, engine.popular(2, MediaFilter::All).await.unwrap());

    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[tokio::test]
async fn test_huge_limit_returns_whole_catalog() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(abc_books(), &dir).await;

    let fallback = engine
        .recommend(MediaFilter::All, &[dislike("A")], usize::MAX, 0.0)
        .await
        .unwrap();
    assert_eq!(fallback, engine.popular(usize::MAX, MediaFilter::All).await.unwrap());
    assert_eq!(fallback.len(), 3);

    for factor in [0.0, 1.0] {
        let ranked = engine
            .recommend(MediaFilter::All, &[like("A")], usize::MAX / 4, factor)
            .await
            .unwrap();
        let ids: HashSet<&str> = ranked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["B", "C"]));
    }
}

#[tokio::test]
async fn test_results_exclude_rated_and_are_unique() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(clustered_catalog(), &dir).await;

    let preferences = vec![
        like("space-0"),
        like("space-3"),
        dislike("food-1"),
        dislike("space-7"),
        PreferenceSignal::new("u1", "unknown-id", Polarity::Like),
    ];
    let rated: HashSet<&str> = preferences.iter().map(|p| p.item_id.as_str()).collect();

    for (seed, n) in [(1u64, 1usize), (2, 5), (3, 8), (4, 30)] {
        let mut rng = StdRng::seed_from_u64(seed);
        let items = engine
            .recommend_with_rng(MediaFilter::All, &preferences, n, 0.5, &mut rng)
            .await
            .unwrap();

        assert!(items.len() <= n);
        let ids: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.len(), items.len());
        assert!(ids.is_disjoint(&rated));
    }
}

#[tokio::test]
async fn test_similar_items_rank_first() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(clustered_catalog(), &dir).await;

    let mut rng = StdRng::seed_from_u64(11);
    let items = engine
        .recommend_with_rng(MediaFilter::All, &[like("space-0")], 5, 0.0, &mut rng)
        .await
        .unwrap();

    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|i| i.id.starts_with("space-")));
}

#[tokio::test]
async fn test_diversity_draws_from_outside_top_n() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(clustered_catalog(), &dir).await;
    let preferences = [like("space-0")];
    let n = 4;

    let mut rng = StdRng::seed_from_u64(0);
    let top_n: HashSet<String> = engine
        .recommend_with_rng(MediaFilter::All, &preferences, n, 0.0, &mut rng)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(top_n.len(), n);

    for seed in 0..5 {
        let mut rng = StdRng::seed_from_u64(seed);
        let diverse = engine
            .recommend_with_rng(MediaFilter::All, &preferences, n, 1.0, &mut rng)
            .await
            .unwrap();

        assert_eq!(diverse.len(), n);
        let outside = diverse.iter().filter(|i| !top_n.contains(&i.id)).count();
        assert_eq!(outside, n - n / 2);
    }
}

#[tokio::test]
async fn test_type_filter() {
    let dir = TempDir::new().unwrap();
    let mut items = clustered_catalog();
    items.push(media("film-1", MediaItemType::Movie, "galactic empire starship", &["scifi"], 1.0));
    items.push(media("film-2", MediaItemType::Movie, "kitchen recipes", &["cooking"], 2.0));
    let engine = ready_engine(items, &dir).await;

    let mut rng = StdRng::seed_from_u64(5);
    let movies = engine
        .recommend_with_rng(MediaFilter::Movie, &[like("film-1")], 5, 0.0, &mut rng)
        .await
        .unwrap();
    assert_eq!(movies, vec![RecommendedItem::new("film-2", MediaItemType::Movie)]);

    // A liked book does not count toward a movie profile
    let movies = engine
        .recommend(MediaFilter::Movie, &[like("space-0")], 5, 0.0)
        .await
        .unwrap();
    assert_eq!(movies, engine.popular(5, MediaFilter::Movie).await.unwrap());
}

#[tokio::test]
async fn test_empty_catalog() {
    let dir = TempDir::new().unwrap();
    let engine = ready_engine(Vec::new(), &dir).await;

    assert!(engine
        .recommend(MediaFilter::All, &[like("anything")], 5, 0.2)
        .await
        .unwrap()
        .is_empty());
    assert!(engine.popular(5, MediaFilter::All).await.unwrap().is_empty());
    assert_eq!(engine.model_info().await.items, 0);
}

#[tokio::test]
async fn test_recommend_for_user_reads_stored_preferences() {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(InMemoryCatalog::with_items(clustered_catalog()));
    let preferences = Arc::new(InMemoryPreferences::new());
    let engine = engine_for(catalog, preferences.clone(), &dir.path().join("vectors.bin"))
        .with_default_diversity(0.0);
    engine.initialize(false).await.unwrap();

    engine.record_preference(like("food-2")).await.unwrap();
    engine.record_preference(dislike("food-3")).await.unwrap();
    assert_eq!(preferences.user_preferences("u1").await.unwrap().len(), 2);

    let items = engine
        .recommend_for_user("u1", MediaFilter::Book, 3)
        .await
        .unwrap();
    assert_eq!(items.len(), 3);
    assert!(items
        .iter()
        .all(|i| i.id.starts_with("food-") && i.id != "food-2" && i.id != "food-3"));

    let err = engine
        .record_preference(like("not-in-catalog"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_cached_model_serves_same_results() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("vectors.bin");
    let preferences = [like("space-4"), dislike("food-4")];

    let first = engine_for(
        Arc::new(InMemoryCatalog::with_items(clustered_catalog())),
        Arc::new(InMemoryPreferences::new()),
        &cache_path,
    );
    first.initialize(false).await.unwrap();
    assert!(cache_path.exists());

    // Second engine reads the artifact the first one wrote
    let second = engine_for(
        Arc::new(InMemoryCatalog::with_items(clustered_catalog())),
        Arc::new(InMemoryPreferences::new()),
        &cache_path,
    );
    let info = second.initialize(false).await.unwrap();
    assert_eq!(info.items, 20);
    assert_eq!(info.built_at, first.model_info().await.built_at);

    let a = first.recommend(MediaFilter::All, &preferences, 6, 0.0).await.unwrap();
    let b = second.recommend(MediaFilter::All, &preferences, 6, 0.0).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_refresh_picks_up_new_items() {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(InMemoryCatalog::with_items(clustered_catalog()));
    let engine = engine_for(
        catalog.clone(),
        Arc::new(InMemoryPreferences::new()),
        &dir.path().join("vectors.bin"),
    );

    let info = engine.initialize(false).await.unwrap();
    assert_eq!(info.items, 20);
    assert_eq!(info.generation, 1);

    catalog
        .create(media("space-new", MediaItemType::Book, "galactic empire starship", &["scifi"], 1.0))
        .await
        .unwrap();

    // Concurrent refreshes share one build
    let (a, b) = tokio::join!(engine.refresh(), engine.refresh());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.items, 21);
    assert_eq!(b.items, 21);
    assert_eq!(engine.model_info().await.generation, 2);

    let items = engine
        .recommend(MediaFilter::All, &[like("space-0")], 10, 0.0)
        .await
        .unwrap();
    assert!(items.iter().any(|i| i.id == "space-new"));
}
