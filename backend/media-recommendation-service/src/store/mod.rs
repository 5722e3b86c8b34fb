//! Document store contracts
//!
//! The engine never talks to a database directly. Raw catalog records and
//! preference signals live behind these two traits; `memory` provides the
//! in-process implementation used by the binary and the tests.

pub mod memory;

pub use memory::{InMemoryCatalog, InMemoryPreferences};

use crate::error::Result;
use crate::models::{
    MediaFilter, MediaItem, MediaItemType, PreferenceSignal, Polarity, RecommendedItem, SearchHit,
};
use async_trait::async_trait;

/// Read/write contract over the media item collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Total number of catalog records
    async fn count(&self) -> Result<usize>;

    /// One page of records in stable catalog order
    async fn page(&self, offset: usize, limit: usize) -> Result<Vec<MediaItem>>;

    /// Ids of every record with the given type, in catalog order
    async fn ids_of_type(&self, item_type: MediaItemType) -> Result<Vec<String>>;

    /// Authoritative type of a record, `None` when the id is unknown
    async fn item_type(&self, id: &str) -> Result<Option<MediaItemType>>;

    async fn exists(&self, id: &str) -> Result<bool>;

    /// Highest-rated records, ties kept in catalog order
    async fn popular(&self, n: usize, filter: MediaFilter) -> Result<Vec<RecommendedItem>>;

    /// Text search over title, creator and description
    async fn search(&self, filter: MediaFilter, query: &str, limit: usize)
        -> Result<Vec<SearchHit>>;

    async fn get(&self, id: &str) -> Result<Option<MediaItem>>;

    async fn create(&self, item: MediaItem) -> Result<()>;

    async fn update(&self, item: MediaItem) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Read/write contract over user preference signals
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn user_preferences(&self, user_id: &str) -> Result<Vec<PreferenceSignal>>;

    /// Upsert a signal; `Polarity::None` removes the stored record
    async fn update_preference(&self, signal: PreferenceSignal) -> Result<()>;

    async fn preference_for(&self, user_id: &str, item_id: &str) -> Result<Polarity>;

    /// (likes, dislikes) recorded for an item across all users
    async fn media_preference_counts(&self, item_id: &str) -> Result<(usize, usize)>;
}
