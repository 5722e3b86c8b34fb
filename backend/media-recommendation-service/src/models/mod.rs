use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance for the weights-sum-to-one invariant
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaItemType {
    Book,
    Movie,
}

impl MediaItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaItemType::Book => "book",
            MediaItemType::Movie => "movie",
        }
    }
}

impl fmt::Display for MediaItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog filter applied to recommendation, popularity and search lookups
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaFilter {
    Book,
    Movie,
    #[default]
    All,
}

impl MediaFilter {
    pub fn matches(&self, item_type: MediaItemType) -> bool {
        match self {
            MediaFilter::All => true,
            MediaFilter::Book => item_type == MediaItemType::Book,
            MediaFilter::Movie => item_type == MediaItemType::Movie,
        }
    }

    /// The concrete type this filter pins, `None` for `All`
    pub fn item_type(&self) -> Option<MediaItemType> {
        match self {
            MediaFilter::Book => Some(MediaItemType::Book),
            MediaFilter::Movie => Some(MediaItemType::Movie),
            MediaFilter::All => None,
        }
    }
}

/// A catalog record as read from the document store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: MediaItemType,
    pub title: String,
    pub description: String,
    pub creator: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pages_runtime: Option<i64>,
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Like,
    Dislike,
    #[default]
    #[serde(rename = "")]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreferenceSignal {
    pub user_id: String,
    #[serde(alias = "media_item_id")]
    pub item_id: String,
    #[serde(alias = "preference")]
    pub polarity: Polarity,
}

impl PreferenceSignal {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<String>, polarity: Polarity) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            polarity,
        }
    }
}

/// One entry of a recommendation, popularity or search response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendedItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: MediaItemType,
}

impl RecommendedItem {
    pub fn new(id: impl Into<String>, item_type: MediaItemType) -> Self {
        Self {
            id: id.into(),
            item_type,
        }
    }
}

pub type RecommendationResult = Vec<RecommendedItem>;

/// Search hit with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: MediaItemType,
    pub score: f64,
}

/// Feature columns extracted from a catalog record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Title,
    Description,
    Creator,
    Genres,
    ReleaseDate,
    PagesRuntime,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Title,
        Feature::Description,
        Feature::Creator,
        Feature::Genres,
        Feature::ReleaseDate,
        Feature::PagesRuntime,
    ];

    pub const TEXT: [Feature; 4] = [
        Feature::Title,
        Feature::Description,
        Feature::Creator,
        Feature::Genres,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Title => "title",
            Feature::Description => "description",
            Feature::Creator => "creator",
            Feature::Genres => "genres",
            Feature::ReleaseDate => "release_date",
            Feature::PagesRuntime => "pages_runtime",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-feature weights used when composing item vectors.
///
/// Every weight lies in [0, 1] and the weights sum to 1.0 within
/// [`WEIGHT_SUM_TOLERANCE`]. Invalid mappings are rejected, never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    entries: Vec<(Feature, f64)>,
}

impl FeatureWeights {
    pub fn new(
        title: f64,
        description: f64,
        creator: f64,
        genres: f64,
        release_date: f64,
        pages_runtime: f64,
    ) -> Result<Self> {
        Self::from_pairs([
            (Feature::Title, title),
            (Feature::Description, description),
            (Feature::Creator, creator),
            (Feature::Genres, genres),
            (Feature::ReleaseDate, release_date),
            (Feature::PagesRuntime, pages_runtime),
        ])
    }

    /// Build from an arbitrary subset of features. Order is kept and drives
    /// the column layout of the composite vector.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Feature, f64)>) -> Result<Self> {
        let mut entries: Vec<(Feature, f64)> = Vec::new();

        for (feature, weight) in pairs {
            if entries.iter().any(|(f, _)| *f == feature) {
                return Err(AppError::Configuration(format!(
                    "Duplicate weight for feature {}",
                    feature
                )));
            }
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(AppError::Configuration(format!(
                    "Weight for {} must be between 0 and 1, got {}",
                    feature, weight
                )));
            }
            entries.push((feature, weight));
        }

        let sum: f64 = entries.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AppError::Configuration(format!(
                "Weights must sum to 1, got {}",
                sum
            )));
        }

        Ok(Self { entries })
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.entries
            .iter()
            .find(|(f, _)| *f == feature)
            .map(|(_, w)| *w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.entries.iter().copied()
    }
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            entries: vec![
                (Feature::Title, 0.15),
                (Feature::Description, 0.3),
                (Feature::Creator, 0.1),
                (Feature::Genres, 0.25),
                (Feature::ReleaseDate, 0.1),
                (Feature::PagesRuntime, 0.1),
            ],
        }
    }
}
