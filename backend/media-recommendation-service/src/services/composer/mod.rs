//! Vector composition
//!
//! Weighted column concatenation of the per-feature matrices followed by a
//! seeded Gaussian random projection into a fixed dense space.

use crate::error::{AppError, Result};
use crate::models::{Feature, FeatureWeights};
use crate::services::features::{CsrMatrix, ItemVectorSet};
use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Dense `n_items × d` projection of the catalog with an id → row index
#[derive(Debug, Clone)]
pub struct ProjectedVectorSpace {
    vectors: Array2<f32>,
    item_ids: Vec<String>,
    index: HashMap<String, usize>,
    norms: Vec<f32>,
    pub feature_sizes: BTreeMap<Feature, usize>,
    pub built_at: DateTime<Utc>,
}

impl ProjectedVectorSpace {
    pub fn new(
        vectors: Array2<f32>,
        item_ids: Vec<String>,
        feature_sizes: BTreeMap<Feature, usize>,
        built_at: DateTime<Utc>,
    ) -> Result<Self> {
        if vectors.nrows() != item_ids.len() {
            return Err(AppError::Internal(format!(
                "Projected rows {} do not match item count {}",
                vectors.nrows(),
                item_ids.len()
            )));
        }

        let index = item_ids
            .iter()
            .enumerate()
            .map(|(row, id)| (id.clone(), row))
            .collect();
        let norms = vectors.rows().into_iter().map(|r| r.dot(&r).sqrt()).collect();

        Ok(Self {
            vectors,
            item_ids,
            index,
            norms,
            feature_sizes,
            built_at,
        })
    }

    /// Space with no items, used before the first model load
    pub fn empty(dim: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dim)),
            item_ids: Vec::new(),
            index: HashMap::new(),
            norms: Vec::new(),
            feature_sizes: BTreeMap::new(),
            built_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id_at(&self, row: usize) -> Option<&str> {
        self.item_ids.get(row).map(String::as_str)
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, f32> {
        self.vectors.row(row)
    }

    pub fn norm(&self, row: usize) -> f32 {
        self.norms[row]
    }
}

/// Gaussian random projection with entries drawn from N(0, 1/d)
#[derive(Debug, Clone)]
pub struct RandomProjection {
    components: Array2<f32>,
}

impl RandomProjection {
    pub fn fit(input_dim: usize, output_dim: usize, seed: u64) -> Result<Self> {
        if output_dim == 0 {
            return Err(AppError::Configuration(
                "Projection dimension must be greater than 0".to_string(),
            ));
        }

        let std_dev = (1.0 / output_dim as f64).sqrt() as f32;
        let normal =
            Normal::new(0.0f32, std_dev).map_err(|e| AppError::Configuration(e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(seed);

        let components = Array2::from_shape_fn((input_dim, output_dim), |_| normal.sample(&mut rng));
        Ok(Self { components })
    }

    pub fn input_dim(&self) -> usize {
        self.components.nrows()
    }

    pub fn output_dim(&self) -> usize {
        self.components.ncols()
    }

    /// Sparse rows × components, touching only stored entries
    pub fn project(&self, matrix: &CsrMatrix) -> Result<Array2<f32>> {
        if matrix.cols() != self.input_dim() {
            return Err(AppError::Internal(format!(
                "Projection expects {} columns, got {}",
                self.input_dim(),
                matrix.cols()
            )));
        }

        let mut out = Array2::zeros((matrix.rows(), self.output_dim()));
        for i in 0..matrix.rows() {
            let (cols, values) = matrix.row(i);
            let mut target = out.row_mut(i);
            for (&col, &value) in cols.iter().zip(values) {
                target.scaled_add(value, &self.components.row(col));
            }
        }
        Ok(out)
    }
}

/// Builds the composite sparse matrix and its dense projection
#[derive(Debug, Clone)]
pub struct VectorComposer {
    weights: FeatureWeights,
    projection_dim: usize,
    seed: u64,
}

impl VectorComposer {
    pub fn new(weights: FeatureWeights, projection_dim: usize, seed: u64) -> Self {
        Self {
            weights,
            projection_dim,
            seed,
        }
    }

    pub fn projection_dim(&self) -> usize {
        self.projection_dim
    }

    /// Scale each feature matrix by its weight and concatenate columns.
    ///
    /// Column blocks follow the fixed feature order. Features missing from
    /// either the weights or the vector set are skipped.
    pub fn compose(&self, set: &ItemVectorSet) -> CsrMatrix {
        let blocks: Vec<CsrMatrix> = Feature::ALL
            .iter()
            .filter_map(|&feature| {
                let weight = self.weights.get(feature)?;
                let matrix = set.matrix(feature)?;
                Some(matrix.scaled(weight as f32))
            })
            .collect();

        if blocks.is_empty() {
            return CsrMatrix::zeros(set.len(), 0);
        }
        CsrMatrix::hstack(&blocks)
    }

    /// Compose and project the whole catalog. CPU bound.
    pub fn build_space(&self, set: &ItemVectorSet) -> Result<ProjectedVectorSpace> {
        let composite = self.compose(set);
        debug!(
            rows = composite.rows(),
            cols = composite.cols(),
            nnz = composite.nnz(),
            "Composite matrix built"
        );

        let projection = RandomProjection::fit(composite.cols(), self.projection_dim, self.seed)?;
        let vectors = projection.project(&composite)?;

        info!(
            items = set.len(),
            input_dim = composite.cols(),
            projection_dim = self.projection_dim,
            "Vector space projected"
        );

        ProjectedVectorSpace::new(
            vectors,
            set.item_ids.clone(),
            set.feature_sizes.clone(),
            set.built_at,
        )
    }
}
