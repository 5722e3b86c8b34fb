use serde::{Deserialize, Serialize};

/// Min-max scaler for one numeric feature column.
///
/// Fitted only on present values. Missing values, and every value seen by an
/// unfitted scaler, transform to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxNormalizer {
    min: Option<f64>,
    max: Option<f64>,
}

impl MinMaxNormalizer {
    pub fn fit(values: &[Option<f64>]) -> Self {
        let mut present = values.iter().flatten().copied().filter(|v| v.is_finite());

        let Some(first) = present.next() else {
            return Self::default();
        };

        let (min, max) = present.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    pub fn transform(&self, value: Option<f64>) -> f32 {
        let (Some(min), Some(max), Some(value)) = (self.min, self.max, value) else {
            return 0.0;
        };

        let range = max - min;
        let range = if range == 0.0 { 1.0 } else { range };
        ((value - min) / range) as f32
    }

    pub fn transform_all(&self, values: &[Option<f64>]) -> Vec<f32> {
        values.iter().map(|v| self.transform(*v)).collect()
    }
}
