use serde::{Deserialize, Serialize};

/// Compressed sparse row matrix of `f32` values.
///
/// Row `i` owns `indices[indptr[i]..indptr[i + 1]]` (column ids, ascending)
/// and the matching slice of `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f32>,
}

impl CsrMatrix {
    /// Empty matrix with `rows` rows and `cols` columns
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            indptr: vec![0; rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build from per-row `(column, value)` entries.
    ///
    /// Entries are sorted by column; explicit zeros are dropped.
    pub fn from_rows(cols: usize, rows: Vec<Vec<(usize, f32)>>) -> Self {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        let row_count = rows.len();
        for mut row in rows {
            row.sort_by_key(|(col, _)| *col);
            for (col, value) in row {
                debug_assert!(col < cols, "column {} out of bounds {}", col, cols);
                if value != 0.0 {
                    indices.push(col);
                    data.push(value);
                }
            }
            indptr.push(indices.len());
        }

        Self {
            rows: row_count,
            cols,
            indptr,
            indices,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column ids and values of one row
    pub fn row(&self, i: usize) -> (&[usize], &[f32]) {
        let start = self.indptr[i];
        let end = self.indptr[i + 1];
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Copy of this matrix with every value multiplied by `factor`
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            data: self.data.iter().map(|v| v * factor).collect(),
            ..self.clone()
        }
    }

    /// Stack matrices side by side. All inputs must share the row count.
    pub fn hstack(blocks: &[CsrMatrix]) -> Self {
        let rows = blocks.first().map(|b| b.rows).unwrap_or(0);
        let cols: usize = blocks.iter().map(|b| b.cols).sum();

        let mut merged: Vec<Vec<(usize, f32)>> = vec![Vec::new(); rows];
        let mut offset = 0;
        for block in blocks {
            assert_eq!(block.rows, rows, "hstack requires equal row counts");
            for (i, row) in merged.iter_mut().enumerate() {
                let (block_cols, values) = block.row(i);
                row.extend(
                    block_cols
                        .iter()
                        .zip(values)
                        .map(|(&c, &v)| (c + offset, v)),
                );
            }
            offset += block.cols;
        }

        Self::from_rows(cols, merged)
    }

    /// Dense copy of one row (tests and debugging)
    pub fn row_dense(&self, i: usize) -> Vec<f32> {
        let mut out = vec![0.0; self.cols];
        let (cols, values) = self.row(i);
        for (&c, &v) in cols.iter().zip(values) {
            out[c] = v;
        }
        out
    }
}
