//! Compressed sparse row matrix used for interaction and similarity data.
//!
//! The URM (user-item interaction matrix), ICM (item-content matrix) and
//! learned item-item similarity matrices are all [`CsrMatrix`] values. Rows
//! are immutable once the matrix is built; every mutation-style operation
//! returns a new matrix.

use serde::{Deserialize, Serialize};

use crate::error::{MedleyError, Result};

/// A sparse matrix in compressed sparse row layout with `f64` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    num_rows: usize,
    num_cols: usize,
    /// Row pointer array, length `num_rows + 1`.
    indptr: Vec<usize>,
    /// Column index per stored entry, sorted ascending within each row.
    indices: Vec<u32>,
    /// Stored values, parallel to `indices`.
    data: Vec<f64>,
}

impl CsrMatrix {
    /// Create an empty matrix with the given shape.
    pub fn zeros(num_rows: usize, num_cols: usize) -> Self {
        CsrMatrix {
            num_rows,
            num_cols,
            indptr: vec![0; num_rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build a matrix from COO triplets `(row, col, value)`.
    ///
    /// Duplicate coordinates are accumulated by summation, matching the
    /// usual sparse-constructor semantics. Out-of-range coordinates are an
    /// error.
    pub fn from_triplets(
        num_rows: usize,
        num_cols: usize,
        triplets: &[(u32, u32, f64)],
    ) -> Result<Self> {
        for &(row, col, _) in triplets {
            if row as usize >= num_rows || col as usize >= num_cols {
                return Err(MedleyError::invalid_argument(format!(
                    "triplet ({row}, {col}) out of range for {num_rows}x{num_cols} matrix"
                )));
            }
        }

        let mut sorted: Vec<(u32, u32, f64)> = triplets.to_vec();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut indptr = vec![0usize; num_rows + 1];
        let mut indices = Vec::with_capacity(sorted.len());
        let mut data: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut previous: Option<(u32, u32)> = None;

        for (row, col, value) in sorted {
            if previous == Some((row, col)) {
                // Accumulate duplicate coordinate.
                if let Some(last) = data.last_mut() {
                    *last += value;
                }
            } else {
                indices.push(col);
                data.push(value);
                indptr[row as usize + 1] += 1;
                previous = Some((row, col));
            }
        }

        // Convert per-row counts into offsets.
        for row in 0..num_rows {
            indptr[row + 1] += indptr[row];
        }

        Ok(CsrMatrix {
            num_rows,
            num_cols,
            indptr,
            indices,
            data,
        })
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Number of stored entries in one row (the user's profile length when
    /// this matrix is a URM).
    pub fn row_nnz(&self, row: usize) -> usize {
        self.indptr[row + 1] - self.indptr[row]
    }

    /// Column indices and values of one row.
    pub fn row(&self, row: usize) -> (&[u32], &[f64]) {
        let start = self.indptr[row];
        let end = self.indptr[row + 1];
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Iterate all stored entries as `(row, col, value)` triplets.
    pub fn iter_triplets(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        (0..self.num_rows).flat_map(move |row| {
            let (cols, vals) = self.row(row);
            cols.iter()
                .zip(vals.iter())
                .map(move |(&col, &val)| (row as u32, col, val))
        })
    }

    /// Transpose into a new CSR matrix.
    pub fn transpose(&self) -> CsrMatrix {
        let mut indptr = vec![0usize; self.num_cols + 1];
        for &col in &self.indices {
            indptr[col as usize + 1] += 1;
        }
        for col in 0..self.num_cols {
            indptr[col + 1] += indptr[col];
        }

        let mut cursor = indptr.clone();
        let mut indices = vec![0u32; self.nnz()];
        let mut data = vec![0f64; self.nnz()];
        for row in 0..self.num_rows {
            let (cols, vals) = self.row(row);
            for (&col, &val) in cols.iter().zip(vals.iter()) {
                let pos = cursor[col as usize];
                indices[pos] = row as u32;
                data[pos] = val;
                cursor[col as usize] += 1;
            }
        }

        CsrMatrix {
            num_rows: self.num_cols,
            num_cols: self.num_rows,
            indptr,
            indices,
            data,
        }
    }

    /// Weighted element-wise sum `alpha * self + beta * other`.
    ///
    /// Both operands must share the same shape. This is the similarity-level
    /// blending primitive.
    pub fn add_weighted(&self, alpha: f64, other: &CsrMatrix, beta: f64) -> Result<CsrMatrix> {
        if self.num_rows != other.num_rows || self.num_cols != other.num_cols {
            return Err(MedleyError::fusion(format!(
                "cannot blend {}x{} with {}x{} similarity matrices",
                self.num_rows, self.num_cols, other.num_rows, other.num_cols
            )));
        }

        let mut indptr = vec![0usize; self.num_rows + 1];
        let mut indices = Vec::with_capacity(self.nnz() + other.nnz());
        let mut data = Vec::with_capacity(self.nnz() + other.nnz());

        for row in 0..self.num_rows {
            let (cols_a, vals_a) = self.row(row);
            let (cols_b, vals_b) = other.row(row);
            let (mut i, mut j) = (0usize, 0usize);

            // Merge two sorted rows.
            while i < cols_a.len() || j < cols_b.len() {
                let (col, val) = if j >= cols_b.len()
                    || (i < cols_a.len() && cols_a[i] < cols_b[j])
                {
                    let entry = (cols_a[i], alpha * vals_a[i]);
                    i += 1;
                    entry
                } else if i >= cols_a.len() || cols_b[j] < cols_a[i] {
                    let entry = (cols_b[j], beta * vals_b[j]);
                    j += 1;
                    entry
                } else {
                    let entry = (cols_a[i], alpha * vals_a[i] + beta * vals_b[j]);
                    i += 1;
                    j += 1;
                    entry
                };
                indices.push(col);
                data.push(val);
            }
            indptr[row + 1] = indices.len();
        }

        Ok(CsrMatrix {
            num_rows: self.num_rows,
            num_cols: self.num_cols,
            indptr,
            indices,
            data,
        })
    }

    /// Keep only the `k` largest-valued entries per row.
    ///
    /// Ties are resolved toward the lower column index so the result does
    /// not depend on the internal sort implementation.
    pub fn prune_top_k(&self, k: usize) -> CsrMatrix {
        let mut indptr = vec![0usize; self.num_rows + 1];
        let mut indices = Vec::new();
        let mut data = Vec::new();

        for row in 0..self.num_rows {
            let (cols, vals) = self.row(row);
            let mut entries: Vec<(u32, f64)> =
                cols.iter().copied().zip(vals.iter().copied()).collect();
            entries.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            entries.truncate(k);
            // Restore column order within the row.
            entries.sort_by_key(|&(col, _)| col);

            for (col, val) in entries {
                indices.push(col);
                data.push(val);
            }
            indptr[row + 1] = indices.len();
        }

        CsrMatrix {
            num_rows: self.num_rows,
            num_cols: self.num_cols,
            indptr,
            indices,
            data,
        }
    }
}
