//! Dense score matrix produced by sub-model scoring.
//!
//! A [`ScoreMatrix`] holds one row per queried user and one column per
//! candidate item. It is produced fresh for every query batch and never
//! persisted; only the model state that produces it is persisted.

use crate::error::{MedleyError, Result};

/// A dense row-major matrix of ranking scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    num_rows: usize,
    num_cols: usize,
    data: Vec<f64>,
}

impl ScoreMatrix {
    /// Create a zero-filled matrix.
    pub fn zeros(num_rows: usize, num_cols: usize) -> Self {
        ScoreMatrix {
            num_rows,
            num_cols,
            data: vec![0.0; num_rows * num_cols],
        }
    }

    /// Create a matrix from a flat row-major buffer.
    pub fn from_vec(num_rows: usize, num_cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != num_rows * num_cols {
            return Err(MedleyError::invalid_argument(format!(
                "buffer of length {} does not match {}x{} matrix",
                data.len(),
                num_rows,
                num_cols
            )));
        }
        Ok(ScoreMatrix {
            num_rows,
            num_cols,
            data,
        })
    }

    /// Number of rows (queried users).
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns (candidate items).
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// One row of scores.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.num_cols..(row + 1) * self.num_cols]
    }

    /// Mutable access to one row of scores.
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.num_cols..(row + 1) * self.num_cols]
    }

    /// The flat row-major buffer.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Mutable access to the flat row-major buffer.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Mean over every entry in the matrix.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Population standard deviation over every entry in the matrix.
    pub fn std_dev(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .data
            .iter()
            .map(|&value| (value - mean).powi(2))
            .sum::<f64>()
            / self.data.len() as f64;
        variance.sqrt()
    }

    /// Add `weight * other` into this matrix in place.
    pub fn add_scaled(&mut self, other: &ScoreMatrix, weight: f64) -> Result<()> {
        if self.num_rows != other.num_rows || self.num_cols != other.num_cols {
            return Err(MedleyError::fusion(format!(
                "cannot combine {}x{} with {}x{} score matrices",
                self.num_rows, self.num_cols, other.num_rows, other.num_cols
            )));
        }
        for (dst, &src) in self.data.iter_mut().zip(other.data.iter()) {
            *dst += weight * src;
        }
        Ok(())
    }

    /// Mask every column not in `candidates` to negative infinity.
    ///
    /// Masked entries sort last, so restriction to a candidate set composes
    /// with top-K ranking without a separate filter pass.
    pub fn restrict_to(&mut self, candidates: &[u32]) {
        let mut keep = vec![false; self.num_cols];
        for &item in candidates {
            if (item as usize) < self.num_cols {
                keep[item as usize] = true;
            }
        }
        for row in 0..self.num_rows {
            for (col, value) in self.row_mut(row).iter_mut().enumerate() {
                if !keep[col] {
                    *value = f64::NEG_INFINITY;
                }
            }
        }
    }
}

/// Rank the `k` best items in one score row, skipping excluded items.
///
/// Ordering is by score descending with ties broken by ascending item id, so
/// the ranking is deterministic for deterministic scores. Entries that are
/// NaN or negative infinity never appear in the result.
pub fn top_k(row: &[f64], k: usize, exclude: &[u32]) -> Vec<u32> {
    let mut excluded = vec![false; row.len()];
    for &item in exclude {
        if (item as usize) < row.len() {
            excluded[item as usize] = true;
        }
    }

    let mut candidates: Vec<(u32, f64)> = row
        .iter()
        .enumerate()
        .filter(|&(item, &score)| !excluded[item] && score.is_finite())
        .map(|(item, &score)| (item as u32, score))
        .collect();

    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    candidates.truncate(k);
    candidates.into_iter().map(|(item, _)| item).collect()
}
