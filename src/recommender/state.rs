//! Serializable sub-model state.
//!
//! Everything a recommender persists is expressed as a [`StateValue`]: a
//! tagged union over the handful of shapes that occur in practice (scalars,
//! flags, dense vectors and matrices, sparse matrices). A [`StateMap`] is
//! the named collection of those values that `export_state` produces and
//! `import_state` consumes; `BTreeMap` keeps serialization order stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MedleyError, Result};
use crate::matrix::CsrMatrix;

/// One persisted piece of model state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    /// A single number (a fusion weight, a shrink term, ...).
    Scalar(f64),
    /// A boolean flag (normalization enabled, ...).
    Flag(bool),
    /// A dense vector (item popularity counts, a weight list, ...).
    DenseVector(Vec<f64>),
    /// A dense matrix in row-major layout (latent factor blocks, ...).
    DenseMatrix {
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    },
    /// A sparse matrix (learned item-item similarity, ...).
    Sparse(CsrMatrix),
}

impl StateValue {
    /// Short shape description used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            StateValue::Scalar(_) => "scalar",
            StateValue::Flag(_) => "flag",
            StateValue::DenseVector(_) => "dense vector",
            StateValue::DenseMatrix { .. } => "dense matrix",
            StateValue::Sparse(_) => "sparse matrix",
        }
    }

    /// Unwrap a scalar, or fail with a bundle-load shape error.
    pub fn expect_scalar(&self, key: &str) -> Result<f64> {
        match self {
            StateValue::Scalar(value) => Ok(*value),
            other => Err(shape_error(key, "scalar", other)),
        }
    }

    /// Unwrap a flag, or fail with a bundle-load shape error.
    pub fn expect_flag(&self, key: &str) -> Result<bool> {
        match self {
            StateValue::Flag(value) => Ok(*value),
            other => Err(shape_error(key, "flag", other)),
        }
    }

    /// Unwrap a dense vector, or fail with a bundle-load shape error.
    pub fn expect_dense_vector(&self, key: &str) -> Result<&[f64]> {
        match self {
            StateValue::DenseVector(values) => Ok(values),
            other => Err(shape_error(key, "dense vector", other)),
        }
    }

    /// Unwrap a sparse matrix, or fail with a bundle-load shape error.
    pub fn expect_sparse(&self, key: &str) -> Result<&CsrMatrix> {
        match self {
            StateValue::Sparse(matrix) => Ok(matrix),
            other => Err(shape_error(key, "sparse matrix", other)),
        }
    }
}

fn shape_error(key: &str, expected: &str, found: &StateValue) -> MedleyError {
    MedleyError::bundle_load(format!(
        "key '{}' holds a {}, expected a {}",
        key,
        found.kind(),
        expected
    ))
}

/// Named collection of persisted state values.
pub type StateMap = BTreeMap<String, StateValue>;
