//! Sparse and dense matrix types shared by every sub-model.

pub mod dense;
pub mod sparse;

pub use dense::{ScoreMatrix, top_k};
pub use sparse::CsrMatrix;
