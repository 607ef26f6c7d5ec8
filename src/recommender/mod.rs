//! The sub-model capability interface and the baseline recommenders.
//!
//! The fusion engine, the bundle store and the experiment runner all talk to
//! models through [`Recommender`]: fit with a hyperparameter set, score a
//! user batch, and move persisted state in and out. Anything that satisfies
//! the contract can be fused; the two baselines in this module double as
//! fusion components and as test fixtures.

pub mod item_knn;
pub mod params;
pub mod state;
pub mod top_pop;

pub use item_knn::ItemKnn;
pub use params::FitParams;
pub use state::{StateMap, StateValue};
pub use top_pop::TopPop;

use crate::error::Result;
use crate::matrix::{CsrMatrix, ScoreMatrix};

/// Capability interface for any trained scoring model.
///
/// Implementations must be deterministic: fixed state and a fixed query
/// batch always yield the same score matrix. Scoring an unfitted model is a
/// `Scoring` error, never a panic.
pub trait Recommender: Send {
    /// Stable name of this recommender, used as the bundle key prefix and
    /// in run-log lines.
    fn name(&self) -> &str;

    /// Train the model on its interaction matrix with the given
    /// hyperparameters. Missing parameters fall back to per-model defaults.
    fn fit(&mut self, params: &FitParams) -> Result<()>;

    /// Compute a dense score matrix with one row per entry of `users` and
    /// one column per item.
    ///
    /// When `candidates` is given, columns outside the candidate set are
    /// masked to negative infinity after scoring.
    fn compute_scores(&self, users: &[u32], candidates: Option<&[u32]>) -> Result<ScoreMatrix>;

    /// Export every persisted array/scalar of this model under its own key
    /// names.
    fn export_state(&self) -> Result<StateMap>;

    /// Restore model state previously produced by [`export_state`].
    ///
    /// A recognized key with an incompatible shape is a `BundleLoad` error.
    /// Importing a complete state leaves the model scoreable without a new
    /// `fit`.
    ///
    /// [`export_state`]: Recommender::export_state
    fn import_state(&mut self, state: StateMap) -> Result<()>;
}

/// A recommender whose learned parameters are an item-item similarity
/// matrix.
///
/// Similarity-level fusion blends these matrices directly instead of
/// blending output scores, so it needs access to the matrix itself.
pub trait SimilarityRecommender: Recommender {
    /// The learned similarity matrix. Errors when the model has not been
    /// fit or restored yet.
    fn similarity(&self) -> Result<&CsrMatrix>;
}

/// Score a user batch as `URM row · W` against an item-item similarity
/// matrix.
///
/// Shared by the similarity-family recommenders; `W` must be square over
/// the URM's item space.
pub(crate) fn score_with_similarity(
    urm: &CsrMatrix,
    similarity: &CsrMatrix,
    users: &[u32],
) -> Result<ScoreMatrix> {
    use crate::error::MedleyError;

    if similarity.num_rows() != urm.num_cols() || similarity.num_cols() != urm.num_cols() {
        return Err(MedleyError::scoring(format!(
            "similarity matrix is {}x{}, expected {}x{}",
            similarity.num_rows(),
            similarity.num_cols(),
            urm.num_cols(),
            urm.num_cols()
        )));
    }

    let mut scores = ScoreMatrix::zeros(users.len(), urm.num_cols());
    for (row, &user) in users.iter().enumerate() {
        if user as usize >= urm.num_rows() {
            return Err(MedleyError::scoring(format!(
                "user {} out of range for URM with {} users",
                user,
                urm.num_rows()
            )));
        }
        let out = scores.row_mut(row);
        let (items, values) = urm.row(user as usize);
        for (&item, &value) in items.iter().zip(values.iter()) {
            let (neighbors, weights) = similarity.row(item as usize);
            for (&neighbor, &weight) in neighbors.iter().zip(weights.iter()) {
                out[neighbor as usize] += value * weight;
            }
        }
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_with_similarity() {
        // Two users, three items.
        let urm =
            CsrMatrix::from_triplets(2, 3, &[(0, 0, 1.0), (0, 1, 2.0), (1, 2, 1.0)]).unwrap();
        // Item 0 is similar to item 1 and vice versa.
        let similarity =
            CsrMatrix::from_triplets(3, 3, &[(0, 1, 0.5), (1, 0, 0.5)]).unwrap();

        let scores = score_with_similarity(&urm, &similarity, &[0, 1]).unwrap();
        // User 0: item 0 gets 2.0 * 0.5 from item 1, item 1 gets 1.0 * 0.5.
        assert_eq!(scores.row(0), &[1.0, 0.5, 0.0]);
        // User 1 only interacted with item 2, which has no neighbors.
        assert_eq!(scores.row(1), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_score_with_similarity_shape_check() {
        let urm = CsrMatrix::zeros(2, 3);
        let similarity = CsrMatrix::zeros(2, 2);
        assert!(score_with_similarity(&urm, &similarity, &[0]).is_err());
    }

    #[test]
    fn test_score_with_similarity_user_out_of_range() {
        let urm = CsrMatrix::zeros(2, 3);
        let similarity = CsrMatrix::zeros(3, 3);
        assert!(score_with_similarity(&urm, &similarity, &[5]).is_err());
    }
}
