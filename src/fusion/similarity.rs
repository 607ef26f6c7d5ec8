//! Similarity-level fusion: blend learned similarity matrices, then score.
//!
//! Algorithmically distinct from rating-level fusion: the model parameters
//! are combined linearly as `W = alpha * W1 + (1 - alpha) * W2` and scoring
//! happens once against the blended matrix. That gives one numeric event
//! instead of two separately-scaled contributions, so this is a separate
//! strategy rather than a reuse of the score-fusion path.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{MedleyError, Result};
use crate::matrix::{CsrMatrix, ScoreMatrix};
use crate::recommender::state::{StateMap, StateValue};
use crate::recommender::{FitParams, Recommender, SimilarityRecommender, score_with_similarity};

/// Composite recommender blending two item-item similarity matrices.
pub struct SimilarityFusion {
    name: String,
    urm: Arc<CsrMatrix>,
    first: Box<dyn SimilarityRecommender>,
    second: Box<dyn SimilarityRecommender>,
    alpha: f64,
    blended: Option<CsrMatrix>,
}

impl SimilarityFusion {
    /// Create an unfitted similarity fusion over two similarity-family
    /// components sharing the URM's item space.
    pub fn new(
        name: impl Into<String>,
        urm: Arc<CsrMatrix>,
        first: Box<dyn SimilarityRecommender>,
        second: Box<dyn SimilarityRecommender>,
    ) -> Result<Self> {
        if first.name() == second.name() {
            return Err(MedleyError::fusion(format!(
                "duplicate component name '{}'",
                first.name()
            )));
        }
        Ok(SimilarityFusion {
            name: name.into(),
            urm,
            first,
            second,
            alpha: 0.5,
            blended: None,
        })
    }

    /// The blended similarity matrix, once fit or restored.
    pub fn blended_similarity(&self) -> Result<&CsrMatrix> {
        self.blended.as_ref().ok_or_else(|| {
            MedleyError::fusion(format!(
                "composite '{}' has not been fit or restored",
                self.name
            ))
        })
    }
}

impl Recommender for SimilarityFusion {
    fn name(&self) -> &str {
        &self.name
    }

    /// Fit both components, then blend their similarity matrices.
    ///
    /// Parameters: `alpha` (blend weight, default 0.5), `top_k` (optional
    /// per-row pruning of the blended matrix), plus one nested parameter
    /// set per component name.
    fn fit(&mut self, params: &FitParams) -> Result<()> {
        let alpha = params.get_f64("alpha", 0.5)?;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(MedleyError::invalid_argument(format!(
                "alpha {alpha} is outside [0, 1]"
            )));
        }

        self.first.fit(&params.get_nested(self.first.name())?)?;
        self.second.fit(&params.get_nested(self.second.name())?)?;

        let mut blended = self
            .first
            .similarity()?
            .add_weighted(alpha, self.second.similarity()?, 1.0 - alpha)?;
        if params.contains("top_k") {
            blended = blended.prune_top_k(params.get_usize("top_k", 0)?);
        }

        info!(
            name = %self.name,
            alpha,
            nnz = blended.nnz(),
            "fitted similarity fusion"
        );
        self.alpha = alpha;
        self.blended = Some(blended);
        Ok(())
    }

    fn compute_scores(&self, users: &[u32], candidates: Option<&[u32]>) -> Result<ScoreMatrix> {
        let blended = self.blended_similarity()?;
        let mut scores = score_with_similarity(&self.urm, blended, users)?;
        if let Some(candidates) = candidates {
            scores.restrict_to(candidates);
        }
        Ok(scores)
    }

    fn export_state(&self) -> Result<StateMap> {
        let blended = self.blended_similarity()?;
        let mut state = StateMap::new();
        state.insert("alpha".to_string(), StateValue::Scalar(self.alpha));
        state.insert("W_sparse".to_string(), StateValue::Sparse(blended.clone()));
        Ok(state)
    }

    /// Restore the blend weight and the blended matrix directly, skipping
    /// any component refit. Unknown keys are skipped with a warning.
    fn import_state(&mut self, state: StateMap) -> Result<()> {
        for (key, value) in state {
            match key.as_str() {
                "alpha" => {
                    let alpha = value.expect_scalar(&key)?;
                    if !(0.0..=1.0).contains(&alpha) {
                        return Err(MedleyError::bundle_load(format!(
                            "alpha {alpha} is outside [0, 1]"
                        )));
                    }
                    self.alpha = alpha;
                }
                "W_sparse" => {
                    self.blended = Some(value.expect_sparse(&key)?.clone());
                }
                _ => warn!(key = %key, "ignoring unrecognized bundle key"),
            }
        }
        Ok(())
    }
}
