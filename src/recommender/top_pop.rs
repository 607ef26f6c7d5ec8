//! Item popularity baseline.
//!
//! Scores every item by its total interaction count, identically for every
//! user. Useful as the implicit baseline term in a fusion and as a cheap,
//! fully deterministic fixture in tests.

use std::sync::Arc;

use tracing::info;

use crate::error::{MedleyError, Result};
use crate::matrix::{CsrMatrix, ScoreMatrix};
use crate::recommender::state::{StateMap, StateValue};
use crate::recommender::{FitParams, Recommender};

/// Popularity recommender: score(item) = number of interactions with it.
pub struct TopPop {
    urm: Arc<CsrMatrix>,
    item_counts: Option<Vec<f64>>,
}

impl TopPop {
    /// Create an unfitted popularity recommender over a training URM.
    pub fn new(urm: Arc<CsrMatrix>) -> Self {
        TopPop {
            urm,
            item_counts: None,
        }
    }
}

impl Recommender for TopPop {
    fn name(&self) -> &str {
        "TopPop"
    }

    fn fit(&mut self, _params: &FitParams) -> Result<()> {
        let mut counts = vec![0.0; self.urm.num_cols()];
        for (_, item, _) in self.urm.iter_triplets() {
            counts[item as usize] += 1.0;
        }
        info!(items = counts.len(), "fitted TopPop");
        self.item_counts = Some(counts);
        Ok(())
    }

    fn compute_scores(&self, users: &[u32], candidates: Option<&[u32]>) -> Result<ScoreMatrix> {
        let counts = self
            .item_counts
            .as_ref()
            .ok_or_else(|| MedleyError::scoring("TopPop has not been fit"))?;

        let mut scores = ScoreMatrix::zeros(users.len(), counts.len());
        for (row, &user) in users.iter().enumerate() {
            if user as usize >= self.urm.num_rows() {
                return Err(MedleyError::scoring(format!(
                    "user {} out of range for URM with {} users",
                    user,
                    self.urm.num_rows()
                )));
            }
            scores.row_mut(row).copy_from_slice(counts);
        }
        if let Some(candidates) = candidates {
            scores.restrict_to(candidates);
        }
        Ok(scores)
    }

    fn export_state(&self) -> Result<StateMap> {
        let counts = self
            .item_counts
            .as_ref()
            .ok_or_else(|| MedleyError::scoring("TopPop has not been fit"))?;
        let mut state = StateMap::new();
        state.insert(
            "item_counts".to_string(),
            StateValue::DenseVector(counts.clone()),
        );
        Ok(state)
    }

    fn import_state(&mut self, state: StateMap) -> Result<()> {
        for (key, value) in &state {
            match key.as_str() {
                "item_counts" => {
                    self.item_counts = Some(value.expect_dense_vector(key)?.to_vec());
                }
                other => {
                    return Err(MedleyError::bundle_load(format!(
                        "unrecognized TopPop state key '{other}'"
                    )));
                }
            }
        }
        Ok(())
    }
}
