//! Item-KNN collaborative filtering baseline.
//!
//! Learns a cosine item-item similarity matrix with shrinkage and top-K
//! pruning, then scores users as `URM row · W`. Its learned `W` also serves
//! as a blending operand for similarity-level fusion.

use std::sync::Arc;

use tracing::info;

use crate::error::{MedleyError, Result};
use crate::matrix::{CsrMatrix, ScoreMatrix};
use crate::recommender::state::{StateMap, StateValue};
use crate::recommender::{FitParams, Recommender, SimilarityRecommender, score_with_similarity};

/// Default number of neighbors kept per item.
pub const DEFAULT_TOP_K: usize = 100;

/// Item-KNN recommender over cosine similarity.
pub struct ItemKnn {
    urm: Arc<CsrMatrix>,
    similarity: Option<CsrMatrix>,
}

impl ItemKnn {
    /// Create an unfitted item-KNN recommender over a training URM.
    pub fn new(urm: Arc<CsrMatrix>) -> Self {
        ItemKnn {
            urm,
            similarity: None,
        }
    }

    fn compute_similarity(&self, top_k: usize, shrink: f64) -> Result<CsrMatrix> {
        let num_items = self.urm.num_cols();
        let transposed = self.urm.transpose();

        // Per-item L2 norms for the cosine denominator.
        let mut norms = vec![0.0f64; num_items];
        for (_, item, value) in self.urm.iter_triplets() {
            norms[item as usize] += value * value;
        }
        for norm in norms.iter_mut() {
            *norm = norm.sqrt();
        }

        let mut triplets = Vec::new();
        let mut accumulator = vec![0.0f64; num_items];
        let mut is_touched = vec![false; num_items];
        let mut touched = Vec::new();

        for item in 0..num_items {
            let (users, values) = transposed.row(item);
            for (&user, &value) in users.iter().zip(values.iter()) {
                let (co_items, co_values) = self.urm.row(user as usize);
                for (&co_item, &co_value) in co_items.iter().zip(co_values.iter()) {
                    if co_item as usize == item {
                        continue;
                    }
                    if !is_touched[co_item as usize] {
                        is_touched[co_item as usize] = true;
                        touched.push(co_item);
                    }
                    accumulator[co_item as usize] += value * co_value;
                }
            }

            let mut neighbors: Vec<(u32, f64)> = Vec::with_capacity(touched.len());
            for &co_item in &touched {
                let dot = accumulator[co_item as usize];
                let denominator = norms[item] * norms[co_item as usize] + shrink;
                if denominator > 0.0 {
                    neighbors.push((co_item, dot / denominator));
                }
                accumulator[co_item as usize] = 0.0;
                is_touched[co_item as usize] = false;
            }
            touched.clear();

            neighbors.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            neighbors.truncate(top_k);
            for (neighbor, weight) in neighbors {
                triplets.push((item as u32, neighbor, weight));
            }
        }

        CsrMatrix::from_triplets(num_items, num_items, &triplets)
    }
}

impl Recommender for ItemKnn {
    fn name(&self) -> &str {
        "ItemKNN"
    }

    /// Parameters: `top_k` (default 100), `shrink` (default 0.0).
    fn fit(&mut self, params: &FitParams) -> Result<()> {
        let top_k = params.get_usize("top_k", DEFAULT_TOP_K)?;
        let shrink = params.get_f64("shrink", 0.0)?;
        if shrink < 0.0 {
            return Err(MedleyError::invalid_argument(format!(
                "shrink must be non-negative, got {shrink}"
            )));
        }

        let similarity = self.compute_similarity(top_k, shrink)?;
        info!(
            top_k,
            shrink,
            nnz = similarity.nnz(),
            "fitted ItemKNN similarity"
        );
        self.similarity = Some(similarity);
        Ok(())
    }

    fn compute_scores(&self, users: &[u32], candidates: Option<&[u32]>) -> Result<ScoreMatrix> {
        let similarity = self.similarity()?;
        let mut scores = score_with_similarity(&self.urm, similarity, users)?;
        if let Some(candidates) = candidates {
            scores.restrict_to(candidates);
        }
        Ok(scores)
    }

    fn export_state(&self) -> Result<StateMap> {
        let similarity = self.similarity()?;
        let mut state = StateMap::new();
        state.insert(
            "W_sparse".to_string(),
            StateValue::Sparse(similarity.clone()),
        );
        Ok(state)
    }

    fn import_state(&mut self, state: StateMap) -> Result<()> {
        for (key, value) in &state {
            match key.as_str() {
                "W_sparse" => {
                    self.similarity = Some(value.expect_sparse(key)?.clone());
                }
                other => {
                    return Err(MedleyError::bundle_load(format!(
                        "unrecognized ItemKNN state key '{other}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl SimilarityRecommender for ItemKnn {
    fn similarity(&self) -> Result<&CsrMatrix> {
        self.similarity
            .as_ref()
            .ok_or_else(|| MedleyError::scoring("ItemKNN has not been fit"))
    }
}
