//! Ranking-quality evaluation over a held-out split.
//!
//! The orchestrator treats evaluation as an opaque callable behind the
//! [`Evaluator`] trait; [`HoldoutEvaluator`] is the standard implementation,
//! computing precision, recall and MAP at a cutoff list over the test split,
//! with train-seen items removed from every ranking. An ignore-users set
//! (typically a segment complement) restricts evaluation to one user slice.

use std::fmt;
use std::sync::Arc;

use ahash::AHashSet;
use tracing::info;

use crate::error::{MedleyError, Result};
use crate::matrix::{CsrMatrix, top_k};
use crate::recommender::Recommender;

/// User batch size per scoring call, bounding the dense score matrix.
const EVAL_BATCH_SIZE: usize = 1000;

/// Aggregated metrics at one cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct CutoffMetrics {
    pub cutoff: usize,
    pub precision: f64,
    pub recall: f64,
    pub map: f64,
    /// Number of users that contributed to the averages.
    pub num_users: usize,
}

/// Evaluation result across every requested cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub cutoffs: Vec<CutoffMetrics>,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for metrics in &self.cutoffs {
            if !first {
                write!(f, "; ")?;
            }
            write!(
                f,
                "CUTOFF: {} - PRECISION: {:.7}, RECALL: {:.7}, MAP: {:.7}",
                metrics.cutoff, metrics.precision, metrics.recall, metrics.map
            )?;
            first = false;
        }
        Ok(())
    }
}

/// Opaque ranking-quality evaluation callable.
pub trait Evaluator: Send + Sync {
    /// Evaluate a fitted recommender, returning aggregate metrics.
    fn evaluate(&self, model: &dyn Recommender) -> Result<EvaluationReport>;
}

/// Holdout evaluator over disjoint train/test splits of one URM.
pub struct HoldoutEvaluator {
    train: Arc<CsrMatrix>,
    test: Arc<CsrMatrix>,
    cutoffs: Vec<usize>,
    ignore_users: AHashSet<u32>,
}

impl HoldoutEvaluator {
    /// Create an evaluator for the given splits and cutoff list.
    ///
    /// The splits must share one shape; the cutoff list must be non-empty
    /// and free of zeros.
    pub fn new(train: Arc<CsrMatrix>, test: Arc<CsrMatrix>, cutoffs: Vec<usize>) -> Result<Self> {
        if train.num_rows() != test.num_rows() || train.num_cols() != test.num_cols() {
            return Err(MedleyError::invalid_argument(format!(
                "train split is {}x{} but test split is {}x{}",
                train.num_rows(),
                train.num_cols(),
                test.num_rows(),
                test.num_cols()
            )));
        }
        if cutoffs.is_empty() || cutoffs.contains(&0) {
            return Err(MedleyError::invalid_argument(
                "cutoff list must be non-empty and positive",
            ));
        }
        Ok(HoldoutEvaluator {
            train,
            test,
            cutoffs,
            ignore_users: AHashSet::new(),
        })
    }

    /// Exclude a user set from evaluation (a segment complement for sliced
    /// evaluation).
    pub fn ignore_users(mut self, users: &[u32]) -> Self {
        self.ignore_users = users.iter().copied().collect();
        self
    }

    fn evaluable_users(&self) -> Vec<u32> {
        (0..self.test.num_rows() as u32)
            .filter(|&user| {
                self.test.row_nnz(user as usize) > 0 && !self.ignore_users.contains(&user)
            })
            .collect()
    }
}

impl Evaluator for HoldoutEvaluator {
    fn evaluate(&self, model: &dyn Recommender) -> Result<EvaluationReport> {
        let users = self.evaluable_users();
        if users.is_empty() {
            return Err(MedleyError::invalid_argument(
                "no evaluable users in the test split",
            ));
        }

        let max_cutoff = self.cutoffs.iter().copied().max().unwrap_or(0);
        let mut precision_sums = vec![0.0; self.cutoffs.len()];
        let mut recall_sums = vec![0.0; self.cutoffs.len()];
        let mut ap_sums = vec![0.0; self.cutoffs.len()];

        for batch in users.chunks(EVAL_BATCH_SIZE) {
            let scores = model.compute_scores(batch, None)?;

            for (row, &user) in batch.iter().enumerate() {
                let (relevant_items, _) = self.test.row(user as usize);
                let relevant: AHashSet<u32> = relevant_items.iter().copied().collect();
                let (seen, _) = self.train.row(user as usize);
                let ranked = top_k(scores.row(row), max_cutoff, seen);

                for (cidx, &cutoff) in self.cutoffs.iter().enumerate() {
                    let mut hits = 0usize;
                    let mut ap = 0.0;
                    for (position, item) in ranked.iter().take(cutoff).enumerate() {
                        if relevant.contains(item) {
                            hits += 1;
                            ap += hits as f64 / (position + 1) as f64;
                        }
                    }
                    precision_sums[cidx] += hits as f64 / cutoff as f64;
                    recall_sums[cidx] += hits as f64 / relevant.len() as f64;
                    ap_sums[cidx] += ap / relevant.len().min(cutoff) as f64;
                }
            }
        }

        let num_users = users.len();
        let cutoffs = self
            .cutoffs
            .iter()
            .enumerate()
            .map(|(cidx, &cutoff)| CutoffMetrics {
                cutoff,
                precision: precision_sums[cidx] / num_users as f64,
                recall: recall_sums[cidx] / num_users as f64,
                map: ap_sums[cidx] / num_users as f64,
                num_users,
            })
            .collect();

        let report = EvaluationReport { cutoffs };
        info!(model = model.name(), num_users, report = %report, "evaluated recommender");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::ScoreMatrix;
    use crate::recommender::state::StateMap;
    use crate::recommender::{FitParams, TopPop};

    /// Deterministic model scoring items by descending item id.
    struct Reverse {
        num_items: usize,
    }

    impl Recommender for Reverse {
        fn name(&self) -> &str {
            "Reverse"
        }

        fn fit(&mut self, _params: &FitParams) -> Result<()> {
            Ok(())
        }

        fn compute_scores(
            &self,
            users: &[u32],
            _candidates: Option<&[u32]>,
        ) -> Result<ScoreMatrix> {
            let mut scores = ScoreMatrix::zeros(users.len(), self.num_items);
            for row in 0..users.len() {
                for (item, value) in scores.row_mut(row).iter_mut().enumerate() {
                    *value = item as f64;
                }
            }
            Ok(scores)
        }

        fn export_state(&self) -> Result<StateMap> {
            Ok(StateMap::new())
        }

        fn import_state(&mut self, _state: StateMap) -> Result<()> {
            Ok(())
        }
    }

    fn splits() -> (Arc<CsrMatrix>, Arc<CsrMatrix>) {
        // 2 users, 4 items. User 0 trained on item 0, tested on item 3.
        // User 1 trained on item 1, tested on item 0.
        let train =
            CsrMatrix::from_triplets(2, 4, &[(0, 0, 1.0), (1, 1, 1.0)]).unwrap();
        let test = CsrMatrix::from_triplets(2, 4, &[(0, 3, 1.0), (1, 0, 1.0)]).unwrap();
        (Arc::new(train), Arc::new(test))
    }

    #[test]
    fn test_perfect_and_imperfect_rankings() {
        let (train, test) = splits();
        let evaluator = HoldoutEvaluator::new(train, test, vec![1]).unwrap();
        let report = evaluator.evaluate(&Reverse { num_items: 4 }).unwrap();

        // Reverse ranks item 3 first for both users (item 0 is second-best
        // but user 0 has item 3 relevant, user 1 item 0). User 0 hits at
        // rank 1; user 1 misses (top item after excluding seen is item 3).
        let metrics = &report.cutoffs[0];
        assert_eq!(metrics.cutoff, 1);
        assert_eq!(metrics.num_users, 2);
        assert!((metrics.precision - 0.5).abs() < 1e-12);
        assert!((metrics.recall - 0.5).abs() < 1e-12);
        assert!((metrics.map - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_seen_items_are_excluded() {
        let (train, test) = splits();
        let evaluator = HoldoutEvaluator::new(train, test, vec![4]).unwrap();
        let report = evaluator.evaluate(&Reverse { num_items: 4 }).unwrap();

        // With the full cutoff both users find their relevant item, and the
        // train-seen item never occupies a rank.
        assert!((report.cutoffs[0].recall - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ignore_users_restricts_the_slice() {
        let (train, test) = splits();
        let evaluator = HoldoutEvaluator::new(train, test, vec![1])
            .unwrap()
            .ignore_users(&[1]);
        let report = evaluator.evaluate(&Reverse { num_items: 4 }).unwrap();

        // Only user 0 remains and it hits at rank 1.
        assert_eq!(report.cutoffs[0].num_users, 1);
        assert!((report.cutoffs[0].precision - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constructor_validation() {
        let (train, test) = splits();
        assert!(HoldoutEvaluator::new(train.clone(), test.clone(), vec![]).is_err());
        assert!(HoldoutEvaluator::new(train.clone(), test.clone(), vec![0]).is_err());

        let mismatched = Arc::new(CsrMatrix::zeros(3, 4));
        assert!(HoldoutEvaluator::new(train, mismatched, vec![1]).is_err());
    }

    #[test]
    fn test_evaluates_real_recommender() {
        let (train, test) = splits();
        let mut model = TopPop::new(train.clone());
        model.fit(&FitParams::new()).unwrap();

        let evaluator = HoldoutEvaluator::new(train, test, vec![2]).unwrap();
        let report = evaluator.evaluate(&model).unwrap();
        assert_eq!(report.cutoffs.len(), 1);
        assert!(report.to_string().contains("CUTOFF: 2"));
    }
}
