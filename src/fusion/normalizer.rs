//! Score normalization for fusing differently-scaled sub-model outputs.
//!
//! Sub-models emit scores on arbitrary scales (similarity sums, factor dot
//! products, popularity counts). Before a linear combination is meaningful
//! each contribution is rescaled to zero mean and unit variance over the
//! whole batch, not per row.

use tracing::warn;

use crate::matrix::ScoreMatrix;

/// Standard deviation below which a batch counts as constant.
pub const DEGENERATE_STD_EPSILON: f64 = 1e-12;

/// Global z-score normalizer for one sub-model's score batch.
///
/// Pure function over its input: the only side effect is a warning when a
/// degenerate batch is passed through unscaled.
#[derive(Debug, Clone, Copy)]
pub struct ScoreNormalizer {
    epsilon: f64,
}

impl ScoreNormalizer {
    /// Create a normalizer with the default degenerate-scale epsilon.
    pub fn new() -> Self {
        ScoreNormalizer {
            epsilon: DEGENERATE_STD_EPSILON,
        }
    }

    /// Create a normalizer with a custom degenerate-scale epsilon.
    pub fn with_epsilon(epsilon: f64) -> Self {
        ScoreNormalizer { epsilon }
    }

    /// Rescale a score batch to zero mean and unit variance.
    ///
    /// Mean and standard deviation are computed over the entire matrix.
    /// When the standard deviation is at or below the epsilon the batch is
    /// constant and cannot be rescaled; the raw scores are returned
    /// unchanged and a warning is emitted. This degrades only the one
    /// contribution, never the whole fusion call.
    pub fn normalize(&self, scores: &ScoreMatrix) -> ScoreMatrix {
        let mean = scores.mean();
        let std_dev = scores.std_dev();

        if std_dev <= self.epsilon {
            warn!(
                mean,
                std_dev, "degenerate score batch, passing raw scores through"
            );
            return scores.clone();
        }

        let mut normalized = scores.clone();
        for value in normalized.as_mut_slice() {
            *value = (*value - mean) / std_dev;
        }
        normalized
    }
}

impl Default for ScoreNormalizer {
    fn default() -> Self {
        ScoreNormalizer::new()
    }
}
