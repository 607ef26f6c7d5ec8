//! Configuration for score fusion.

use serde::{Deserialize, Serialize};

use crate::error::{MedleyError, Result};

/// Fusion hyperparameters: per-component weights and the normalize flag.
///
/// Each weight must lie in `[0, 1]`. The two-component case is a true
/// convex combination `(alpha, 1 - alpha)`; with more components the
/// weights are independently tunable and need not sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Ordered weights, one per fused component.
    pub weights: Vec<f64>,
    /// Whether each contribution is z-score normalized before combining.
    pub normalize: bool,
}

impl FusionConfig {
    /// Create a config from explicit per-component weights.
    pub fn new(weights: Vec<f64>, normalize: bool) -> Result<Self> {
        if weights.is_empty() {
            return Err(MedleyError::invalid_argument(
                "fusion requires at least one weight",
            ));
        }
        for &weight in &weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(MedleyError::invalid_argument(format!(
                    "fusion weight {weight} is outside [0, 1]"
                )));
            }
        }
        Ok(FusionConfig { weights, normalize })
    }

    /// Two-component convex combination `(alpha, 1 - alpha)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use medley::fusion::FusionConfig;
    ///
    /// let config = FusionConfig::pair(0.7, true).unwrap();
    /// assert_eq!(config.weights, vec![0.7, 1.0 - 0.7]);
    /// ```
    pub fn pair(alpha: f64, normalize: bool) -> Result<Self> {
        FusionConfig::new(vec![alpha, 1.0 - alpha], normalize)
    }

    /// Number of fused components this config expects.
    pub fn num_components(&self) -> usize {
        self.weights.len()
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        FusionConfig {
            weights: vec![0.5, 0.5],
            normalize: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = FusionConfig::default();
        assert_eq!(config.weights, vec![0.5, 0.5]);
        assert!(config.normalize);
    }

    #[test]
    fn test_pair_is_convex() {
        let config = FusionConfig::pair(0.25, false).unwrap();
        assert_eq!(config.weights, vec![0.25, 0.75]);
        assert_eq!(config.num_components(), 2);
    }

    #[test]
    fn test_weights_out_of_range() {
        assert!(FusionConfig::new(vec![1.5], true).is_err());
        assert!(FusionConfig::new(vec![-0.1, 0.5], true).is_err());
        assert!(FusionConfig::pair(1.2, true).is_err());
    }

    #[test]
    fn test_empty_weights() {
        assert!(FusionConfig::new(vec![], true).is_err());
    }

    #[test]
    fn test_n_component_weights_need_not_sum_to_one() {
        let config = FusionConfig::new(vec![0.9, 0.8, 0.1], true).unwrap();
        assert_eq!(config.num_components(), 3);
    }
}
