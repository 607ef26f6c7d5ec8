//! Rating-level fusion: a weighted sum of sub-model score batches.

use tracing::{info, warn};

use crate::error::{MedleyError, Result};
use crate::fusion::config::FusionConfig;
use crate::fusion::normalizer::ScoreNormalizer;
use crate::matrix::ScoreMatrix;
use crate::recommender::state::{StateMap, StateValue};
use crate::recommender::{FitParams, Recommender};

/// Composite recommender combining sub-model scores as `Σ wᵢ · scoreᵢ`.
///
/// Holds an ordered list of components behind the [`Recommender`] capability
/// interface; it implements that interface itself, so composites nest and
/// the evaluator, exporter and bundle store treat them like any atomic
/// model. Weights are fixed at fit time and do not change during scoring.
pub struct ScoreFusion {
    name: String,
    components: Vec<Box<dyn Recommender>>,
    config: FusionConfig,
    normalizer: ScoreNormalizer,
    fitted: bool,
}

impl ScoreFusion {
    /// Create an unfitted score fusion over the given components.
    ///
    /// The config must carry exactly one weight per component, and component
    /// names must be unique since they become bundle key prefixes.
    pub fn new(
        name: impl Into<String>,
        components: Vec<Box<dyn Recommender>>,
        config: FusionConfig,
    ) -> Result<Self> {
        if components.len() != config.num_components() {
            return Err(MedleyError::fusion(format!(
                "{} components but {} weights",
                components.len(),
                config.num_components()
            )));
        }
        for (index, component) in components.iter().enumerate() {
            if components[..index]
                .iter()
                .any(|other| other.name() == component.name())
            {
                return Err(MedleyError::fusion(format!(
                    "duplicate component name '{}'",
                    component.name()
                )));
            }
        }

        Ok(ScoreFusion {
            name: name.into(),
            components,
            config,
            normalizer: ScoreNormalizer::new(),
            fitted: false,
        })
    }

    /// The active fusion configuration.
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }
}

impl Recommender for ScoreFusion {
    fn name(&self) -> &str {
        &self.name
    }

    /// Fit every component, then freeze the fusion weights.
    ///
    /// Parameters: `alpha` (two-component shortcut, weights become
    /// `(alpha, 1 - alpha)`), `norm_scores` (overrides the normalize flag),
    /// plus one nested parameter set per component name, forwarded to that
    /// component's `fit`.
    fn fit(&mut self, params: &FitParams) -> Result<()> {
        let normalize = params.get_bool("norm_scores", self.config.normalize)?;
        if params.contains("alpha") {
            if self.components.len() != 2 {
                return Err(MedleyError::invalid_argument(
                    "'alpha' shortcut requires exactly two components",
                ));
            }
            self.config = FusionConfig::pair(params.get_f64("alpha", 0.5)?, normalize)?;
        } else {
            self.config.normalize = normalize;
        }

        for component in self.components.iter_mut() {
            let component_params = params.get_nested(component.name())?;
            component.fit(&component_params)?;
        }

        info!(
            name = %self.name,
            weights = ?self.config.weights,
            normalize = self.config.normalize,
            "fitted score fusion"
        );
        self.fitted = true;
        Ok(())
    }

    fn compute_scores(&self, users: &[u32], candidates: Option<&[u32]>) -> Result<ScoreMatrix> {
        if !self.fitted {
            return Err(MedleyError::fusion(format!(
                "composite '{}' has not been fit or restored",
                self.name
            )));
        }

        let mut combined: Option<ScoreMatrix> = None;
        for (component, &weight) in self.components.iter().zip(self.config.weights.iter()) {
            // A failing component aborts the whole fusion call; no partial
            // or degraded result is returned.
            let mut contribution =
                component
                    .compute_scores(users, None)
                    .map_err(|source| {
                        MedleyError::scoring(format!(
                            "component '{}' failed: {}",
                            component.name(),
                            source
                        ))
                    })?;

            if self.config.normalize {
                contribution = self.normalizer.normalize(&contribution);
            }

            match combined.as_mut() {
                None => {
                    let mut scores =
                        ScoreMatrix::zeros(contribution.num_rows(), contribution.num_cols());
                    scores.add_scaled(&contribution, weight)?;
                    combined = Some(scores);
                }
                Some(scores) => scores.add_scaled(&contribution, weight)?,
            }
        }

        let mut scores = combined.ok_or_else(|| {
            MedleyError::fusion(format!("composite '{}' has no components", self.name))
        })?;
        if let Some(candidates) = candidates {
            scores.restrict_to(candidates);
        }
        Ok(scores)
    }

    fn export_state(&self) -> Result<StateMap> {
        let mut state = StateMap::new();
        state.insert(
            "weights".to_string(),
            StateValue::DenseVector(self.config.weights.clone()),
        );
        state.insert(
            "normalize".to_string(),
            StateValue::Flag(self.config.normalize),
        );
        for component in &self.components {
            for (key, value) in component.export_state()? {
                state.insert(format!("{}.{}", component.name(), key), value);
            }
        }
        Ok(state)
    }

    /// Keyed dispatch: every bundle key is routed to the fusion
    /// configuration or to the component owning its prefix. Unknown keys
    /// are skipped with a warning; recognized keys with the wrong shape are
    /// fatal. The operation is idempotent and order-independent.
    fn import_state(&mut self, state: StateMap) -> Result<()> {
        let mut per_component: Vec<StateMap> =
            self.components.iter().map(|_| StateMap::new()).collect();
        let mut weights: Option<Vec<f64>> = None;
        let mut normalize: Option<bool> = None;

        'keys: for (key, value) in state {
            match key.as_str() {
                "weights" => {
                    let values = value.expect_dense_vector(&key)?.to_vec();
                    if values.len() != self.components.len() {
                        return Err(MedleyError::bundle_load(format!(
                            "{} weights for {} components",
                            values.len(),
                            self.components.len()
                        )));
                    }
                    weights = Some(values);
                }
                "normalize" => normalize = Some(value.expect_flag(&key)?),
                _ => {
                    for (index, component) in self.components.iter().enumerate() {
                        let prefix = format!("{}.", component.name());
                        if let Some(rest) = key.strip_prefix(&prefix) {
                            per_component[index].insert(rest.to_string(), value);
                            continue 'keys;
                        }
                    }
                    warn!(key = %key, "ignoring unrecognized bundle key");
                }
            }
        }

        if let Some(weights) = weights {
            let normalize = normalize.unwrap_or(self.config.normalize);
            self.config = FusionConfig::new(weights, normalize)
                .map_err(|source| MedleyError::bundle_load(source.to_string()))?;
        } else if let Some(normalize) = normalize {
            self.config.normalize = normalize;
        }

        for (component, component_state) in self.components.iter_mut().zip(per_component) {
            if !component_state.is_empty() {
                component.import_state(component_state)?;
            }
        }

        self.fitted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::matrix::CsrMatrix;
    use crate::recommender::TopPop;

    /// A component that always fails to score.
    struct Broken;

    impl Recommender for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn fit(&mut self, _params: &FitParams) -> Result<()> {
            Ok(())
        }

        fn compute_scores(
            &self,
            _users: &[u32],
            _candidates: Option<&[u32]>,
        ) -> Result<ScoreMatrix> {
            Err(MedleyError::scoring("synthetic failure"))
        }

        fn export_state(&self) -> Result<StateMap> {
            Ok(StateMap::new())
        }

        fn import_state(&mut self, _state: StateMap) -> Result<()> {
            Ok(())
        }
    }

    /// A fixed-output component for exercising the combination arithmetic.
    struct Constant {
        name: &'static str,
        row: Vec<f64>,
    }

    impl Recommender for Constant {
        fn name(&self) -> &str {
            self.name
        }

        fn fit(&mut self, _params: &FitParams) -> Result<()> {
            Ok(())
        }

        fn compute_scores(
            &self,
            users: &[u32],
            _candidates: Option<&[u32]>,
        ) -> Result<ScoreMatrix> {
            let mut scores = ScoreMatrix::zeros(users.len(), self.row.len());
            for row in 0..users.len() {
                scores.row_mut(row).copy_from_slice(&self.row);
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

    fn sample_urm() -> Arc<CsrMatrix> {
        Arc::new(
            CsrMatrix::from_triplets(2, 3, &[(0, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0)]).unwrap(),
        )
    }

    fn constant(name: &'static str, row: Vec<f64>) -> Box<dyn Recommender> {
        Box::new(Constant { name, row })
    }

    #[test]
    fn test_weighted_combination_without_normalization() {
        let mut fusion = ScoreFusion::new(
            "TestFusion",
            vec![
                constant("A", vec![1.0, 0.0, 2.0]),
                constant("B", vec![0.0, 4.0, 2.0]),
            ],
            FusionConfig::pair(0.75, false).unwrap(),
        )
        .unwrap();
        fusion.fit(&FitParams::new()).unwrap();

        let scores = fusion.compute_scores(&[0], None).unwrap();
        assert_eq!(scores.row(0), &[0.75, 1.0, 2.0]);
    }

    #[test]
    fn test_component_count_must_match_weights() {
        let result = ScoreFusion::new(
            "TestFusion",
            vec![constant("A", vec![0.0])],
            FusionConfig::pair(0.5, true).unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_component_names_rejected() {
        let result = ScoreFusion::new(
            "TestFusion",
            vec![constant("A", vec![0.0]), constant("A", vec![0.0])],
            FusionConfig::pair(0.5, true).unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_scoring_before_fit_is_an_error() {
        let fusion = ScoreFusion::new(
            "TestFusion",
            vec![constant("A", vec![0.0]), constant("B", vec![0.0])],
            FusionConfig::default(),
        )
        .unwrap();
        assert!(fusion.compute_scores(&[0], None).is_err());
    }

    #[test]
    fn test_failing_component_aborts_fusion() {
        let mut fusion = ScoreFusion::new(
            "TestFusion",
            vec![constant("A", vec![1.0, 2.0]), Box::new(Broken)],
            FusionConfig::pair(0.5, false).unwrap(),
        )
        .unwrap();
        fusion.fit(&FitParams::new()).unwrap();

        let err = fusion.compute_scores(&[0], None).unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }

    #[test]
    fn test_alpha_fit_parameter() {
        let mut fusion = ScoreFusion::new(
            "TestFusion",
            vec![
                constant("A", vec![1.0, 0.0]),
                constant("B", vec![0.0, 1.0]),
            ],
            FusionConfig::default(),
        )
        .unwrap();
        fusion
            .fit(&FitParams::new().with("alpha", 0.9).with("norm_scores", false))
            .unwrap();

        assert_eq!(fusion.config().weights, vec![0.9, 0.09999999999999998]);
        let scores = fusion.compute_scores(&[0], None).unwrap();
        assert!((scores.row(0)[0] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_candidate_masking_applied_after_combination() {
        let mut fusion = ScoreFusion::new(
            "TestFusion",
            vec![
                constant("A", vec![1.0, 2.0, 3.0]),
                constant("B", vec![3.0, 2.0, 1.0]),
            ],
            FusionConfig::pair(0.5, false).unwrap(),
        )
        .unwrap();
        fusion.fit(&FitParams::new()).unwrap();

        let scores = fusion.compute_scores(&[0], Some(&[2])).unwrap();
        assert!(scores.row(0)[0].is_infinite());
        assert!(scores.row(0)[1].is_infinite());
        assert_eq!(scores.row(0)[2], 2.0);
    }

    #[test]
    fn test_state_round_trip_with_real_components() {
        let urm = sample_urm();
        let mut fusion = ScoreFusion::new(
            "TestFusion",
            vec![Box::new(TopPop::new(urm.clone()))],
            FusionConfig::new(vec![1.0], false).unwrap(),
        )
        .unwrap();
        fusion.fit(&FitParams::new()).unwrap();
        let before = fusion.compute_scores(&[0, 1], None).unwrap();

        let state = fusion.export_state().unwrap();
        assert!(state.contains_key("weights"));
        assert!(state.contains_key("normalize"));
        assert!(state.contains_key("TopPop.item_counts"));

        let mut restored = ScoreFusion::new(
            "TestFusion",
            vec![Box::new(TopPop::new(urm))],
            FusionConfig::new(vec![0.5], true).unwrap(),
        )
        .unwrap();
        restored.import_state(state).unwrap();
        let after = restored.compute_scores(&[0, 1], None).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn test_import_ignores_unknown_keys() {
        let mut fusion = ScoreFusion::new(
            "TestFusion",
            vec![constant("A", vec![1.0]), constant("B", vec![2.0])],
            FusionConfig::pair(0.5, false).unwrap(),
        )
        .unwrap();

        let mut state = StateMap::new();
        state.insert("weights".to_string(), StateValue::DenseVector(vec![0.2, 0.8]));
        state.insert("normalize".to_string(), StateValue::Flag(false));
        state.insert(
            "FutureComponent.W_sparse".to_string(),
            StateValue::Scalar(0.0),
        );

        fusion.import_state(state).unwrap();
        assert_eq!(fusion.config().weights, vec![0.2, 0.8]);
    }

    #[test]
    fn test_import_rejects_wrong_weight_count() {
        let mut fusion = ScoreFusion::new(
            "TestFusion",
            vec![constant("A", vec![1.0]), constant("B", vec![2.0])],
            FusionConfig::pair(0.5, false).unwrap(),
        )
        .unwrap();

        let mut state = StateMap::new();
        state.insert("weights".to_string(), StateValue::DenseVector(vec![1.0]));
        assert!(fusion.import_state(state).is_err());
    }

    #[test]
    fn test_import_rejects_wrong_shape() {
        let mut fusion = ScoreFusion::new(
            "TestFusion",
            vec![constant("A", vec![1.0]), constant("B", vec![2.0])],
            FusionConfig::pair(0.5, false).unwrap(),
        )
        .unwrap();

        let mut state = StateMap::new();
        state.insert("weights".to_string(), StateValue::Flag(true));
        assert!(fusion.import_state(state).is_err());
    }
}
