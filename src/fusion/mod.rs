//! The hybrid score-fusion engine.
//!
//! Two fusion strategies are provided. [`ScoreFusion`] combines sub-model
//! *output scores* as a weighted sum, optionally z-score normalizing each
//! contribution first. [`SimilarityFusion`] combines sub-model *parameters*
//! (item-item similarity matrices) and scores once against the blend. Both
//! implement the [`Recommender`](crate::recommender::Recommender) capability
//! interface, so composites nest and persist like atomic models.

pub mod config;
pub mod normalizer;
pub mod score;
pub mod similarity;

pub use config::FusionConfig;
pub use normalizer::{DEGENERATE_STD_EPSILON, ScoreNormalizer};
pub use score::ScoreFusion;
pub use similarity::SimilarityFusion;
