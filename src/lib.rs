//! # Medley
//!
//! A hybrid recommender score-fusion library for Rust.
//!
//! Medley combines predictions from independently trained recommendation
//! models into one composite ranking and drives batch experiments over the
//! result.
//!
//! ## Features
//!
//! - Rating-level fusion: weighted sums of z-score-normalized sub-model
//!   scores
//! - Similarity-level fusion: linear blending of learned similarity
//!   matrices before scoring
//! - Composite state bundles: checksummed save/load of every sub-model's
//!   arrays plus the fusion hyperparameters
//! - Profile-length user segmentation for sliced evaluation
//! - Sequential and worker-respawn parallel experiment orchestration with
//!   per-entry failure containment

pub mod bundle;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod experiment;
pub mod fusion;
pub mod matrix;
pub mod recommender;
pub mod segment;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
