//! Batch experiment orchestration.
//!
//! An experiment is a static list of (algorithm id, factory) entries driven
//! against one training split: each entry is instantiated, fit with the
//! hyperparameters its id resolves to, then evaluated or exported. Failures
//! are contained per entry and recorded in an append-only run log.

pub mod config;
pub mod export;
pub mod log;
pub mod runner;

pub use config::{
    AlgorithmId, EntryOutcome, EntryStatus, ExperimentContext, ExperimentEntry, HyperparamTable,
    RecommenderFactory,
};
pub use export::RecommendationWriter;
pub use log::RunLog;
pub use runner::{ExperimentRunner, ExperimentTask};
