//! Experiment configuration: algorithm identities, hyperparameter tables,
//! and the entry list the runner consumes.
//!
//! Hyperparameters are resolved from a [`HyperparamTable`] keyed by a
//! stable [`AlgorithmId`], built once at configuration time; unlisted
//! algorithms get an empty parameter set.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::error::Result;
use crate::matrix::CsrMatrix;
use crate::recommender::{FitParams, Recommender};

/// Stable identity of one recommender configuration in a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlgorithmId {
    TopPop,
    ItemKnn,
    ScoreFusion,
    SimilarityFusion,
    /// An externally supplied recommender under its own tag.
    Custom(String),
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmId::TopPop => write!(f, "TopPop"),
            AlgorithmId::ItemKnn => write!(f, "ItemKNN"),
            AlgorithmId::ScoreFusion => write!(f, "ScoreFusion"),
            AlgorithmId::SimilarityFusion => write!(f, "SimilarityFusion"),
            AlgorithmId::Custom(tag) => write!(f, "{tag}"),
        }
    }
}

/// Fixed lookup from algorithm identity to its hyperparameter set.
#[derive(Debug, Clone, Default)]
pub struct HyperparamTable {
    params: AHashMap<AlgorithmId, FitParams>,
}

impl HyperparamTable {
    /// Create an empty table.
    pub fn new() -> Self {
        HyperparamTable {
            params: AHashMap::new(),
        }
    }

    /// Register the parameter set for one algorithm, builder style.
    pub fn with(mut self, id: AlgorithmId, params: FitParams) -> Self {
        self.params.insert(id, params);
        self
    }

    /// The parameter set for an algorithm; unlisted algorithms get an
    /// empty set.
    pub fn params_for(&self, id: &AlgorithmId) -> FitParams {
        self.params.get(id).cloned().unwrap_or_default()
    }
}

/// Read-only data every experiment entry is built against.
#[derive(Clone)]
pub struct ExperimentContext {
    /// Training split of the interaction matrix.
    pub train: Arc<CsrMatrix>,
    /// Optional content matrix for content-aware models.
    pub icm: Option<Arc<CsrMatrix>>,
}

/// Builds a fresh recommender instance against the experiment context.
pub type RecommenderFactory =
    Box<dyn Fn(&ExperimentContext) -> Result<Box<dyn Recommender>> + Send + Sync>;

/// One unit of work in a batch run.
pub struct ExperimentEntry {
    pub id: AlgorithmId,
    pub factory: RecommenderFactory,
}

impl ExperimentEntry {
    /// Create an entry from an algorithm id and its factory.
    pub fn new(
        id: AlgorithmId,
        factory: impl Fn(&ExperimentContext) -> Result<Box<dyn Recommender>> + Send + Sync + 'static,
    ) -> Self {
        ExperimentEntry {
            id,
            factory: Box::new(factory),
        }
    }
}

/// Lifecycle of one entry through a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Fitting,
    Evaluated,
    Exported,
    Failed,
    Done,
}

/// Final record of one entry after a run.
#[derive(Debug, Clone)]
pub struct EntryOutcome {
    pub id: AlgorithmId,
    pub status: EntryStatus,
    /// Result summary on success, error message on failure.
    pub detail: String,
}
