//! Error types for the Medley library.
//!
//! All fallible operations in the crate return [`Result`], whose error type
//! is the [`MedleyError`] enum. Variants are grouped by concern: dataset
//! loading, sub-model scoring, fusion, bundle persistence, and experiment
//! orchestration.
//!
//! # Examples
//!
//! ```
//! use medley::error::{MedleyError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(MedleyError::invalid_argument("Invalid input"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Medley operations.
///
/// Uses the `thiserror` crate for automatic `Error` trait implementation and
/// provides convenient constructor methods for creating specific error types.
#[derive(Error, Debug)]
pub enum MedleyError {
    /// I/O errors (bundle files, run log, CSV export, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid argument passed to a constructor or operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Dataset loading/parsing errors
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// A sub-model failed while computing scores; fatal to the whole
    /// fusion call it was part of
    #[error("Scoring error: {0}")]
    Scoring(String),

    /// Fusion configuration or combination errors
    #[error("Fusion error: {0}")]
    Fusion(String),

    /// A composite bundle could not be loaded (bad framing, checksum
    /// mismatch, or a recognized key with an incompatible shape)
    #[error("Bundle load error: {0}")]
    BundleLoad(String),

    /// Serialization errors while writing a bundle
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Experiment orchestration errors (run log, worker pool)
    #[error("Experiment error: {0}")]
    Experiment(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error from an opaque collaborator
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with MedleyError.
pub type Result<T> = std::result::Result<T, MedleyError>;

impl MedleyError {
    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        MedleyError::InvalidArgument(msg.into())
    }

    /// Create a new dataset error.
    pub fn dataset<S: Into<String>>(msg: S) -> Self {
        MedleyError::Dataset(msg.into())
    }

    /// Create a new scoring error.
    pub fn scoring<S: Into<String>>(msg: S) -> Self {
        MedleyError::Scoring(msg.into())
    }

    /// Create a new fusion error.
    pub fn fusion<S: Into<String>>(msg: S) -> Self {
        MedleyError::Fusion(msg.into())
    }

    /// Create a new bundle load error.
    pub fn bundle_load<S: Into<String>>(msg: S) -> Self {
        MedleyError::BundleLoad(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        MedleyError::Serialization(msg.into())
    }

    /// Create a new experiment error.
    pub fn experiment<S: Into<String>>(msg: S) -> Self {
        MedleyError::Experiment(msg.into())
    }
}
