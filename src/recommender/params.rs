//! Hyperparameter sets passed to `fit`.
//!
//! Every recommender is fit from a [`FitParams`] value: a JSON-backed map of
//! named hyperparameters with typed accessors and per-call defaults. An
//! empty set is always valid; each recommender documents its own keys and
//! falls back to its defaults for anything missing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MedleyError, Result};

/// A named hyperparameter set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitParams(Map<String, Value>);

impl FitParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        FitParams(Map::new())
    }

    /// Number of parameters present.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set a parameter, builder style.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Set a nested parameter set for one named component.
    pub fn with_nested(mut self, key: &str, params: FitParams) -> Self {
        self.0.insert(key.to_string(), Value::Object(params.0));
        self
    }

    /// Whether a parameter is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Read a float parameter, falling back to `default` when absent.
    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64> {
        match self.0.get(key) {
            None => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| {
                MedleyError::invalid_argument(format!("parameter '{key}' is not a number"))
            }),
        }
    }

    /// Read a non-negative integer parameter, falling back to `default`.
    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.0.get(key) {
            None => Ok(default),
            Some(value) => value
                .as_u64()
                .map(|v| v as usize)
                .ok_or_else(|| {
                    MedleyError::invalid_argument(format!(
                        "parameter '{key}' is not a non-negative integer"
                    ))
                }),
        }
    }

    /// Read a boolean parameter, falling back to `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.0.get(key) {
            None => Ok(default),
            Some(value) => value.as_bool().ok_or_else(|| {
                MedleyError::invalid_argument(format!("parameter '{key}' is not a boolean"))
            }),
        }
    }

    /// Read a nested parameter set for one named component.
    ///
    /// Absent keys yield an empty set, so composites can forward per-component
    /// parameters without requiring every component to be listed.
    pub fn get_nested(&self, key: &str) -> Result<FitParams> {
        match self.0.get(key) {
            None => Ok(FitParams::new()),
            Some(Value::Object(map)) => Ok(FitParams(map.clone())),
            Some(_) => Err(MedleyError::invalid_argument(format!(
                "parameter '{key}' is not a nested parameter set"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_on_empty_set() {
        let params = FitParams::new();
        assert!(params.is_empty());
        assert_eq!(params.get_f64("alpha", 0.5).unwrap(), 0.5);
        assert_eq!(params.get_usize("top_k", 100).unwrap(), 100);
        assert!(params.get_bool("normalize", true).unwrap());
    }

    #[test]
    fn test_typed_accessors() {
        let params = FitParams::new()
            .with("alpha", 0.9)
            .with("top_k", 200)
            .with("normalize", false);

        assert_eq!(params.len(), 3);
        assert_eq!(params.get_f64("alpha", 0.0).unwrap(), 0.9);
        assert_eq!(params.get_usize("top_k", 0).unwrap(), 200);
        assert!(!params.get_bool("normalize", true).unwrap());
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let params = FitParams::new().with("alpha", "not a number");
        assert!(params.get_f64("alpha", 0.0).is_err());
        assert!(params.get_usize("alpha", 0).is_err());
        assert!(params.get_bool("alpha", false).is_err());
    }

    #[test]
    fn test_nested_params() {
        let inner = FitParams::new().with("top_k", 50);
        let outer = FitParams::new().with("alpha", 0.7).with_nested("knn", inner);

        let nested = outer.get_nested("knn").unwrap();
        assert_eq!(nested.get_usize("top_k", 0).unwrap(), 50);

        // Missing nested sets are empty, not errors.
        assert!(outer.get_nested("svd").unwrap().is_empty());
        // A scalar where an object is expected is an error.
        assert!(outer.get_nested("alpha").is_err());
    }
}
