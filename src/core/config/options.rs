//! Per-stage option maps.
//!
//! Options are kept untyped until a stage's `setup` reads them, so that
//! each stage validates exactly the keys it recognizes. Unknown keys are
//! ignored; a missing required key is a fatal [`StageError`].

use crate::core::stage::ErrorPolicy;
use crate::error::StageError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Option key selecting the error policy of classifier stages
pub const ON_ERROR_KEY: &str = "on_error";

/// Recognized-options structure handed to one stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageOptions {
    values: BTreeMap<String, Value>,
}

impl StageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for programmatic assembly and tests
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    fn missing(key: &str) -> StageError {
        StageError::MissingOption {
            key: key.to_string(),
        }
    }

    fn invalid(key: &str, expected: &str) -> StageError {
        StageError::InvalidOption {
            key: key.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Read an optional number (integers are accepted)
    pub fn f64(&self, key: &str) -> Result<Option<f64>, StageError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| Self::invalid(key, "a number")),
        }
    }

    pub fn require_f64(&self, key: &str) -> Result<f64, StageError> {
        self.f64(key)?.ok_or_else(|| Self::missing(key))
    }

    /// Read an optional non-negative integer
    pub fn u64(&self, key: &str) -> Result<Option<u64>, StageError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| Self::invalid(key, "a non-negative integer")),
        }
    }

    /// Read an optional string
    pub fn str(&self, key: &str) -> Result<Option<&str>, StageError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| Self::invalid(key, "a string")),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str, StageError> {
        self.str(key)?.ok_or_else(|| Self::missing(key))
    }

    /// Error policy from the `on_error` key (`keep` or `drop`), `default` if absent
    pub fn error_policy(&self, default: ErrorPolicy) -> Result<ErrorPolicy, StageError> {
        match self.str(ON_ERROR_KEY)? {
            None => Ok(default),
            Some("keep") => Ok(ErrorPolicy::FailOpen),
            Some("drop") => Ok(ErrorPolicy::FailClosed),
            Some(_) => Err(Self::invalid(ON_ERROR_KEY, "'keep' or 'drop'")),
        }
    }
}
