//! Acceptance criteria for training levels.
//!
//! Thresholds are configuration, not code: each entry names a dotted field
//! path inside the level's report fragment (e.g. `delta_factor`,
//! `normal.ecut`) and a bound the value must respect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bounds a level's fragment must satisfy to be accepted.
///
/// Empty criteria accept everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceCriteria {
    /// Inclusive upper bounds, keyed by field path.
    pub max: BTreeMap<String, f64>,
    /// Inclusive lower bounds, keyed by field path.
    pub min: BTreeMap<String, f64>,
}

impl AcceptanceCriteria {
    pub fn is_empty(&self) -> bool {
        self.max.is_empty() && self.min.is_empty()
    }

    /// Criteria with a single upper bound.
    pub fn with_max(mut self, path: impl Into<String>, bound: f64) -> Self {
        self.max.insert(path.into(), bound);
        self
    }

    /// Criteria with a single lower bound.
    pub fn with_min(mut self, path: impl Into<String>, bound: f64) -> Self {
        self.min.insert(path.into(), bound);
        self
    }
}

/// Decides whether a level fragment meets its criteria.
///
/// # Example
/// ```
/// use dojo_runner::criteria::{AcceptanceCriteria, AcceptanceFilter};
/// use serde_json::json;
///
/// let filter = AcceptanceFilter::new(AcceptanceCriteria::default().with_max("delta_factor", 1.0));
///
/// assert!(filter.is_acceptable(&json!({"delta_factor": 0.4})));
/// assert!(!filter.is_acceptable(&json!({"delta_factor": 3.2})));
/// ```
#[derive(Debug, Clone)]
pub struct AcceptanceFilter {
    pub criteria: AcceptanceCriteria,
}

impl AcceptanceFilter {
    pub fn new(criteria: AcceptanceCriteria) -> Self {
        Self { criteria }
    }

    pub fn is_acceptable(&self, fragment: &Value) -> bool {
        self.rejection_reason(fragment).is_none()
    }

    /// First violated bound, if any. Missing or non-numeric fields violate their bound.
    pub fn rejection_reason(&self, fragment: &Value) -> Option<String> {
        for (path, bound) in &self.criteria.max {
            match metric_at(fragment, path) {
                Some(value) if value <= *bound => {}
                Some(value) => {
                    return Some(format!("{path} too high: {value:.4} > {bound:.4}"));
                }
                None => return Some(format!("{path} missing or not numeric")),
            }
        }

        for (path, bound) in &self.criteria.min {
            match metric_at(fragment, path) {
                Some(value) if value >= *bound => {}
                Some(value) => {
                    return Some(format!("{path} too low: {value:.4} < {bound:.4}"));
                }
                None => return Some(format!("{path} missing or not numeric")),
            }
        }

        None
    }
}

/// Look up a numeric value by dotted path.
pub fn metric_at(value: &Value, path: &str) -> Option<f64> {
    path.split('.')
        .try_fold(value, |v, segment| v.get(segment))
        .and_then(Value::as_f64)
}
