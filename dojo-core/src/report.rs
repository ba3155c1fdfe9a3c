//! Dojo reports: the cumulative, level-keyed record attached to a pseudopotential.
//!
//! Each training level owns exactly one report key. The presence of that key
//! means the artifact passed the level, so the keys present in a report must
//! always form a prefix of the level ordering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from report merging and persistence.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot read report for '{name}': {reason}")]
    Read { name: String, reason: String },

    #[error("cannot write report for '{name}': {reason}")]
    Write { name: String, reason: String },

    #[error("'{key}' already exists in the report; refusing to overwrite validated data")]
    Conflict { key: String },

    #[error("report holds '{present}' but is missing '{missing}' from a lower level")]
    Gap { missing: String, present: String },
}

/// Mapping from report section key to the fragment produced by the owning level.
///
/// Keys are kept sorted so the JSON encoding (and its digest) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DojoReport {
    sections: BTreeMap<String, Value>,
}

impl DojoReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A report holding a single section, as produced by one level.
    pub fn fragment(key: impl Into<String>, value: Value) -> Self {
        let mut report = Self::new();
        report.insert(key, value);
        report
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.sections.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.sections.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.sections.insert(key.into(), value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `fragment` into this report.
    ///
    /// Without `overwrite`, any key already present fails with
    /// `ReportError::Conflict` and leaves `self` untouched. All keys not in
    /// the fragment are preserved.
    pub fn merge(&mut self, fragment: DojoReport, overwrite: bool) -> Result<(), ReportError> {
        if !overwrite {
            if let Some(key) = fragment.keys().find(|k| self.contains_key(k)) {
                return Err(ReportError::Conflict {
                    key: key.to_string(),
                });
            }
        }

        self.sections.extend(fragment.sections);
        Ok(())
    }

    /// Canonical JSON encoding used by persistent stores.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a persisted report; the top level must be a JSON object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// blake3 digest of the canonical encoding.
    ///
    /// Two reports with equal digests are byte-for-byte identical when persisted.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

impl FromIterator<(String, Value)> for DojoReport {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            sections: iter.into_iter().collect(),
        }
    }
}

/// Ordered report keys of the registered levels; position `i` is level `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelKeys {
    keys: Vec<String>,
}

impl LevelKeys {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.as_str())
    }

    /// Report key owned by `level`.
    pub fn key_of(&self, level: u32) -> Option<&str> {
        self.keys.get(level as usize).map(|k| k.as_str())
    }

    /// Level that owns `key`.
    pub fn level_of(&self, key: &str) -> Option<u32> {
        self.keys.iter().position(|k| k == key).map(|i| i as u32)
    }

    /// Highest level `L` such that the report holds the keys of levels `0..=L`.
    ///
    /// `None` means the artifact has not passed any level yet. Keys that do
    /// not belong to a registered level are ignored.
    pub fn current_level(&self, report: &DojoReport) -> Option<u32> {
        let passed = self
            .keys
            .iter()
            .take_while(|k| report.contains_key(k))
            .count();
        (passed as u32).checked_sub(1)
    }

    /// Verify the level keys present in `report` form a prefix of the ordering.
    pub fn check_prefix(&self, report: &DojoReport) -> Result<(), ReportError> {
        let Some(first_missing) = self.keys.iter().position(|k| !report.contains_key(k)) else {
            return Ok(());
        };

        match self.keys[first_missing + 1..]
            .iter()
            .find(|k| report.contains_key(k))
        {
            Some(present) => Err(ReportError::Gap {
                missing: self.keys[first_missing].clone(),
                present: present.clone(),
            }),
            None => Ok(()),
        }
    }
}
