//! Challenge runners: the boundary to external numerical engines.
//!
//! A challenge runner performs one numerical test (a cutoff-energy sweep, a
//! delta-factor equation-of-state run, ...) for a pseudopotential and returns
//! the raw results as a JSON object. Runners are the only place where a
//! training task blocks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::pseudo::Pseudopotential;

/// Raw structured result returned by a challenge runner.
pub type RawResult = Map<String, Value>;

/// Level-specific parameters handed to a challenge runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterSet {
    /// Open-ended cutoff search: start at `start` (Ha) and step by `step`
    /// until the engine declares convergence.
    EcutSearch { start: f64, step: f64 },

    /// Explicit list of cutoff energies (Ha) to evaluate.
    EcutList { ecuts: Vec<f64> },

    /// Delta-factor equation-of-state run at the given k-point density.
    DeltaFactor { kppa: u32 },
}

/// Failures of the external computation.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("challenge execution failed: {0}")]
    Execution(String),

    #[error("challenge returned an invalid result: {0}")]
    InvalidResult(String),

    #[error("challenge cancelled")]
    Cancelled,

    #[error("challenge I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ChallengeError {
    /// Whether a caller may reasonably retry the same challenge.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChallengeError::Execution(_) | ChallengeError::Io(_))
    }
}

/// Runs a numerical test for a pseudopotential.
///
/// The caller creates `workdir` and owns its cleanup. Implementations should
/// poll `cancel` while waiting and return `ChallengeError::Cancelled` when it
/// is raised.
pub trait ChallengeRunner: Send + Sync {
    /// Human-readable name of this runner.
    fn name(&self) -> &str;

    fn run(
        &self,
        workdir: &Path,
        pseudo: &Pseudopotential,
        params: &ParameterSet,
        cancel: Option<&AtomicBool>,
    ) -> Result<RawResult, ChallengeError>;
}

/// Returns `Err(Cancelled)` if the flag is raised.
pub fn check_cancelled(cancel: Option<&AtomicBool>) -> Result<(), ChallengeError> {
    if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
        return Err(ChallengeError::Cancelled);
    }
    Ok(())
}

/// Request written next to the results so an external engine knows what to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub pseudo: String,
    pub path: Option<PathBuf>,
    pub params: ParameterSet,
}

/// Hand-off runner for engines that run outside this process.
///
/// Writes `challenge.json` describing the request into the working directory
/// and collects `results.json` written there by the engine.
#[derive(Debug, Clone, Default)]
pub struct ResultFileRunner;

impl ResultFileRunner {
    pub const REQUEST_FILE: &'static str = "challenge.json";
    pub const RESULTS_FILE: &'static str = "results.json";

    pub fn new() -> Self {
        Self
    }
}

impl ChallengeRunner for ResultFileRunner {
    fn name(&self) -> &str {
        "result-file"
    }

    fn run(
        &self,
        workdir: &Path,
        pseudo: &Pseudopotential,
        params: &ParameterSet,
        cancel: Option<&AtomicBool>,
    ) -> Result<RawResult, ChallengeError> {
        check_cancelled(cancel)?;

        let request = ChallengeRequest {
            pseudo: pseudo.name.clone(),
            path: pseudo.path.clone(),
            params: params.clone(),
        };
        let json = serde_json::to_string_pretty(&request)
            .map_err(|e| ChallengeError::Execution(format!("request serialization: {e}")))?;
        fs::write(workdir.join(Self::REQUEST_FILE), json)?;

        let results_path = workdir.join(Self::RESULTS_FILE);
        let json = match fs::read_to_string(&results_path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ChallengeError::Execution(format!(
                    "no results at {}",
                    results_path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<Value>(&json) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ChallengeError::InvalidResult(format!(
                "{} is not a JSON object",
                results_path.display()
            ))),
            Err(e) => Err(ChallengeError::InvalidResult(format!(
                "{}: {e}",
                results_path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parameter_set_is_tagged() {
        let params = ParameterSet::EcutSearch {
            start: 5.0,
            step: 10.0,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["type"], "ECUT_SEARCH");

        let back: ParameterSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn result_file_runner_reads_results() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join(ResultFileRunner::RESULTS_FILE),
            json!({"low": 5, "normal": 10, "high": 15}).to_string(),
        )
        .unwrap();

        let runner = ResultFileRunner::new();
        let result = runner
            .run(
                tmp.path(),
                &Pseudopotential::new("Si.psp8"),
                &ParameterSet::DeltaFactor { kppa: 1 },
                None,
            )
            .unwrap();

        assert_eq!(result["normal"], json!(10));
        let request = fs::read_to_string(tmp.path().join(ResultFileRunner::REQUEST_FILE)).unwrap();
        assert!(request.contains("DELTA_FACTOR"));
    }

    #[test]
    fn result_file_runner_without_results_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ResultFileRunner::new()
            .run(
                tmp.path(),
                &Pseudopotential::new("Si.psp8"),
                &ParameterSet::DeltaFactor { kppa: 1 },
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ChallengeError::Execution(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn result_file_runner_rejects_non_object() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(ResultFileRunner::RESULTS_FILE), "[1, 2, 3]").unwrap();
        let err = ResultFileRunner::new()
            .run(
                tmp.path(),
                &Pseudopotential::new("Si.psp8"),
                &ParameterSet::EcutList { ecuts: vec![5.0] },
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ChallengeError::InvalidResult(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn cancelled_flag_short_circuits() {
        let tmp = tempfile::tempdir().unwrap();
        let cancel = AtomicBool::new(true);
        let err = ResultFileRunner::new()
            .run(
                tmp.path(),
                &Pseudopotential::new("Si.psp8"),
                &ParameterSet::DeltaFactor { kppa: 1 },
                Some(&cancel),
            )
            .unwrap_err();
        assert!(matches!(err, ChallengeError::Cancelled));
        assert!(!tmp.path().join(ResultFileRunner::REQUEST_FILE).exists());
    }
}
