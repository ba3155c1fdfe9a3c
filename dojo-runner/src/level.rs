//! Training levels, one rung of the validation ladder each.
//!
//! A level owns one report key. It runs a challenge through a
//! `ChallengeRunner`, reduces the raw results into a report fragment and a
//! verdict, and `train` persists the fragment only when the verdict is
//! positive, so the report keys stay a prefix of the level ordering.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use serde_json::Value;
use thiserror::Error;

use dojo_core::{
    check_cancelled, ChallengeError, DojoReport, LevelKeys, Pseudopotential, RawResult,
    ReportError, ReportStore,
};

/// File the raw challenge results are saved to inside the level directory.
pub const RAW_RESULTS_FILE: &str = "ppdojo_results.json";

/// Errors from a single training attempt.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("challenge failed: {0}")]
    Challenge(#[from] ChallengeError),

    #[error("{metric} is missing in {level} results")]
    MissingMetric { level: String, metric: String },

    #[error("{metric} in {level} results is unusable: {reason}")]
    InvalidMetric {
        level: String,
        metric: String,
        reason: String,
    },

    #[error("{level} rejected the pseudopotential: {reason}")]
    Rejected {
        level: String,
        reason: String,
        /// Fragment that was computed but not persisted.
        fragment: DojoReport,
    },

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    #[error("working directory error: {0}")]
    Io(#[from] io::Error),
}

/// Reduced results of one level: the fragment to persist and the verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    /// Fragment keyed by the level's report key.
    pub fragment: DojoReport,
    pub accepted: bool,
    pub rejection_reason: Option<String>,
}

impl LevelReport {
    pub fn accepted(fragment: DojoReport) -> Self {
        Self {
            fragment,
            accepted: true,
            rejection_reason: None,
        }
    }

    pub fn rejected(fragment: DojoReport, reason: impl Into<String>) -> Self {
        Self {
            fragment,
            accepted: false,
            rejection_reason: Some(reason.into()),
        }
    }
}

/// Run-time options shared by every level of a training pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainingContext<'a> {
    /// Replace existing report sections instead of failing with a conflict.
    pub overwrite: bool,
    /// Save the raw results next to the level's working files.
    pub save_raw_results: bool,
    /// Cooperative cancellation flag forwarded to challenge runners.
    pub cancel: Option<&'a AtomicBool>,
}

/// One stage of the validation ladder.
pub trait TrainingLevel: Send + Sync {
    /// Level name (for progress output).
    fn name(&self) -> &str;

    /// Position in the ladder; level 0 is the entry level.
    fn level(&self) -> u32;

    /// Report section this level owns.
    fn report_key(&self) -> &str;

    /// Run the numerical test in `workdir` (created by the caller) and return the raw results.
    fn challenge(
        &self,
        workdir: &Path,
        pseudo: &Pseudopotential,
        ctx: &TrainingContext<'_>,
    ) -> Result<RawResult, TrainingError>;

    /// Reduce raw results into this level's fragment and verdict. Pure.
    fn make_report(&self, results: &RawResult) -> Result<LevelReport, TrainingError>;

    /// A level trains an artifact whose current level is exactly one below it;
    /// level 0 trains artifacts with no history.
    fn accepts_pseudo(&self, report: &DojoReport, keys: &LevelKeys) -> bool {
        keys.current_level(report) == self.level().checked_sub(1)
    }

    /// `{workdir}/LEVEL_{n}`.
    fn level_dir(&self, workdir: &Path) -> PathBuf {
        workdir.join(format!("LEVEL_{}", self.level()))
    }

    /// Challenge, reduce, and persist the fragment on acceptance.
    ///
    /// A rejected fragment is returned inside `TrainingError::Rejected` and
    /// never written.
    fn train(
        &self,
        workdir: &Path,
        pseudo: &Pseudopotential,
        store: &dyn ReportStore,
        ctx: &TrainingContext<'_>,
    ) -> Result<LevelReport, TrainingError> {
        check_cancelled(ctx.cancel)?;

        let level_dir = self.level_dir(workdir);
        fs::create_dir_all(&level_dir)?;

        let results = self.challenge(&level_dir, pseudo, ctx)?;
        if ctx.save_raw_results {
            save_raw_results(&level_dir, &results)?;
        }

        let report = self.make_report(&results)?;
        if !report.accepted {
            return Err(TrainingError::Rejected {
                level: self.name().to_string(),
                reason: report
                    .rejection_reason
                    .clone()
                    .unwrap_or_else(|| "failed acceptance criteria".to_string()),
                fragment: report.fragment,
            });
        }

        store.write_report(pseudo, report.fragment.clone(), ctx.overwrite)?;
        Ok(report)
    }
}

/// Fetch a field the level cannot do without.
pub fn require_metric<'r>(
    level: &str,
    results: &'r RawResult,
    metric: &str,
) -> Result<&'r Value, TrainingError> {
    results
        .get(metric)
        .ok_or_else(|| TrainingError::MissingMetric {
            level: level.to_string(),
            metric: metric.to_string(),
        })
}

fn save_raw_results(level_dir: &Path, results: &RawResult) -> Result<(), TrainingError> {
    let json = serde_json::to_string_pretty(results)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(level_dir.join(RAW_RESULTS_FILE), json)?;
    Ok(())
}
