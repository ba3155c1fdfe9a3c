//! Per-pseudopotential outcomes of a training run, and ladder statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::LevelRegistry;

/// How a pseudopotential's training pass ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Trained every level it was eligible for (possibly none).
    Completed,
    /// A level judged the results and said no. Not an error.
    Rejected { level: u32, reason: String },
    /// Training could not complete; `level` is `None` when the report could
    /// not be loaded before any level ran.
    Failed { level: Option<u32>, error: String },
    /// Stopped by the cancel flag before `level` started or finished.
    Cancelled { level: u32 },
    /// Skipped or stopped because another pseudopotential failed in fail-fast mode.
    Aborted,
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Completed => "completed",
            OutcomeStatus::Rejected { .. } => "rejected",
            OutcomeStatus::Failed { .. } => "failed",
            OutcomeStatus::Cancelled { .. } => "cancelled",
            OutcomeStatus::Aborted => "aborted",
        }
    }

    /// Level the pass stopped at, when it stopped at one.
    pub fn level(&self) -> Option<u32> {
        match self {
            OutcomeStatus::Rejected { level, .. } | OutcomeStatus::Cancelled { level } => {
                Some(*level)
            }
            OutcomeStatus::Failed { level, .. } => *level,
            OutcomeStatus::Completed | OutcomeStatus::Aborted => None,
        }
    }

    /// Rejection reason or error message.
    pub fn detail(&self) -> Option<&str> {
        match self {
            OutcomeStatus::Rejected { reason, .. } => Some(reason),
            OutcomeStatus::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Result of one pseudopotential's pass through the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub pseudo: String,
    /// Current level when the pass started (`None` = untested).
    pub start_level: Option<u32>,
    /// Current level when the pass ended.
    pub level_reached: Option<u32>,
    /// Levels passed during this pass, ascending.
    pub levels_passed: Vec<u32>,
    pub status: OutcomeStatus,
    /// blake3 digest of the persisted report at the end of the pass.
    pub report_digest: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TrainingOutcome {
    pub(crate) fn started(pseudo: &str) -> Self {
        let now = Utc::now();
        Self {
            pseudo: pseudo.to_string(),
            start_level: None,
            level_reached: None,
            levels_passed: Vec::new(),
            status: OutcomeStatus::Completed,
            report_digest: None,
            started_at: now,
            finished_at: now,
        }
    }

    /// Completed without error or rejection.
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

/// All outcomes of a `Dojo::run`, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DojoRunSummary {
    pub outcomes: Vec<TrainingOutcome>,
    pub elapsed_secs: f64,
}

impl DojoRunSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn outcome(&self, pseudo: &str) -> Option<&TrainingOutcome> {
        self.outcomes.iter().find(|o| o.pseudo == pseudo)
    }

    /// Per-level entered/passed/rejected/failed counts.
    pub fn ladder_summary(&self, registry: &LevelRegistry) -> LadderSummary {
        let level_stats = registry
            .iter()
            .map(|level| {
                let idx = level.level();
                let passed = self
                    .outcomes
                    .iter()
                    .filter(|o| o.levels_passed.contains(&idx))
                    .count();
                let rejected = self
                    .outcomes
                    .iter()
                    .filter(|o| matches!(o.status, OutcomeStatus::Rejected { level, .. } if level == idx))
                    .count();
                let failed = self
                    .outcomes
                    .iter()
                    .filter(|o| matches!(o.status, OutcomeStatus::Failed { level: Some(level), .. } if level == idx))
                    .count();

                LevelStats {
                    level: idx,
                    level_name: level.name().to_string(),
                    entered: passed + rejected + failed,
                    passed,
                    rejected,
                    failed,
                }
            })
            .collect();

        LadderSummary {
            total_pseudos: self.outcomes.len(),
            level_stats,
        }
    }
}

/// Summary statistics for a run through the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LadderSummary {
    pub total_pseudos: usize,
    pub level_stats: Vec<LevelStats>,
}

/// Statistics for a single level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    pub level: u32,
    pub level_name: String,
    pub entered: usize,
    pub passed: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl LadderSummary {
    /// Print a human-readable summary.
    pub fn display(&self) {
        println!("=== Dojo Summary ===");
        println!("Pseudopotentials: {}", self.total_pseudos);
        println!();

        for stats in &self.level_stats {
            println!("Level {}: {}", stats.level, stats.level_name);
            println!("  Entered:   {}", stats.entered);
            println!("  Passed:    {}", stats.passed);
            println!("  Rejected:  {}", stats.rejected);
            println!("  Failed:    {}", stats.failed);
            println!();
        }
    }
}
