//! Progress reporting for training runs.
//!
//! Called from worker threads when pseudopotentials train concurrently, so
//! implementations must be `Sync`.

use dojo_core::Pseudopotential;

use crate::level::{LevelReport, TrainingError, TrainingLevel};
use crate::outcome::{DojoRunSummary, TrainingOutcome};

/// Observer of a `Dojo::run`. All callbacks default to doing nothing.
pub trait TrainingProgress: Send + Sync {
    /// Called when a pseudopotential enters the dojo.
    fn on_start(&self, _pseudo: &Pseudopotential, _index: usize, _total: usize) {}

    /// Called when a level declines a pseudopotential.
    fn on_level_skipped(&self, _pseudo: &Pseudopotential, _level: &dyn TrainingLevel) {}

    /// Called right before a level trains a pseudopotential.
    fn on_level_start(&self, _pseudo: &Pseudopotential, _level: &dyn TrainingLevel) {}

    /// Called after each training attempt, successful or not.
    fn on_level_complete(
        &self,
        _pseudo: &Pseudopotential,
        _level: &dyn TrainingLevel,
        _result: &Result<LevelReport, TrainingError>,
    ) {
    }

    /// Called when a challenge is retried after an execution failure.
    fn on_retry(&self, _pseudo: &Pseudopotential, _level: &dyn TrainingLevel, _attempt: u32) {}

    /// Called when a pseudopotential leaves the dojo.
    fn on_pseudo_complete(&self, _outcome: &TrainingOutcome) {}

    /// Called once the whole batch is done.
    fn on_batch_complete(&self, _summary: &DojoRunSummary) {}
}

/// Progress reporter that prints to stdout.
pub struct StdoutProgress;

impl TrainingProgress for StdoutProgress {
    fn on_start(&self, pseudo: &Pseudopotential, index: usize, total: usize) {
        println!("[{}/{}] {pseudo} enters the dojo", index + 1, total);
    }

    fn on_level_skipped(&self, pseudo: &Pseudopotential, level: &dyn TrainingLevel) {
        println!("{}: Sorry, {pseudo}-san, I cannot train you", level.name());
    }

    fn on_level_start(&self, pseudo: &Pseudopotential, level: &dyn TrainingLevel) {
        println!(
            "{}: Welcome {pseudo}-san, I will be your level {} trainer",
            level.name(),
            level.level()
        );
    }

    fn on_level_complete(
        &self,
        pseudo: &Pseudopotential,
        level: &dyn TrainingLevel,
        result: &Result<LevelReport, TrainingError>,
    ) {
        match result {
            Ok(_) => println!("  PASSED: {pseudo} level {}", level.level()),
            Err(TrainingError::Rejected { reason, .. }) => {
                println!("  REJECTED: {pseudo} level {}: {reason}", level.level())
            }
            Err(e) => println!("  FAIL: {pseudo} level {}: {e}", level.level()),
        }
    }

    fn on_retry(&self, pseudo: &Pseudopotential, level: &dyn TrainingLevel, attempt: u32) {
        println!("  RETRY {attempt}: {pseudo} level {}", level.level());
    }

    fn on_batch_complete(&self, summary: &DojoRunSummary) {
        println!(
            "\nTraining complete: {}/{} completed, {} failed ({:.1}s)",
            summary.success_count(),
            summary.outcomes.len(),
            summary.failure_count(),
            summary.elapsed_secs
        );
    }
}
