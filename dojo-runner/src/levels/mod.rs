//! Training level implementations.

mod delta_factor;
mod hints;

use std::sync::Arc;

use dojo_core::ChallengeRunner;

use crate::config::DojoConfig;
use crate::level::TrainingLevel;

pub use delta_factor::{DeltaFactorLevel, OPTIONAL_METRICS, REQUIRED_METRICS};
pub use hints::{HintsLevel, HINT_KEYS};

/// Every known level, configured from `config` and sharing one runner.
pub fn standard_levels(
    runner: Arc<dyn ChallengeRunner>,
    config: &DojoConfig,
) -> Vec<Box<dyn TrainingLevel>> {
    vec![
        Box::new(HintsLevel::new(runner.clone(), config.hints.clone())),
        Box::new(DeltaFactorLevel::new(runner, config.delta_factor.clone())),
    ]
}
