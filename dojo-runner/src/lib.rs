//! Dojo Runner: training levels, the level registry, and dojo orchestration.
//!
//! This crate builds on `dojo-core` to provide:
//! - The `TrainingLevel` trait and its challenge → report → persist pipeline
//! - Concrete levels: `HintsLevel` (level 0) and `DeltaFactorLevel` (level 1)
//! - `LevelRegistry`, an explicit ladder validated at startup
//! - `Dojo`, which drives a batch of pseudopotentials up the ladder
//! - TOML configuration, acceptance criteria, progress reporting, export

pub mod config;
pub mod criteria;
pub mod dojo;
pub mod export;
pub mod level;
pub mod levels;
pub mod outcome;
pub mod progress;
pub mod registry;

pub use config::{ConfigError, DeltaFactorConfig, DojoConfig, HintsConfig};
pub use criteria::{metric_at, AcceptanceCriteria, AcceptanceFilter};
pub use dojo::{Dojo, DojoError};
pub use export::{
    export_outcomes_csv, export_outcomes_json, load_outcomes_json, save_outcomes,
    write_outcomes_csv, write_outcomes_json,
};
pub use level::{
    require_metric, LevelReport, TrainingContext, TrainingError, TrainingLevel, RAW_RESULTS_FILE,
};
pub use levels::{standard_levels, DeltaFactorLevel, HintsLevel};
pub use outcome::{DojoRunSummary, LadderSummary, LevelStats, OutcomeStatus, TrainingOutcome};
pub use progress::{StdoutProgress, TrainingProgress};
pub use registry::{LevelRegistry, RegistryError};
