//! Level 1: delta-factor validation against a reference equation of state.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use dojo_core::{ChallengeRunner, DojoReport, ParameterSet, Pseudopotential, RawResult};

use crate::config::DeltaFactorConfig;
use crate::criteria::AcceptanceFilter;
use crate::level::{require_metric, LevelReport, TrainingContext, TrainingError, TrainingLevel};

/// Fields every delta-factor result must carry.
pub const REQUIRED_METRICS: [&str; 4] = ["delta_factor", "v0", "b", "bp"];

/// Relative errors recorded when the engine provides them.
pub const OPTIONAL_METRICS: [&str; 3] = ["perr_v0", "perr_b", "perr_bp"];

/// Level 1: one reference calculation, judged by configurable criteria.
///
/// # Cost
/// High (full equation-of-state fit per pseudopotential)
pub struct DeltaFactorLevel {
    runner: Arc<dyn ChallengeRunner>,
    kppa: u32,
    filter: AcceptanceFilter,
}

impl DeltaFactorLevel {
    pub const LEVEL: u32 = 1;
    pub const REPORT_KEY: &'static str = "delta_factor";

    pub fn new(runner: Arc<dyn ChallengeRunner>, config: DeltaFactorConfig) -> Self {
        Self {
            runner,
            kppa: config.kppa,
            filter: AcceptanceFilter::new(config.criteria),
        }
    }

    pub fn filter(&self) -> &AcceptanceFilter {
        &self.filter
    }
}

impl TrainingLevel for DeltaFactorLevel {
    fn name(&self) -> &str {
        "DeltaFactorMaster"
    }

    fn level(&self) -> u32 {
        Self::LEVEL
    }

    fn report_key(&self) -> &str {
        Self::REPORT_KEY
    }

    fn challenge(
        &self,
        workdir: &Path,
        pseudo: &Pseudopotential,
        ctx: &TrainingContext<'_>,
    ) -> Result<RawResult, TrainingError> {
        let params = ParameterSet::DeltaFactor { kppa: self.kppa };
        Ok(self.runner.run(workdir, pseudo, &params, ctx.cancel)?)
    }

    fn make_report(&self, results: &RawResult) -> Result<LevelReport, TrainingError> {
        let mut metrics = Map::new();

        for key in REQUIRED_METRICS {
            let value = require_metric(self.name(), results, key)?;
            if value.as_f64().is_none() {
                return Err(TrainingError::InvalidMetric {
                    level: self.name().to_string(),
                    metric: key.to_string(),
                    reason: format!("expected a number, got {value}"),
                });
            }
            metrics.insert(key.to_string(), value.clone());
        }

        for key in OPTIONAL_METRICS {
            if let Some(value) = results.get(key) {
                metrics.insert(key.to_string(), value.clone());
            }
        }

        let metrics = Value::Object(metrics);
        let reason = self.filter.rejection_reason(&metrics);
        let fragment = DojoReport::fragment(Self::REPORT_KEY, metrics);

        Ok(match reason {
            Some(reason) => LevelReport::rejected(fragment, reason),
            None => LevelReport::accepted(fragment),
        })
    }
}
