//! Level 0: cutoff-energy hints (convergence screening).
//!
//! A coarse open-ended search locates the low/high cutoff region, then a
//! finer sweep over that window produces the low/normal/high hints.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};

use dojo_core::{check_cancelled, ChallengeRunner, DojoReport, ParameterSet, Pseudopotential, RawResult};

use crate::config::HintsConfig;
use crate::level::{require_metric, LevelReport, TrainingContext, TrainingError, TrainingLevel};

/// The three operating points recorded by this level.
pub const HINT_KEYS: [&str; 3] = ["low", "normal", "high"];

/// Upper bound on the number of cutoffs in the fine sweep.
const MAX_FINE_POINTS: usize = 1000;

/// Level 0: convergence screening.
///
/// Always accepts once all three hints are present.
pub struct HintsLevel {
    runner: Arc<dyn ChallengeRunner>,
    config: HintsConfig,
}

impl HintsLevel {
    pub const LEVEL: u32 = 0;
    pub const REPORT_KEY: &'static str = "hints";

    pub fn new(runner: Arc<dyn ChallengeRunner>, config: HintsConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &HintsConfig {
        &self.config
    }

    /// Cutoffs for the fine sweep, bounded by the coarse low/high hints.
    ///
    /// Window: `[max(low - coarse_step, min_ecut), high + coarse_step)` in
    /// `fine_step` increments.
    pub fn fine_ecuts(&self, coarse: &RawResult) -> Result<Vec<f64>, TrainingError> {
        let low = self.ecut_of(coarse, "low")?;
        let high = self.ecut_of(coarse, "high")?;

        let start = (low - self.config.coarse_step).max(self.config.min_ecut);
        let stop = high + self.config.coarse_step;
        let step = self.config.fine_step;

        let points = ((stop - start) / step).ceil();
        if !points.is_finite() || points < 1.0 || points > MAX_FINE_POINTS as f64 {
            return Err(TrainingError::InvalidMetric {
                level: self.name().to_string(),
                metric: "high".to_string(),
                reason: format!("cannot sweep [{start}, {stop}) with step {step}"),
            });
        }

        Ok((0..points as usize)
            .map(|i| start + i as f64 * step)
            .collect())
    }

    /// A hint is either a bare cutoff or an object carrying an `ecut` field.
    fn ecut_of(&self, results: &RawResult, metric: &str) -> Result<f64, TrainingError> {
        let value = require_metric(self.name(), results, metric)?;
        value
            .as_f64()
            .or_else(|| value.get("ecut").and_then(Value::as_f64))
            .ok_or_else(|| TrainingError::InvalidMetric {
                level: self.name().to_string(),
                metric: metric.to_string(),
                reason: "no numeric cutoff".to_string(),
            })
    }
}

impl TrainingLevel for HintsLevel {
    fn name(&self) -> &str {
        "HintsMaster"
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
        let coarse_dir = workdir.join("coarse");
        fs::create_dir_all(&coarse_dir)?;
        let coarse = self.runner.run(
            &coarse_dir,
            pseudo,
            &ParameterSet::EcutSearch {
                start: self.config.coarse_start,
                step: self.config.coarse_step,
            },
            ctx.cancel,
        )?;

        let ecuts = self.fine_ecuts(&coarse)?;
        check_cancelled(ctx.cancel)?;

        let fine_dir = workdir.join("fine");
        fs::create_dir_all(&fine_dir)?;
        let fine = self.runner.run(
            &fine_dir,
            pseudo,
            &ParameterSet::EcutList { ecuts },
            ctx.cancel,
        )?;

        Ok(fine)
    }

    fn make_report(&self, results: &RawResult) -> Result<LevelReport, TrainingError> {
        let mut hints = Map::new();
        for key in HINT_KEYS {
            let value = require_metric(self.name(), results, key)?;
            hints.insert(key.to_string(), value.clone());
        }

        Ok(LevelReport::accepted(DojoReport::fragment(
            Self::REPORT_KEY,
            Value::Object(hints),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dojo_core::ChallengeError;
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    /// Records every parameter set and replies with a fixed result.
    struct EchoRunner {
        reply: RawResult,
        calls: Mutex<Vec<ParameterSet>>,
    }

    impl EchoRunner {
        fn new(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.as_object().cloned().unwrap(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl ChallengeRunner for EchoRunner {
        fn name(&self) -> &str {
            "echo"
        }

        fn run(
            &self,
            workdir: &Path,
            _pseudo: &Pseudopotential,
            params: &ParameterSet,
            _cancel: Option<&AtomicBool>,
        ) -> Result<RawResult, ChallengeError> {
            assert!(workdir.exists());
            self.calls.lock().unwrap().push(params.clone());
            Ok(self.reply.clone())
        }
    }

    fn raw(value: Value) -> RawResult {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn fine_window_follows_coarse_bounds() {
        let level = HintsLevel::new(EchoRunner::new(json!({})), HintsConfig::default());
        let ecuts = level
            .fine_ecuts(&raw(json!({"low": {"ecut": 20.0}, "high": {"ecut": 30.0}})))
            .unwrap();
        assert_eq!(ecuts, vec![10.0, 15.0, 20.0, 25.0, 30.0, 35.0]);
    }

    #[test]
    fn fine_window_is_clamped_to_min_ecut() {
        let level = HintsLevel::new(EchoRunner::new(json!({})), HintsConfig::default());
        let ecuts = level
            .fine_ecuts(&raw(json!({"low": 5, "normal": 10, "high": 15})))
            .unwrap();
        assert_eq!(ecuts, vec![5.0, 10.0, 15.0, 20.0]);
    }

    #[test]
    fn fine_window_needs_numeric_cutoffs() {
        let level = HintsLevel::new(EchoRunner::new(json!({})), HintsConfig::default());
        let err = level
            .fine_ecuts(&raw(json!({"low": "soft", "high": 15})))
            .unwrap_err();
        assert!(matches!(err, TrainingError::InvalidMetric { ref metric, .. } if metric == "low"));
    }

    #[test]
    fn challenge_runs_coarse_then_fine() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = EchoRunner::new(json!({"low": 5, "normal": 10, "high": 15}));
        let level = HintsLevel::new(runner.clone(), HintsConfig::default());

        let result = level
            .challenge(
                tmp.path(),
                &Pseudopotential::new("Si.psp8"),
                &TrainingContext::default(),
            )
            .unwrap();
        assert_eq!(result["normal"], json!(10));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[
                ParameterSet::EcutSearch {
                    start: 5.0,
                    step: 10.0
                },
                ParameterSet::EcutList {
                    ecuts: vec![5.0, 10.0, 15.0, 20.0]
                },
            ]
        );
    }

    #[test]
    fn make_report_copies_three_hints() {
        let level = HintsLevel::new(EchoRunner::new(json!({})), HintsConfig::default());
        let report = level
            .make_report(&raw(json!({"low": 5, "normal": 10, "high": 15, "extra": 1})))
            .unwrap();

        assert!(report.accepted);
        assert_eq!(
            report.fragment.get("hints"),
            Some(&json!({"low": 5, "normal": 10, "high": 15}))
        );
    }

    #[test]
    fn make_report_without_high_is_missing_metric() {
        let level = HintsLevel::new(EchoRunner::new(json!({})), HintsConfig::default());
        let err = level
            .make_report(&raw(json!({"low": 5, "normal": 10})))
            .unwrap_err();
        assert!(matches!(err, TrainingError::MissingMetric { ref metric, .. } if metric == "high"));
    }
}
