//! The dojo drives pseudopotentials up the training ladder.
//!
//! For each pseudopotential, levels are visited in ascending order. Before
//! every level the report is re-read from the store, so eligibility always
//! reflects persisted state and a later run resumes where the last one
//! stopped. Pseudopotentials are independent: with `threads > 1` they train
//! concurrently on a dedicated rayon pool, each one strictly sequential
//! through its own levels.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use thiserror::Error;

use dojo_core::{
    ChallengeError, DojoReport, FileResolver, LevelKeys, PseudoRef, PseudoResolver,
    Pseudopotential, ReportError, ReportStore, ResolveError,
};

use crate::config::{ConfigError, DojoConfig};
use crate::level::{LevelReport, TrainingContext, TrainingError, TrainingLevel};
use crate::outcome::{DojoRunSummary, OutcomeStatus, TrainingOutcome};
use crate::progress::TrainingProgress;
use crate::registry::{LevelRegistry, RegistryError};

/// Errors that stop a run before any pseudopotential trains.
#[derive(Debug, Error)]
pub enum DojoError {
    #[error("level registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("cannot resolve pseudopotential: {0}")]
    Resolve(#[from] ResolveError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

/// Orchestrates training of a working set of pseudopotentials.
pub struct Dojo {
    registry: LevelRegistry,
    keys: LevelKeys,
    store: Arc<dyn ReportStore>,
    resolver: Box<dyn PseudoResolver>,
    pseudos: Vec<Pseudopotential>,
}

impl Dojo {
    /// Create a dojo over a validated ladder.
    ///
    /// Fails if the registry is empty or its level indices are not 0, 1, 2, ...
    pub fn new(registry: LevelRegistry, store: Arc<dyn ReportStore>) -> Result<Self, RegistryError> {
        registry.validate()?;
        let keys = registry.keys();
        Ok(Self {
            registry,
            keys,
            store,
            resolver: Box::new(FileResolver::new()),
            pseudos: Vec::new(),
        })
    }

    /// Replace the default filesystem resolver.
    pub fn with_resolver(mut self, resolver: impl PseudoResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn registry(&self) -> &LevelRegistry {
        &self.registry
    }

    pub fn keys(&self) -> &LevelKeys {
        &self.keys
    }

    pub fn store(&self) -> &dyn ReportStore {
        self.store.as_ref()
    }

    /// Current working set.
    pub fn pseudos(&self) -> &[Pseudopotential] {
        &self.pseudos
    }

    /// Replace the working set.
    ///
    /// All-or-nothing: if any item fails to resolve, the previous working set
    /// is kept and the error returned. Repeated artifacts (same `key()`) keep
    /// only their first occurrence, so no two tasks ever own one report.
    pub fn submit<I>(&mut self, items: I) -> Result<(), ResolveError>
    where
        I: IntoIterator,
        I::Item: Into<PseudoRef>,
    {
        let resolved = items
            .into_iter()
            .map(|item| self.resolver.resolve(&item.into()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        self.pseudos = resolved
            .into_iter()
            .filter(|pseudo| seen.insert(pseudo.key()))
            .collect();
        Ok(())
    }

    /// Replace the working set with a single pseudopotential.
    pub fn submit_one(&mut self, item: impl Into<PseudoRef>) -> Result<(), ResolveError> {
        self.submit([item.into()])
    }

    /// Read a report and check it respects the level ordering.
    pub fn load_report(&self, pseudo: &Pseudopotential) -> Result<DojoReport, ReportError> {
        let report = self.store.read(pseudo)?;
        self.keys.check_prefix(&report)?;
        Ok(report)
    }

    /// Highest level passed according to the persisted report.
    pub fn current_level(&self, pseudo: &Pseudopotential) -> Result<Option<u32>, ReportError> {
        let report = self.load_report(pseudo)?;
        Ok(self.keys.current_level(&report))
    }

    /// Train every pseudopotential in the working set.
    ///
    /// Always returns one outcome per pseudopotential, in submission order.
    /// Per-pseudopotential errors are recorded in outcomes; only an invalid
    /// config or a thread-pool failure returns `Err`.
    pub fn run(
        &self,
        config: &DojoConfig,
        progress: Option<&dyn TrainingProgress>,
        cancel: Option<&AtomicBool>,
    ) -> Result<DojoRunSummary, DojoError> {
        config.validate()?;

        let start_time = Instant::now();
        let abort = AtomicBool::new(false);
        let total = self.pseudos.len();

        let train = |(index, pseudo): (usize, &Pseudopotential)| {
            self.train_pseudo(pseudo, index, total, config, progress, cancel, &abort)
        };

        let outcomes: Vec<TrainingOutcome> = if config.threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build()
                .map_err(|e| DojoError::ThreadPool(e.to_string()))?;
            pool.install(|| self.pseudos.par_iter().enumerate().map(train).collect())
        } else {
            self.pseudos.iter().enumerate().map(train).collect()
        };

        let summary = DojoRunSummary {
            outcomes,
            elapsed_secs: start_time.elapsed().as_secs_f64(),
        };

        if let Some(p) = progress {
            p.on_batch_complete(&summary);
        }

        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn train_pseudo(
        &self,
        pseudo: &Pseudopotential,
        index: usize,
        total: usize,
        config: &DojoConfig,
        progress: Option<&dyn TrainingProgress>,
        cancel: Option<&AtomicBool>,
        abort: &AtomicBool,
    ) -> TrainingOutcome {
        let mut outcome = TrainingOutcome::started(&pseudo.name);

        if abort.load(Ordering::Relaxed) {
            outcome.status = OutcomeStatus::Aborted;
            return outcome;
        }

        if let Some(p) = progress {
            p.on_start(pseudo, index, total);
        }

        let mut status = self.climb(pseudo, config, progress, cancel, abort, &mut outcome);

        match self.store.read(pseudo) {
            Ok(report) => outcome.report_digest = Some(report.digest()),
            Err(e) if matches!(status, OutcomeStatus::Completed) => {
                status = OutcomeStatus::Failed {
                    level: None,
                    error: format!("cannot read final report: {e}"),
                };
            }
            // Keep the status the pass already ended with.
            Err(_) => {}
        }
        outcome.status = status;

        if outcome.is_failure() && !config.continue_on_failure {
            abort.store(true, Ordering::Relaxed);
        }
        outcome.finished_at = Utc::now();

        if let Some(p) = progress {
            p.on_pseudo_complete(&outcome);
        }

        outcome
    }

    /// Walk the ladder for one pseudopotential and return how the pass ended.
    fn climb(
        &self,
        pseudo: &Pseudopotential,
        config: &DojoConfig,
        progress: Option<&dyn TrainingProgress>,
        cancel: Option<&AtomicBool>,
        abort: &AtomicBool,
        outcome: &mut TrainingOutcome,
    ) -> OutcomeStatus {
        match self.current_level(pseudo) {
            Ok(level) => {
                outcome.start_level = level;
                outcome.level_reached = level;
            }
            Err(e) => {
                return OutcomeStatus::Failed {
                    level: None,
                    error: e.to_string(),
                }
            }
        }

        let workdir = config.workdir_root.join(pseudo.workdir_name());
        let ctx = TrainingContext {
            overwrite: config.overwrite_existing,
            save_raw_results: config.save_raw_results,
            cancel,
        };

        for level in self.registry.iter() {
            let idx = level.level();

            let report = match self.load_report(pseudo) {
                Ok(report) => report,
                Err(e) => {
                    return OutcomeStatus::Failed {
                        level: Some(idx),
                        error: e.to_string(),
                    }
                }
            };

            if !level.accepts_pseudo(&report, &self.keys) {
                if let Some(p) = progress {
                    p.on_level_skipped(pseudo, level);
                }
                let already_passed = self.keys.current_level(&report).is_some_and(|c| idx <= c);
                if already_passed {
                    continue;
                }
                break;
            }

            if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
                return OutcomeStatus::Cancelled { level: idx };
            }
            if abort.load(Ordering::Relaxed) {
                return OutcomeStatus::Aborted;
            }

            if let Err(e) = fs::create_dir_all(&workdir) {
                return OutcomeStatus::Failed {
                    level: Some(idx),
                    error: format!("cannot create {}: {e}", workdir.display()),
                };
            }

            if let Some(p) = progress {
                p.on_level_start(pseudo, level);
            }

            let result = self.train_with_retries(
                level,
                &workdir,
                pseudo,
                &ctx,
                config.challenge_retries,
                progress,
            );

            if let Some(p) = progress {
                p.on_level_complete(pseudo, level, &result);
            }

            match result {
                Ok(_) => {
                    outcome.levels_passed.push(idx);
                    outcome.level_reached = Some(idx);
                }
                Err(TrainingError::Rejected { reason, .. }) => {
                    return OutcomeStatus::Rejected { level: idx, reason };
                }
                Err(TrainingError::Challenge(ChallengeError::Cancelled)) => {
                    return OutcomeStatus::Cancelled { level: idx };
                }
                Err(e) => {
                    return OutcomeStatus::Failed {
                        level: Some(idx),
                        error: e.to_string(),
                    };
                }
            }
        }

        OutcomeStatus::Completed
    }

    /// Retry policy for execution failures lives here, not in the levels.
    fn train_with_retries(
        &self,
        level: &dyn TrainingLevel,
        workdir: &Path,
        pseudo: &Pseudopotential,
        ctx: &TrainingContext<'_>,
        retries: u32,
        progress: Option<&dyn TrainingProgress>,
    ) -> Result<LevelReport, TrainingError> {
        let mut attempt = 0;
        loop {
            match level.train(workdir, pseudo, self.store.as_ref(), ctx) {
                Err(TrainingError::Challenge(e)) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    if let Some(p) = progress {
                        p.on_retry(pseudo, level, attempt);
                    }
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::standard_levels;
    use dojo_core::{MemoryReportStore, ResultFileRunner};

    fn dojo() -> Dojo {
        let config = DojoConfig::default();
        let registry =
            LevelRegistry::from_levels(standard_levels(Arc::new(ResultFileRunner::new()), &config))
                .unwrap();
        Dojo::new(registry, Arc::new(MemoryReportStore::new())).unwrap()
    }

    #[test]
    fn standard_ladder_keys() {
        let dojo = dojo();
        let keys: Vec<&str> = dojo.keys().iter().collect();
        assert_eq!(keys, vec!["hints", "delta_factor"]);
    }

    #[test]
    fn empty_registry_is_refused() {
        let err = Dojo::new(LevelRegistry::new(), Arc::new(MemoryReportStore::new()))
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::Empty));
    }

    #[test]
    fn submit_accepts_artifacts_and_single_items() {
        let mut dojo = dojo();
        dojo.submit(vec![Pseudopotential::new("Si.psp8"), Pseudopotential::new("O.psp8")])
            .unwrap();
        assert_eq!(dojo.pseudos().len(), 2);

        dojo.submit_one(Pseudopotential::new("C.psp8")).unwrap();
        assert_eq!(dojo.pseudos().len(), 1);
        assert_eq!(dojo.pseudos()[0].name, "C.psp8");
    }

    #[test]
    fn submit_drops_repeated_artifacts() {
        let mut dojo = dojo();
        dojo.submit(vec![
            Pseudopotential::new("Si.psp8"),
            Pseudopotential::new("O.psp8"),
            Pseudopotential::new("Si.psp8"),
        ])
        .unwrap();

        let names: Vec<&str> = dojo.pseudos().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Si.psp8", "O.psp8"]);
    }

    #[test]
    fn submit_keeps_same_named_files_from_different_directories() {
        let tmp = tempfile::tempdir().unwrap();
        for dir in ["pbe", "lda"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
            fs::write(tmp.path().join(dir).join("Si.psp8"), "pseudo").unwrap();
        }

        let mut dojo = dojo().with_resolver(FileResolver::with_base_dir(tmp.path()));
        dojo.submit(["pbe/Si.psp8", "lda/Si.psp8", "pbe/Si.psp8"]).unwrap();
        assert_eq!(dojo.pseudos().len(), 2);
    }

    #[test]
    fn failed_submit_keeps_previous_working_set() {
        let mut dojo = dojo();
        dojo.submit_one(Pseudopotential::new("Si.psp8")).unwrap();

        let err = dojo
            .submit(vec![
                PseudoRef::from(Pseudopotential::new("O.psp8")),
                PseudoRef::from("/no/such/file.psp8"),
            ])
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
        assert_eq!(dojo.pseudos()[0].name, "Si.psp8");
    }

    #[test]
    fn empty_working_set_runs_to_empty_summary() {
        let dojo = dojo();
        let summary = dojo.run(&DojoConfig::default(), None, None).unwrap();
        assert!(summary.outcomes.is_empty());
    }

    #[test]
    fn invalid_config_is_refused() {
        let dojo = dojo();
        let config = DojoConfig {
            threads: 0,
            ..DojoConfig::default()
        };
        assert!(matches!(
            dojo.run(&config, None, None).unwrap_err(),
            DojoError::Config(_)
        ));
    }

    #[test]
    fn current_level_reports_gap() {
        let store = MemoryReportStore::new().with_report(
            "Si.psp8",
            DojoReport::fragment("delta_factor", serde_json::json!({})),
        );
        let config = DojoConfig::default();
        let registry =
            LevelRegistry::from_levels(standard_levels(Arc::new(ResultFileRunner::new()), &config))
                .unwrap();
        let dojo = Dojo::new(registry, Arc::new(store)).unwrap();

        let err = dojo
            .current_level(&Pseudopotential::new("Si.psp8"))
            .unwrap_err();
        assert!(matches!(err, ReportError::Gap { .. }));
    }
}
