//! Report persistence.
//!
//! `ReportStore::write_report` is the only code path that mutates a persisted
//! report: it reads the current state, merges a fragment and writes the whole
//! report back.
//!
//! Implementations:
//! - `ReportDir`: one JSON file per pseudopotential, atomic writes (.tmp + rename)
//! - `MemoryReportStore`: in-process map, for embedding and tests

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::pseudo::Pseudopotential;
use crate::report::{DojoReport, ReportError};

/// Persisted report storage keyed by pseudopotential identity.
///
/// Must be read-your-writes consistent within a process.
pub trait ReportStore: Send + Sync {
    /// Load the persisted report; an artifact with no history yields an empty report.
    fn read(&self, pseudo: &Pseudopotential) -> Result<DojoReport, ReportError>;

    /// Replace the persisted report. Either the whole report lands or nothing does.
    fn write(&self, pseudo: &Pseudopotential, report: &DojoReport) -> Result<(), ReportError>;

    /// Merge `fragment` into the persisted report and return the merged state.
    ///
    /// A conflicting key without `overwrite` fails before anything is written.
    fn write_report(
        &self,
        pseudo: &Pseudopotential,
        fragment: DojoReport,
        overwrite: bool,
    ) -> Result<DojoReport, ReportError> {
        let mut report = self.read(pseudo)?;
        report.merge(fragment, overwrite)?;
        self.write(pseudo, &report)?;
        Ok(report)
    }
}

/// Directory of `{key}.djrepo` JSON files, one per artifact identity.
#[derive(Debug, Clone)]
pub struct ReportDir {
    dir: PathBuf,
}

impl ReportDir {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the report file for a pseudopotential.
    pub fn report_path(&self, pseudo: &Pseudopotential) -> PathBuf {
        self.dir.join(format!("{}.djrepo", pseudo.key()))
    }
}

impl ReportStore for ReportDir {
    fn read(&self, pseudo: &Pseudopotential) -> Result<DojoReport, ReportError> {
        let path = self.report_path(pseudo);
        let read_err = |reason: String| ReportError::Read {
            name: pseudo.name.clone(),
            reason,
        };

        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(DojoReport::new()),
            Err(e) => return Err(read_err(format!("{}: {e}", path.display()))),
        };

        DojoReport::from_json(&json).map_err(|e| read_err(format!("{}: {e}", path.display())))
    }

    fn write(&self, pseudo: &Pseudopotential, report: &DojoReport) -> Result<(), ReportError> {
        let write_err = |reason: String| ReportError::Write {
            name: pseudo.name.clone(),
            reason,
        };

        fs::create_dir_all(&self.dir)
            .map_err(|e| write_err(format!("failed to create {}: {e}", self.dir.display())))?;

        let json = report
            .to_json_pretty()
            .map_err(|e| write_err(format!("serialization: {e}")))?;

        let path = self.report_path(pseudo);
        let tmp_path = path.with_extension("djrepo.tmp");
        fs::write(&tmp_path, json).map_err(|e| write_err(format!("temp write: {e}")))?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            write_err(format!("atomic rename failed: {e}"))
        })
    }
}

/// Reports held in memory, keyed by `Pseudopotential::key`.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    reports: Mutex<HashMap<String, DojoReport>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an existing report under an artifact key.
    pub fn with_report(self, key: impl Into<String>, report: DojoReport) -> Self {
        if let Ok(mut reports) = self.reports.lock() {
            reports.insert(key.into(), report);
        }
        self
    }
}

impl ReportStore for MemoryReportStore {
    fn read(&self, pseudo: &Pseudopotential) -> Result<DojoReport, ReportError> {
        let reports = self.reports.lock().map_err(|_| ReportError::Read {
            name: pseudo.name.clone(),
            reason: "report store lock poisoned".into(),
        })?;
        Ok(reports.get(&pseudo.key()).cloned().unwrap_or_default())
    }

    fn write(&self, pseudo: &Pseudopotential, report: &DojoReport) -> Result<(), ReportError> {
        let mut reports = self.reports.lock().map_err(|_| ReportError::Write {
            name: pseudo.name.clone(),
            reason: "report store lock poisoned".into(),
        })?;
        reports.insert(pseudo.key(), report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn si() -> Pseudopotential {
        Pseudopotential::new("Si.psp8")
    }

    #[test]
    fn missing_report_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = ReportDir::new(tmp.path().join("reports"));
        assert!(store.read(&si()).unwrap().is_empty());
    }

    #[test]
    fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let store = ReportDir::new(tmp.path().join("reports"));

        let report = DojoReport::fragment("hints", json!({"low": 5, "normal": 10, "high": 15}));
        store.write(&si(), &report).unwrap();

        assert_eq!(store.read(&si()).unwrap(), report);
        assert!(store.report_path(&si()).exists());
        assert!(!store.report_path(&si()).with_extension("djrepo.tmp").exists());
    }

    #[test]
    fn corrupt_report_is_a_read_error() {
        let tmp = TempDir::new().unwrap();
        let store = ReportDir::new(tmp.path());
        fs::write(store.report_path(&si()), "{ not json").unwrap();

        let err = store.read(&si()).unwrap_err();
        assert!(matches!(err, ReportError::Read { .. }));
    }

    #[test]
    fn conflict_leaves_file_bytes_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = ReportDir::new(tmp.path());
        store
            .write_report(&si(), DojoReport::fragment("hints", json!({"low": 5})), false)
            .unwrap();
        let before = fs::read(store.report_path(&si())).unwrap();

        let err = store
            .write_report(&si(), DojoReport::fragment("hints", json!({"low": 9})), false)
            .unwrap_err();
        assert!(matches!(err, ReportError::Conflict { .. }));

        let after = fs::read(store.report_path(&si())).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn write_report_merges_and_preserves() {
        let store = MemoryReportStore::new();
        store
            .write_report(&si(), DojoReport::fragment("hints", json!({"low": 5})), false)
            .unwrap();
        let merged = store
            .write_report(
                &si(),
                DojoReport::fragment("delta_factor", json!({"delta_factor": 0.4})),
                false,
            )
            .unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(store.read(&si()).unwrap(), merged);
    }

    #[test]
    fn overwrite_replaces_existing_section() {
        let store = MemoryReportStore::new()
            .with_report("Si.psp8", DojoReport::fragment("hints", json!({"low": 5})));

        store
            .write_report(&si(), DojoReport::fragment("hints", json!({"low": 6})), true)
            .unwrap();
        assert_eq!(store.read(&si()).unwrap().get("hints"), Some(&json!({"low": 6})));
    }

    #[test]
    fn memory_store_isolates_artifacts() {
        let store = MemoryReportStore::new();
        store
            .write_report(&si(), DojoReport::fragment("hints", json!({})), false)
            .unwrap();
        assert!(store.read(&Pseudopotential::new("O.psp8")).unwrap().is_empty());
    }

    #[test]
    fn same_named_files_get_separate_reports() {
        let tmp = TempDir::new().unwrap();
        let store = ReportDir::new(tmp.path().join("reports"));
        let pbe = Pseudopotential::from_path(tmp.path().join("pbe/Si.psp8")).unwrap();
        let lda = Pseudopotential::from_path(tmp.path().join("lda/Si.psp8")).unwrap();

        store
            .write_report(&pbe, DojoReport::fragment("hints", json!({"low": 5})), false)
            .unwrap();

        assert_ne!(store.report_path(&pbe), store.report_path(&lda));
        assert!(store.read(&lda).unwrap().is_empty());

        let memory = MemoryReportStore::new();
        memory
            .write_report(&pbe, DojoReport::fragment("hints", json!({"low": 5})), false)
            .unwrap();
        assert!(memory.read(&lda).unwrap().is_empty());
    }
}
