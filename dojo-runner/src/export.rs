//! Export of training outcomes as JSON or CSV.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::outcome::{DojoRunSummary, TrainingOutcome};

/// Serialize a run summary to pretty JSON.
pub fn export_outcomes_json(summary: &DojoRunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize run summary to JSON")
}

/// Export outcomes as CSV, one row per pseudopotential.
///
/// Columns: pseudo, status, start_level, level_reached, levels_passed,
/// stopped_level, detail, report_digest, started_at, finished_at
pub fn export_outcomes_csv(outcomes: &[TrainingOutcome]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "pseudo",
        "status",
        "start_level",
        "level_reached",
        "levels_passed",
        "stopped_level",
        "detail",
        "report_digest",
        "started_at",
        "finished_at",
    ])?;

    for o in outcomes {
        let levels_passed = o
            .levels_passed
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(";");

        wtr.write_record([
            o.pseudo.as_str(),
            o.status.label(),
            &level_cell(o.start_level),
            &level_cell(o.level_reached),
            &levels_passed,
            &level_cell(o.status.level()),
            o.status.detail().unwrap_or(""),
            o.report_digest.as_deref().unwrap_or(""),
            &o.started_at.to_rfc3339(),
            &o.finished_at.to_rfc3339(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn level_cell(level: Option<u32>) -> String {
    level.map(|l| l.to_string()).unwrap_or_default()
}

/// Write the summary as JSON to `path`.
pub fn write_outcomes_json(summary: &DojoRunSummary, path: &Path) -> Result<()> {
    let json = export_outcomes_json(summary)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the outcomes as CSV to `path`.
pub fn write_outcomes_csv(summary: &DojoRunSummary, path: &Path) -> Result<()> {
    let csv = export_outcomes_csv(&summary.outcomes)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the summary in the format named by the file extension (`.json` or `.csv`).
pub fn save_outcomes(summary: &DojoRunSummary, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => write_outcomes_json(summary, path),
        Some(ext) if ext.eq_ignore_ascii_case("csv") => write_outcomes_csv(summary, path),
        _ => bail!(
            "unsupported output format for {} (expected .json or .csv)",
            path.display()
        ),
    }
}

/// Load a summary previously written by [`write_outcomes_json`].
pub fn load_outcomes_json(path: &Path) -> Result<DojoRunSummary> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).context("failed to deserialize run summary from JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeStatus;

    fn sample_summary() -> DojoRunSummary {
        let mut completed = TrainingOutcome::started("Si.psp8");
        completed.levels_passed = vec![0, 1];
        completed.level_reached = Some(1);
        completed.report_digest = Some("abc123".into());

        let mut failed = TrainingOutcome::started("O.psp8");
        failed.start_level = Some(0);
        failed.level_reached = Some(0);
        failed.status = OutcomeStatus::Failed {
            level: Some(1),
            error: "engine crashed, exit code 2".into(),
        };

        DojoRunSummary {
            outcomes: vec![completed, failed],
            elapsed_secs: 1.5,
        }
    }

    #[test]
    fn json_preserves_outcomes() {
        let summary = sample_summary();
        let json = export_outcomes_json(&summary).unwrap();
        let restored: DojoRunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.outcomes, summary.outcomes);
    }

    #[test]
    fn csv_has_header_and_one_row_per_outcome() {
        let summary = sample_summary();
        let csv = export_outcomes_csv(&summary.outcomes).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("pseudo,status,start_level"));
        assert!(lines[1].starts_with("Si.psp8,completed,,1,0;1,,,abc123,"));
        // The comma in the error message forces quoting.
        assert!(lines[2].contains("\"engine crashed, exit code 2\""));
        assert!(lines[2].starts_with("O.psp8,failed,0,0,,1,"));
    }

    #[test]
    fn save_dispatches_on_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = sample_summary();

        let json_path = tmp.path().join("outcomes.json");
        save_outcomes(&summary, &json_path).unwrap();
        let restored = load_outcomes_json(&json_path).unwrap();
        assert_eq!(restored.outcomes.len(), 2);

        let csv_path = tmp.path().join("outcomes.CSV");
        save_outcomes(&summary, &csv_path).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("pseudo,"));
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let err = save_outcomes(&sample_summary(), &tmp.path().join("outcomes.txt")).unwrap_err();
        assert!(err.to_string().contains("unsupported output format"));
    }
}
