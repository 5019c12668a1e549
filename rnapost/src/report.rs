//! Markdown report generation.
//!
//! Best-effort by contract: the reporter renders whatever subset of
//! [`RunResults`] it receives, marking absent stages as "not run" and
//! failed stages with their error text instead of omitting them. Only a
//! failure to write the artifact itself is an error.

use crate::dataset::Dataset;
use crate::errors::ReportError;
use crate::results::{relative_display, RunResults, StageName, StageOutcome, StageResult};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

/// Name of the report artifact inside the output directory.
pub const REPORT_FILE: &str = "final_report.md";

/// How many top-expressed genes the report tables.
const TOP_GENES_IN_REPORT: usize = 15;

/// Renders the accumulated run results into a single markdown document.
#[derive(Debug)]
pub struct MarkdownReporter {
    output_dir: PathBuf,
}

impl MarkdownReporter {
    /// Creates a reporter writing into the given output directory.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Renders and writes the report, returning its path.
    pub fn generate_report(
        &self,
        results: &RunResults,
        dataset: &Dataset,
    ) -> Result<PathBuf, ReportError> {
        let report_path = self.output_dir.join(REPORT_FILE);
        let body = self.render(results, dataset);
        std::fs::write(&report_path, body).map_err(|source| ReportError::Write {
            path: report_path.clone(),
            source,
        })?;
        info!(path = %report_path.display(), "final report generated");
        Ok(report_path)
    }

    fn render(&self, results: &RunResults, dataset: &Dataset) -> String {
        let mut out = String::new();
        out.push_str("# RNA-Seq Postprocessing Report\n\n");
        let _ = writeln!(
            out,
            "*Generated on: {}*\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );

        out.push_str("## Input Data Summary\n");
        if let Some(input) = &results.input_file {
            let _ = writeln!(out, "- Input counts file: `{}`", input.display());
        }
        if let Some(load_error) = &results.load_error {
            let _ = writeln!(out, "- **Dataset load failed:** {load_error}");
        }
        if !dataset.is_empty() {
            let _ = writeln!(out, "- Total genes analyzed: {}", dataset.len());
        }
        out.push('\n');

        for stage in StageName::ANALYSIS_ORDER {
            let _ = writeln!(out, "## {}", stage.title());
            match results.outcome(stage) {
                Some(StageOutcome::Completed(result)) => self.render_completed(&mut out, result),
                Some(StageOutcome::Failed { error }) => {
                    let _ = writeln!(out, "**Stage failed:** {error}\n");
                }
                None => {
                    out.push_str("*Not run.*\n\n");
                }
            }
        }

        if !dataset.is_empty() {
            out.push_str("## Top Expressed Genes\n");
            out.push_str("| Gene ID | Raw Counts |\n|---------|------------|\n");
            for feature in dataset.top_features(TOP_GENES_IN_REPORT) {
                let _ = writeln!(out, "| {} | {} |", feature.id, feature.raw_counts);
            }
            out.push('\n');
        }

        out.push_str("## Generated Files Summary\n");
        let _ = writeln!(out, "- `{REPORT_FILE}`: this report");
        for stage in StageName::ANALYSIS_ORDER {
            if let Some(result) = results.completed(stage) {
                for (name, path) in &result.artifacts {
                    let _ = writeln!(
                        out,
                        "- `{}`: {} ({name})",
                        relative_display(path, &self.output_dir),
                        stage.title()
                    );
                }
            }
        }

        out
    }

    #[allow(clippy::unused_self)]
    fn render_completed(&self, out: &mut String, result: &StageResult) {
        if let Some(input) = &result.input_file {
            let _ = writeln!(out, "- Input: `{}`", input.display());
        }
        for (key, value) in &result.metrics {
            let _ = writeln!(out, "- {key}: {value}");
        }
        if !result.warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for warning in &result.warnings {
                let _ = writeln!(out, "- {warning}");
            }
        }
        // The quality stats text is inlined verbatim when present.
        if let Some(stats) = result.artifacts.get("stats") {
            if let Ok(content) = std::fs::read_to_string(stats) {
                let _ = writeln!(out, "\n```\n{}\n```", content.trim_end());
            }
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::StageResult;
    use std::path::Path;
    use tempfile::tempdir;

    fn sample_dataset() -> Dataset {
        let raw = "Geneid\tcounts\nG1\t50\nG2\t0\nG3\t900\n";
        Dataset::parse(raw, Path::new("counts.tsv")).unwrap()
    }

    #[test]
    fn test_report_marks_absent_stage_as_not_run() {
        let dir = tempdir().unwrap();
        let reporter = MarkdownReporter::new(dir.path());

        let mut results = RunResults::new();
        results.input_file = Some("counts.tsv".into());
        results.record_success(
            StageResult::new(StageName::Quality)
                .with_metric("total_genes", serde_json::json!(3)),
        );

        let path = reporter
            .generate_report(&results, &sample_dataset())
            .unwrap();
        let body = std::fs::read_to_string(path).unwrap();

        assert!(body.contains("## Quality Assessment\n- total_genes: 3"));
        assert!(body.contains("## Exploratory Data Analysis\n*Not run.*"));
        assert!(body.contains("## Transcript Quantification\n*Not run.*"));
        assert!(body.contains("| G3 | 900 |"));
    }

    #[test]
    fn test_report_renders_failed_stage_marker() {
        let dir = tempdir().unwrap();
        let reporter = MarkdownReporter::new(dir.path());

        let mut results = RunResults::new();
        results.record_failure(StageName::Enrichment, "counts dataset was empty");

        let path = reporter
            .generate_report(&results, &Dataset::placeholder())
            .unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("**Stage failed:** counts dataset was empty"));
        // Empty dataset: no top-genes table
        assert!(!body.contains("## Top Expressed Genes"));
    }

    #[test]
    fn test_report_inlines_quality_stats() {
        let dir = tempdir().unwrap();
        let stats_path = dir.path().join("quality_stats.txt");
        std::fs::write(&stats_path, "Total Genes: 3\n").unwrap();

        let mut results = RunResults::new();
        results.record_success(
            StageResult::new(StageName::Quality).with_artifact("stats", &stats_path),
        );

        let reporter = MarkdownReporter::new(dir.path());
        let path = reporter
            .generate_report(&results, &sample_dataset())
            .unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("```\nTotal Genes: 3\n```"));
        assert!(body.contains("- `quality_stats.txt`: Quality Assessment (stats)"));
    }

    #[test]
    fn test_unwritable_directory_is_error() {
        let reporter = MarkdownReporter::new("/definitely/not/a/dir");
        let err = reporter
            .generate_report(&RunResults::new(), &Dataset::placeholder())
            .unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }

    #[test]
    fn test_load_error_surfaces_in_report() {
        let dir = tempdir().unwrap();
        let reporter = MarkdownReporter::new(dir.path());
        let mut results = RunResults::new();
        results.load_error = Some("row 2 has unparseable count".to_string());

        let path = reporter
            .generate_report(&results, &Dataset::placeholder())
            .unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("**Dataset load failed:**"));
    }
}
