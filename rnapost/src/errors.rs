//! Error types for the rnapost pipeline.
//!
//! Errors are grouped by concern: dataset loading, stage analysis, report
//! rendering, and the controller-level taxonomy that wraps them. Nothing in
//! this module crosses the [`PipelineController::run`] boundary — the
//! controller converts every error into a recorded outcome and a log line.
//!
//! [`PipelineController::run`]: crate::pipeline::PipelineController::run

use std::path::PathBuf;
use thiserror::Error;

/// Error raised while loading or validating the primary counts dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The file could not be read.
    #[error("failed to read counts file {path}: {source}")]
    Io {
        /// Path that failed to open or read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The table contained no header row or no data rows.
    #[error("counts file {path} is empty")]
    Empty {
        /// Path of the empty table.
        path: PathBuf,
    },

    /// Schema detection failed: a counts table needs a feature-identifier
    /// column and at least one trailing value column.
    #[error("counts file {path} has no count column (found {columns} column(s), need at least 2)")]
    NoCountColumn {
        /// Path of the offending table.
        path: PathBuf,
        /// Number of columns actually found.
        columns: usize,
    },

    /// A row had a different number of fields than the header.
    #[error("counts file {path}: row {row} has {found} field(s), expected {expected}")]
    RaggedRow {
        /// Path of the offending table.
        path: PathBuf,
        /// 1-based data-row index.
        row: usize,
        /// Fields found on the row.
        found: usize,
        /// Fields declared by the header.
        expected: usize,
    },

    /// A value in the count column could not be parsed as a number.
    #[error("counts file {path}: row {row} has unparseable count {value:?}")]
    BadCount {
        /// Path of the offending table.
        path: PathBuf,
        /// 1-based data-row index.
        row: usize,
        /// The raw cell content.
        value: String,
    },
}

/// Error raised by a stage analyzer.
///
/// Analyzers never fail for "no significant results" — only for malformed
/// input or unreachable resources. These propagate to the controller, which
/// records them as stage failures.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The input data did not have the shape the analyzer requires.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A file the analyzer depends on was missing or unreadable.
    #[error("unreachable resource {path}: {reason}")]
    UnreachableResource {
        /// The missing or unreadable path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The controller handed the analyzer the wrong input variant.
    #[error("stage {stage} expected {expected} input")]
    InputMismatch {
        /// The stage that was invoked.
        stage: &'static str,
        /// Description of the expected input variant.
        expected: &'static str,
    },

    /// The dataset backing this stage could not be used.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Failed to write an artifact file.
    #[error("failed to write artifact {path}: {source}")]
    ArtifactWrite {
        /// Artifact path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Error raised by the report generator.
///
/// Rendering is best-effort; only failure to write the artifact is an error.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report file could not be written.
    #[error("failed to write report {path}: {source}")]
    Write {
        /// Report path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Controller-level error taxonomy.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fatal: the primary counts file was unresolvable through the primary
    /// path and every candidate alternate. No stage can meaningfully run.
    #[error("primary counts file unresolvable: tried {}{}", .primary.display(), format_candidates(.candidates))]
    InputUnresolvable {
        /// The configured primary path.
        primary: PathBuf,
        /// Alternate candidates that were also tried.
        candidates: Vec<PathBuf>,
    },

    /// Fatal: the output base directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        /// The configured output directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Recoverable (policy-dependent): the dataset failed to load.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// A stage analyzer failed.
    #[error("stage {stage} failed: {source}")]
    Stage {
        /// The failing stage name.
        stage: String,
        /// The analyzer error.
        #[source]
        source: AnalysisError,
    },

    /// The report generator failed.
    #[error(transparent)]
    Report(#[from] ReportError),
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    if candidates.is_empty() {
        return String::new();
    }
    let joined = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(" and candidate(s) [{joined}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_unresolvable_message_lists_candidates() {
        let err = PipelineError::InputUnresolvable {
            primary: PathBuf::from("/data/sample.bam_counts.tsv"),
            candidates: vec![PathBuf::from("/data/sample_counts.tsv")],
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/sample.bam_counts.tsv"));
        assert!(msg.contains("/data/sample_counts.tsv"));
    }

    #[test]
    fn test_input_unresolvable_message_without_candidates() {
        let err = PipelineError::InputUnresolvable {
            primary: PathBuf::from("/data/missing.tsv"),
            candidates: vec![],
        };
        assert!(!err.to_string().contains("candidate"));
    }

    #[test]
    fn test_dataset_error_messages() {
        let err = DatasetError::NoCountColumn {
            path: PathBuf::from("counts.tsv"),
            columns: 1,
        };
        assert!(err.to_string().contains("no count column"));

        let err = DatasetError::BadCount {
            path: PathBuf::from("counts.tsv"),
            row: 3,
            value: "n/a".to_string(),
        };
        assert!(err.to_string().contains("row 3"));
    }
}
