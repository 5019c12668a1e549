//! Stage result and run result aggregation types.
//!
//! [`RunResults`] is the append-only sink the controller fills as stages
//! complete; it is handed whole to the report generator and discarded when
//! the run returns. Persistence beyond the run lives in the checkpoint
//! store and the report artifact, not here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Names of the fixed postprocessing stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Exploratory data analysis over the raw counts file.
    Exploratory,
    /// Quality assessment over the loaded dataset.
    Quality,
    /// Transcript-quantification analysis over the abundance file.
    Quantification,
    /// Functional enrichment candidate selection over the dataset.
    Enrichment,
    /// Final report generation.
    Report,
}

impl StageName {
    /// The four analysis stages, in execution order (report excluded).
    pub const ANALYSIS_ORDER: [Self; 4] = [
        Self::Exploratory,
        Self::Quality,
        Self::Quantification,
        Self::Enrichment,
    ];

    /// Returns the stage name as used in logs and checkpoint keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exploratory => "exploratory",
            Self::Quality => "quality",
            Self::Quantification => "quantification",
            Self::Enrichment => "enrichment",
            Self::Report => "report",
        }
    }

    /// Human-readable section title for the report.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Exploratory => "Exploratory Data Analysis",
            Self::Quality => "Quality Assessment",
            Self::Quantification => "Transcript Quantification",
            Self::Enrichment => "Functional Enrichment",
            Self::Report => "Report",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output of one analyzer invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// The stage that produced this result.
    pub stage: StageName,
    /// Which input file the stage actually consumed, when file-backed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<PathBuf>,
    /// Named summary metrics.
    #[serde(default)]
    pub metrics: BTreeMap<String, serde_json::Value>,
    /// Named artifact files written by the stage.
    #[serde(default)]
    pub artifacts: BTreeMap<String, PathBuf>,
    /// Non-fatal warnings raised during the analysis.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl StageResult {
    /// Creates an empty result for the given stage.
    #[must_use]
    pub fn new(stage: StageName) -> Self {
        Self {
            stage,
            input_file: None,
            metrics: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Records the input file the stage consumed.
    #[must_use]
    pub fn with_input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_file = Some(path.into());
        self
    }

    /// Adds a named metric.
    #[must_use]
    pub fn with_metric(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    /// Adds a named artifact path.
    #[must_use]
    pub fn with_artifact(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.artifacts.insert(key.into(), path.into());
        self
    }

    /// Adds a warning.
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Outcome of one stage as recorded by the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage completed and produced a result.
    Completed(StageResult),
    /// The stage failed; the error is kept as text for the report and logs.
    Failed {
        /// The rendered analyzer error.
        error: String,
    },
}

impl StageOutcome {
    /// Returns true for a completed outcome.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Accumulated results of one pipeline invocation.
///
/// Created empty at run start, mutated append-only as stages finish.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResults {
    /// The counts file the run actually used (primary or alternate).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<PathBuf>,
    /// Per-stage outcomes, keyed by stage.
    #[serde(default)]
    pub stages: BTreeMap<StageName, StageOutcome>,
    /// Non-fatal dataset-load failure, when the run continued degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
    /// Path of the rendered report, once the report stage has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_report: Option<PathBuf>,
}

impl RunResults {
    /// Creates an empty result set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed stage result.
    pub fn record_success(&mut self, result: StageResult) {
        self.stages
            .insert(result.stage, StageOutcome::Completed(result));
    }

    /// Records a failed stage.
    pub fn record_failure(&mut self, stage: StageName, error: impl Into<String>) {
        self.stages
            .insert(stage, StageOutcome::Failed { error: error.into() });
    }

    /// Returns the recorded outcome for a stage, if any.
    #[must_use]
    pub fn outcome(&self, stage: StageName) -> Option<&StageOutcome> {
        self.stages.get(&stage)
    }

    /// Returns the completed result for a stage, if it completed.
    #[must_use]
    pub fn completed(&self, stage: StageName) -> Option<&StageResult> {
        match self.stages.get(&stage) {
            Some(StageOutcome::Completed(result)) => Some(result),
            _ => None,
        }
    }

    /// True iff no stage failed and the dataset loaded cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.load_error.is_none() && self.stages.values().all(StageOutcome::is_completed)
    }

    /// Number of failed stages.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.stages.values().filter(|o| !o.is_completed()).count()
    }
}

/// Convenience for artifact paths rendered relative to the output dir.
pub(crate) fn relative_display(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}
