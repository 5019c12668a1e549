//! Quality assessment over the shared counts dataset.

use super::{require_nonempty, write_artifact, StageAnalyzer, StageInput};
use crate::config::QualityParams;
use crate::dataset::Dataset;
use crate::errors::AnalysisError;
use crate::results::{StageName, StageResult};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

/// Computes gene-detection and library-size metrics and writes the
/// `quality_stats.txt` report consumed verbatim by the final report.
#[derive(Debug)]
pub struct QualityAnalyzer {
    output_dir: PathBuf,
    params: QualityParams,
}

impl QualityAnalyzer {
    /// Creates the analyzer with its output directory and parameter sub-map.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, params: QualityParams) -> Self {
        Self {
            output_dir: output_dir.into(),
            params,
        }
    }

    fn stats_text(&self, dataset: &Dataset) -> String {
        let total = dataset.len();
        let detected = dataset.expressed_features();
        let above = dataset.features_at_least(self.params.min_counts);
        let library_size = dataset.total_counts();

        let mut out = String::new();
        out.push_str("===== RNA-Seq Quality Assessment =====\n\n");

        out.push_str("--- Gene Detection ---\n");
        let _ = writeln!(out, "Total Genes: {total}");
        let _ = writeln!(
            out,
            "Detected Genes: {detected} ({:.2}%)",
            ratio_percent(detected, total)
        );
        let _ = writeln!(
            out,
            "Genes Above Threshold: {above} ({:.2}%)\n",
            ratio_percent(above, total)
        );

        out.push_str("--- Library Metrics ---\n");
        let _ = writeln!(out, "Total Reads: {library_size}");
        if self.params.expected_library_size > 0 {
            let _ = writeln!(
                out,
                "Percent of Expected Library Size: {:.2}%",
                library_size as f64 / self.params.expected_library_size as f64 * 100.0
            );
        }
        out.push('\n');

        out.push_str("--- Expression Statistics ---\n");
        let _ = writeln!(out, "Mean Expression: {:.2}", dataset.mean_count());
        let _ = writeln!(out, "Median Expression: {:.0}", dataset.median_count());
        if let Some(max) = dataset.max_feature() {
            let _ = writeln!(out, "Maximum Expression: {}", max.raw_counts);
        }
        out
    }
}

#[async_trait]
impl StageAnalyzer for QualityAnalyzer {
    fn stage(&self) -> StageName {
        StageName::Quality
    }

    async fn run_analysis(&self, input: StageInput<'_>) -> Result<StageResult, AnalysisError> {
        let StageInput::Dataset(dataset) = input else {
            return Err(AnalysisError::InputMismatch {
                stage: StageName::Quality.as_str(),
                expected: "shared counts dataset",
            });
        };
        require_nonempty(dataset, StageName::Quality)?;

        info!(features = dataset.len(), "generating quality metrics");

        let stats_file = self.output_dir.join("quality_stats.txt");
        write_artifact(&stats_file, &self.stats_text(dataset))?;

        let detected = dataset.expressed_features();
        let total = dataset.len();
        let mut result = StageResult::new(StageName::Quality)
            .with_metric("total_genes", serde_json::json!(total))
            .with_metric("detected_genes", serde_json::json!(detected))
            .with_metric(
                "detected_percent",
                serde_json::json!(ratio_percent(detected, total)),
            )
            .with_metric(
                "genes_above_threshold",
                serde_json::json!(dataset.features_at_least(self.params.min_counts)),
            )
            .with_metric("library_size", serde_json::json!(dataset.total_counts()))
            .with_metric("mean_expression", serde_json::json!(dataset.mean_count()))
            .with_metric(
                "median_expression",
                serde_json::json!(dataset.median_count()),
            )
            .with_artifact("stats", stats_file);

        if let Some(source) = dataset.source() {
            result = result.with_input_file(source);
        }
        if self.params.expected_library_size > 0 {
            result = result.with_metric(
                "library_size_percent",
                serde_json::json!(
                    dataset.total_counts() as f64 / self.params.expected_library_size as f64
                        * 100.0
                ),
            );
        }

        Ok(result)
    }
}

fn ratio_percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}
