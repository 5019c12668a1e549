//! Exploratory data analysis over the raw counts file.

use super::{require_nonempty, write_artifact, StageAnalyzer, StageInput};
use crate::config::ExploratoryParams;
use crate::dataset::Dataset;
use crate::errors::AnalysisError;
use crate::results::{StageName, StageResult};
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Summarizes the counts table: headline statistics, top-expressed genes,
/// and (optionally) a binned expression-distribution table.
///
/// Unlike the other dataset-oriented stages this analyzer loads the counts
/// file itself, so a resume can re-validate the file even when the shared
/// dataset failed to load.
#[derive(Debug)]
pub struct ExploratoryAnalyzer {
    output_dir: PathBuf,
    params: ExploratoryParams,
}

impl ExploratoryAnalyzer {
    /// Creates the analyzer with its output directory and parameter sub-map.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, params: ExploratoryParams) -> Self {
        Self {
            output_dir: output_dir.into(),
            params,
        }
    }

    fn summary_text(&self, dataset: &Dataset, input: &Path) -> String {
        let total = dataset.len();
        let expressed = dataset.expressed_features();
        let above = dataset.features_at_least(self.params.min_counts);
        let total_reads = dataset.total_counts();

        let mut out = String::new();
        out.push_str("===== Exploratory Data Analysis Results =====\n\n");
        let _ = writeln!(out, "Analysis Date: {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(
            out,
            "Input File: {}\n",
            input.file_name().map_or_else(
                || input.display().to_string(),
                |n| n.to_string_lossy().into_owned()
            )
        );

        out.push_str("--- Summary Statistics ---\n");
        let _ = writeln!(out, "Total Genes Analyzed: {total}");
        let _ = writeln!(
            out,
            "Expressed Genes (counts > 0): {expressed} ({:.2}%)",
            percent(expressed, total)
        );
        let _ = writeln!(
            out,
            "Genes Above Threshold ({}): {above} ({:.2}%)",
            self.params.min_counts,
            percent(above, total)
        );
        let _ = writeln!(out, "Total Mapped Reads: {total_reads}");
        if let Some(max) = dataset.max_feature() {
            let _ = writeln!(
                out,
                "Highest Expressed Gene: {} ({} counts)",
                max.id, max.raw_counts
            );
        }
        if self.params.expected_library_size > 0 {
            let _ = writeln!(
                out,
                "Percent of Expected Library Size: {:.2}%",
                total_reads as f64 / self.params.expected_library_size as f64 * 100.0
            );
        }

        out.push_str("\n--- Top Expressed Genes ---\n");
        for (i, feature) in dataset.top_features(self.params.top_genes).iter().enumerate() {
            let _ = writeln!(out, "{}. {}: {} counts", i + 1, feature.id, feature.raw_counts);
        }

        out.push_str("\n--- Analysis Parameters ---\n");
        let _ = writeln!(out, "distribution: {}", self.params.distribution);
        let _ = writeln!(out, "top_genes: {}", self.params.top_genes);
        let _ = writeln!(out, "min_counts: {}", self.params.min_counts);
        let _ = writeln!(
            out,
            "expected_library_size: {}",
            self.params.expected_library_size
        );
        out
    }

    fn top_genes_table(&self, dataset: &Dataset) -> String {
        let mut out = String::from("Geneid\traw_counts\n");
        for feature in dataset.top_features(self.params.top_genes) {
            let _ = writeln!(out, "{}\t{}", feature.id, feature.raw_counts);
        }
        out
    }

    /// Log10-binned histogram of nonzero counts, the tabular stand-in for
    /// the distribution plot rendered by external tooling.
    fn distribution_table(dataset: &Dataset) -> String {
        let mut bins: Vec<usize> = Vec::new();
        for feature in dataset.features() {
            if feature.raw_counts == 0 {
                continue;
            }
            let bin = ((feature.raw_counts + 1) as f64).log10().floor() as usize;
            if bins.len() <= bin {
                bins.resize(bin + 1, 0);
            }
            bins[bin] += 1;
        }
        let mut out = String::from("log10_bin\tfeature_count\n");
        for (bin, count) in bins.iter().enumerate() {
            let _ = writeln!(out, "{bin}\t{count}");
        }
        out
    }
}

#[async_trait]
impl StageAnalyzer for ExploratoryAnalyzer {
    fn stage(&self) -> StageName {
        StageName::Exploratory
    }

    async fn run_analysis(&self, input: StageInput<'_>) -> Result<StageResult, AnalysisError> {
        let StageInput::CountsFile(counts_file) = input else {
            return Err(AnalysisError::InputMismatch {
                stage: StageName::Exploratory.as_str(),
                expected: "counts file path",
            });
        };
        if !counts_file.exists() {
            return Err(AnalysisError::UnreachableResource {
                path: counts_file.to_path_buf(),
                reason: "counts file does not exist".to_string(),
            });
        }

        info!(file = %counts_file.display(), "running exploratory data analysis");
        let dataset = Dataset::load(counts_file)?;
        require_nonempty(&dataset, StageName::Exploratory)?;

        let summary_file = self.output_dir.join("eda_summary.txt");
        write_artifact(&summary_file, &self.summary_text(&dataset, counts_file))?;

        let top_genes_file = self.output_dir.join("top_genes.tsv");
        write_artifact(&top_genes_file, &self.top_genes_table(&dataset))?;

        let top_ids: Vec<String> = dataset
            .top_features(self.params.top_genes)
            .iter()
            .map(|f| f.id.clone())
            .collect();

        let mut result = StageResult::new(StageName::Exploratory)
            .with_input_file(counts_file)
            .with_metric("gene_count", serde_json::json!(dataset.len()))
            .with_metric(
                "expressed_genes",
                serde_json::json!(dataset.expressed_features()),
            )
            .with_metric(
                "genes_above_threshold",
                serde_json::json!(dataset.features_at_least(self.params.min_counts)),
            )
            .with_metric("total_reads", serde_json::json!(dataset.total_counts()))
            .with_metric("top_genes", serde_json::json!(top_ids))
            .with_artifact("summary", summary_file)
            .with_artifact("top_genes", top_genes_file);

        if self.params.distribution {
            let dist_file = self.output_dir.join("expression_distribution.tsv");
            write_artifact(&dist_file, &Self::distribution_table(&dataset))?;
            result = result.with_artifact("distribution", dist_file);
        }

        for warning in dataset.warnings() {
            result = result.with_warning(warning.clone());
        }

        Ok(result)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
# featureCounts\n\
Geneid\tChr\tLength\t/align/s.bam\n\
G1\tchr1\t100\t50\n\
G2\tchr1\t200\t0\n\
G3\tchr2\t300\t900\n\
G4\tchr2\t400\t12\n";

    fn write_sample(dir: &Path) -> PathBuf {
        let path = dir.join("counts.tsv");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[tokio::test]
    async fn test_produces_summary_and_top_genes() {
        let dir = tempdir().unwrap();
        let counts = write_sample(dir.path());
        let analyzer = ExploratoryAnalyzer::new(dir.path(), ExploratoryParams::default());

        let result = analyzer
            .run_analysis(StageInput::CountsFile(&counts))
            .await
            .unwrap();

        assert_eq!(result.metrics["gene_count"], serde_json::json!(4));
        assert_eq!(result.metrics["expressed_genes"], serde_json::json!(3));
        assert_eq!(result.metrics["total_reads"], serde_json::json!(962));
        assert_eq!(result.input_file.as_deref(), Some(counts.as_path()));

        let summary = std::fs::read_to_string(&result.artifacts["summary"]).unwrap();
        assert!(summary.contains("Total Genes Analyzed: 4"));
        assert!(summary.contains("Highest Expressed Gene: G3 (900 counts)"));

        let top = std::fs::read_to_string(&result.artifacts["top_genes"]).unwrap();
        assert!(top.starts_with("Geneid\traw_counts\n"));
        assert!(top.contains("G3\t900"));
    }

    #[tokio::test]
    async fn test_distribution_artifact_is_optional() {
        let dir = tempdir().unwrap();
        let counts = write_sample(dir.path());

        let params = ExploratoryParams {
            distribution: false,
            ..ExploratoryParams::default()
        };
        let analyzer = ExploratoryAnalyzer::new(dir.path(), params);
        let result = analyzer
            .run_analysis(StageInput::CountsFile(&counts))
            .await
            .unwrap();
        assert!(!result.artifacts.contains_key("distribution"));

        let analyzer = ExploratoryAnalyzer::new(dir.path(), ExploratoryParams::default());
        let result = analyzer
            .run_analysis(StageInput::CountsFile(&counts))
            .await
            .unwrap();
        let dist = std::fs::read_to_string(&result.artifacts["distribution"]).unwrap();
        assert!(dist.starts_with("log10_bin\tfeature_count\n"));
    }

    #[tokio::test]
    async fn test_missing_file_is_unreachable_resource() {
        let dir = tempdir().unwrap();
        let analyzer = ExploratoryAnalyzer::new(dir.path(), ExploratoryParams::default());
        let missing = dir.path().join("nope.tsv");
        let err = analyzer
            .run_analysis(StageInput::CountsFile(&missing))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnreachableResource { .. }));
    }

    #[tokio::test]
    async fn test_wrong_input_variant_is_contract_violation() {
        let dir = tempdir().unwrap();
        let analyzer = ExploratoryAnalyzer::new(dir.path(), ExploratoryParams::default());
        let dataset = Dataset::placeholder();
        let err = analyzer
            .run_analysis(StageInput::Dataset(&dataset))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InputMismatch { .. }));
    }

    #[tokio::test]
    async fn test_path_like_count_header_carries_warning() {
        let dir = tempdir().unwrap();
        let counts = write_sample(dir.path());
        let analyzer = ExploratoryAnalyzer::new(dir.path(), ExploratoryParams::default());
        let result = analyzer
            .run_analysis(StageInput::CountsFile(&counts))
            .await
            .unwrap();
        assert_eq!(result.warnings.len(), 1);
    }
}
