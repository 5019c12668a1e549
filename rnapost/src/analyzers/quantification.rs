//! Transcript-quantification analysis over the abundance table.

use super::{write_artifact, StageAnalyzer, StageInput};
use crate::config::QuantificationParams;
use crate::errors::AnalysisError;
use crate::results::{StageName, StageResult};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Parsed abundance table: transcripts in rows, samples in columns.
///
/// The first two columns are metadata (transcript id and length); every
/// remaining column is a sample, mirroring the upstream quantifier's layout.
#[derive(Debug)]
struct AbundanceTable {
    samples: Vec<String>,
    /// Column-major abundance values, one vector per sample.
    values: Vec<Vec<f64>>,
    transcripts: usize,
}

impl AbundanceTable {
    fn parse(raw: &str, path: &Path) -> Result<Self, AnalysisError> {
        let mut lines = raw.lines().filter(|l| !l.is_empty());
        let header = lines.next().ok_or_else(|| {
            AnalysisError::MalformedInput(format!("abundance file {} is empty", path.display()))
        })?;
        let columns: Vec<&str> = header.split('\t').collect();
        if columns.len() < 3 {
            return Err(AnalysisError::MalformedInput(format!(
                "abundance file {} has no sample columns",
                path.display()
            )));
        }
        let samples: Vec<String> = columns[2..].iter().map(|s| (*s).to_string()).collect();
        let mut values: Vec<Vec<f64>> = vec![Vec::new(); samples.len()];
        let mut transcripts = 0;

        for (idx, line) in lines.enumerate() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != columns.len() {
                return Err(AnalysisError::MalformedInput(format!(
                    "abundance file {}: row {} has {} field(s), expected {}",
                    path.display(),
                    idx + 1,
                    fields.len(),
                    columns.len()
                )));
            }
            for (sample_idx, cell) in fields[2..].iter().enumerate() {
                let value = cell.parse::<f64>().map_err(|_| {
                    AnalysisError::MalformedInput(format!(
                        "abundance file {}: row {} has unparseable value {cell:?}",
                        path.display(),
                        idx + 1
                    ))
                })?;
                values[sample_idx].push(value);
            }
            transcripts += 1;
        }

        Ok(Self {
            samples,
            values,
            transcripts,
        })
    }
}

/// Summarizes per-sample transcript abundances and their pairwise
/// correlations, the tabular stand-ins for the PCA and clustering-heatmap
/// views rendered by external tooling.
#[derive(Debug)]
pub struct QuantificationAnalyzer {
    output_dir: PathBuf,
    params: QuantificationParams,
}

impl QuantificationAnalyzer {
    /// Creates the analyzer with its output directory and parameter sub-map.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, params: QuantificationParams) -> Self {
        Self {
            output_dir: output_dir.into(),
            params,
        }
    }

    fn summary_table(&self, table: &AbundanceTable) -> String {
        let mut out = String::from("sample\ttotal_abundance\tdetected_transcripts\tmean_abundance\n");
        for (sample, values) in table.samples.iter().zip(&table.values) {
            let total: f64 = values.iter().sum();
            let detected = values
                .iter()
                .filter(|v| **v > self.params.min_abundance)
                .count();
            let mean = if values.is_empty() {
                0.0
            } else {
                total / values.len() as f64
            };
            let _ = writeln!(out, "{sample}\t{total:.3}\t{detected}\t{mean:.3}");
        }
        out
    }

    fn correlation_table(table: &AbundanceTable) -> String {
        let logged: Vec<Vec<f64>> = table
            .values
            .iter()
            .map(|vs| vs.iter().map(|v| (v + 1.0).log10()).collect())
            .collect();

        let mut out = String::from("sample");
        for sample in &table.samples {
            let _ = write!(out, "\t{sample}");
        }
        out.push('\n');
        for (i, sample) in table.samples.iter().enumerate() {
            let _ = write!(out, "{sample}");
            for j in 0..table.samples.len() {
                let r = if i == j {
                    1.0
                } else {
                    pearson(&logged[i], &logged[j])
                };
                let _ = write!(out, "\t{r:.4}");
            }
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl StageAnalyzer for QuantificationAnalyzer {
    fn stage(&self) -> StageName {
        StageName::Quantification
    }

    async fn run_analysis(&self, input: StageInput<'_>) -> Result<StageResult, AnalysisError> {
        let StageInput::AbundanceFile(abundance_file) = input else {
            return Err(AnalysisError::InputMismatch {
                stage: StageName::Quantification.as_str(),
                expected: "abundance file path",
            });
        };
        let raw = std::fs::read_to_string(abundance_file).map_err(|err| {
            AnalysisError::UnreachableResource {
                path: abundance_file.to_path_buf(),
                reason: err.to_string(),
            }
        })?;
        let table = AbundanceTable::parse(&raw, abundance_file)?;

        info!(
            file = %abundance_file.display(),
            samples = table.samples.len(),
            transcripts = table.transcripts,
            "running quantification analysis"
        );

        let quant_dir = self.output_dir.join("quantification");
        let summary_file = quant_dir.join("abundance_summary.tsv");
        write_artifact(&summary_file, &self.summary_table(&table))?;

        let correlations_file = quant_dir.join("sample_correlations.tsv");
        write_artifact(&correlations_file, &Self::correlation_table(&table))?;

        let totals: serde_json::Map<String, serde_json::Value> = table
            .samples
            .iter()
            .zip(&table.values)
            .map(|(sample, values)| {
                (
                    sample.clone(),
                    serde_json::json!(values.iter().sum::<f64>()),
                )
            })
            .collect();

        Ok(StageResult::new(StageName::Quantification)
            .with_input_file(abundance_file)
            .with_metric("sample_count", serde_json::json!(table.samples.len()))
            .with_metric("transcript_count", serde_json::json!(table.transcripts))
            .with_metric("sample_totals", serde_json::Value::Object(totals))
            .with_artifact("abundance_summary", summary_file)
            .with_artifact("sample_correlations", correlations_file))
    }
}

/// Pearson correlation; 0.0 when either side has zero variance.
fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    let nf = n as f64;
    let mean_x = xs.iter().take(n).sum::<f64>() / nf;
    let mean_y = ys.iter().take(n).sum::<f64>() / nf;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const ABUNDANCE: &str = "\
target_id\tlength\tsampleA\tsampleB\n\
T1\t1000\t10.0\t20.0\n\
T2\t800\t0.0\t0.0\n\
T3\t500\t5.5\t11.0\n";

    fn write_abundance(dir: &Path, raw: &str) -> PathBuf {
        let path = dir.join("abundance.tsv");
        std::fs::write(&path, raw).unwrap();
        path
    }

    #[tokio::test]
    async fn test_summary_and_correlations() {
        let dir = tempdir().unwrap();
        let path = write_abundance(dir.path(), ABUNDANCE);
        let analyzer = QuantificationAnalyzer::new(dir.path(), QuantificationParams::default());

        let result = analyzer
            .run_analysis(StageInput::AbundanceFile(&path))
            .await
            .unwrap();

        assert_eq!(result.metrics["sample_count"], serde_json::json!(2));
        assert_eq!(result.metrics["transcript_count"], serde_json::json!(3));
        let totals = result.metrics["sample_totals"].as_object().unwrap();
        assert!((totals["sampleA"].as_f64().unwrap() - 15.5).abs() < 1e-9);

        let summary = std::fs::read_to_string(&result.artifacts["abundance_summary"]).unwrap();
        assert!(summary.contains("sampleA\t15.500\t2\t5.167"));

        let corr = std::fs::read_to_string(&result.artifacts["sample_correlations"]).unwrap();
        let mut lines = corr.lines();
        assert_eq!(lines.next().unwrap(), "sample\tsampleA\tsampleB");
        // Perfectly proportional samples correlate strongly in log space.
        let row_a = lines.next().unwrap();
        assert!(row_a.starts_with("sampleA\t1.0000\t0.9"));
    }

    #[tokio::test]
    async fn test_no_sample_columns_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write_abundance(dir.path(), "target_id\tlength\nT1\t1000\n");
        let analyzer = QuantificationAnalyzer::new(dir.path(), QuantificationParams::default());
        let err = analyzer
            .run_analysis(StageInput::AbundanceFile(&path))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_unreachable() {
        let dir = tempdir().unwrap();
        let analyzer = QuantificationAnalyzer::new(dir.path(), QuantificationParams::default());
        let missing = dir.path().join("nope.tsv");
        let err = analyzer
            .run_analysis(StageInput::AbundanceFile(&missing))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnreachableResource { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_value_is_malformed() {
        let dir = tempdir().unwrap();
        let path = write_abundance(dir.path(), "target_id\tlength\ts1\nT1\t1000\tlots\n");
        let analyzer = QuantificationAnalyzer::new(dir.path(), QuantificationParams::default());
        let err = analyzer
            .run_analysis(StageInput::AbundanceFile(&path))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedInput(_)));
    }

    #[test]
    fn test_pearson_zero_variance() {
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((r - 1.0).abs() < 1e-12);
    }
}
