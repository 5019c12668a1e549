//! Functional enrichment candidate selection.
//!
//! Selects the top-expressed fraction of the dataset and emits cleaned
//! gene lists for the enabled sub-analyses. The ontology/pathway lookups
//! themselves are external capability providers; this stage produces their
//! inputs and the run-local summary.

use super::{require_nonempty, write_artifact, StageAnalyzer, StageInput};
use crate::config::EnrichmentParams;
use crate::dataset::Dataset;
use crate::errors::AnalysisError;
use crate::results::{StageName, StageResult};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::info;

/// Minimum number of candidate genes regardless of `top_percent`.
const MIN_CANDIDATES: usize = 10;

/// Selects and cleans top-expressed gene candidates for enrichment.
#[derive(Debug)]
pub struct EnrichmentAnalyzer {
    output_dir: PathBuf,
    params: EnrichmentParams,
}

impl EnrichmentAnalyzer {
    /// Creates the analyzer with its output directory and parameter sub-map.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, params: EnrichmentParams) -> Self {
        Self {
            output_dir: output_dir.into(),
            params,
        }
    }

    /// `max(10, len * top_percent / 100)`, capped at the dataset size.
    fn candidate_count(&self, dataset_len: usize) -> usize {
        let by_percent = (dataset_len as f64 * self.params.top_percent / 100.0) as usize;
        by_percent.max(MIN_CANDIDATES).min(dataset_len)
    }

    fn candidate_genes(&self, dataset: &Dataset) -> Vec<String> {
        dataset
            .top_features(self.candidate_count(dataset.len()))
            .iter()
            .map(|f| strip_version_suffix(&f.id).to_string())
            .collect()
    }
}

/// Drops the Ensembl version suffix (`ENSG00000115414.21` ->
/// `ENSG00000115414`); ids without one pass through unchanged.
fn strip_version_suffix(id: &str) -> &str {
    id.split('.').next().unwrap_or(id)
}

#[async_trait]
impl StageAnalyzer for EnrichmentAnalyzer {
    fn stage(&self) -> StageName {
        StageName::Enrichment
    }

    async fn run_analysis(&self, input: StageInput<'_>) -> Result<StageResult, AnalysisError> {
        let StageInput::Dataset(dataset) = input else {
            return Err(AnalysisError::InputMismatch {
                stage: StageName::Enrichment.as_str(),
                expected: "shared counts dataset",
            });
        };
        require_nonempty(dataset, StageName::Enrichment)?;

        let candidates = self.candidate_genes(dataset);
        info!(
            candidates = candidates.len(),
            go = self.params.go_analysis,
            kegg = self.params.kegg_analysis,
            "selecting enrichment candidates"
        );

        let enrichment_dir = self.output_dir.join("enrichment");
        let gene_list = candidates.join("\n") + "\n";

        let candidates_file = enrichment_dir.join("candidate_genes.txt");
        write_artifact(&candidates_file, &gene_list)?;

        let mut summary = String::new();
        summary.push_str("Functional Enrichment Candidate Selection\n");
        summary.push_str("-----------------------------------------\n");
        let _ = writeln!(summary, "Number of genes selected: {}", candidates.len());
        let _ = writeln!(summary, "Top percent: {:.1}", self.params.top_percent);

        let mut sub_analyses = Vec::new();
        let mut result = StageResult::new(StageName::Enrichment)
            .with_metric("candidate_count", serde_json::json!(candidates.len()))
            .with_metric("candidate_genes", serde_json::json!(candidates))
            .with_artifact("candidates", candidates_file);

        if self.params.go_analysis {
            let go_file = enrichment_dir.join("go_gene_list.txt");
            write_artifact(&go_file, &gene_list)?;
            result = result.with_artifact("go_gene_list", go_file);
            sub_analyses.push("go");
            let _ = writeln!(summary, "GO analysis input: go_gene_list.txt");
        }
        if self.params.kegg_analysis {
            let kegg_file = enrichment_dir.join("kegg_gene_list.txt");
            write_artifact(&kegg_file, &gene_list)?;
            result = result.with_artifact("kegg_gene_list", kegg_file);
            sub_analyses.push("kegg");
            let _ = writeln!(summary, "KEGG analysis input: kegg_gene_list.txt");
        }

        let summary_file = enrichment_dir.join("enrichment_summary.txt");
        write_artifact(&summary_file, &summary)?;
        result = result
            .with_metric("sub_analyses", serde_json::json!(sub_analyses))
            .with_artifact("summary", summary_file);

        if let Some(source) = dataset.source() {
            result = result.with_input_file(source);
        }

        Ok(result)
    }
}
