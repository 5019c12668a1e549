//! Stage analyzers.
//!
//! Four variants share one contract: consume a designated input and emit a
//! [`StageResult`] of named metrics and artifact files. Parameter sub-maps
//! are bound at construction from the immutable run configuration, so one
//! analyzer instance serves exactly one run. Analyzers only fail for
//! malformed input or unreachable resources; "no significant results" is a
//! valid, successful outcome.

mod enrichment;
mod exploratory;
mod quality;
mod quantification;

pub use enrichment::EnrichmentAnalyzer;
pub use exploratory::ExploratoryAnalyzer;
pub use quality::QualityAnalyzer;
pub use quantification::QuantificationAnalyzer;

use crate::dataset::Dataset;
use crate::errors::AnalysisError;
use crate::results::{StageName, StageResult};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// The input a stage analyzer consumes.
///
/// Exploratory reads the raw counts file itself; quality and enrichment
/// share the dataset the controller loaded; quantification reads the
/// transcript-abundance file.
#[derive(Debug, Clone, Copy)]
pub enum StageInput<'a> {
    /// Path to the raw counts table.
    CountsFile(&'a Path),
    /// The shared, already-loaded dataset.
    Dataset(&'a Dataset),
    /// Path to the transcript-abundance table.
    AbundanceFile(&'a Path),
}

/// One analysis stage.
#[async_trait]
pub trait StageAnalyzer: Send + Sync + Debug {
    /// The stage this analyzer implements.
    fn stage(&self) -> StageName;

    /// Runs the analysis and returns its structured result.
    async fn run_analysis(&self, input: StageInput<'_>) -> Result<StageResult, AnalysisError>;
}

/// Rejects an empty (placeholder) dataset up front.
fn require_nonempty(dataset: &Dataset, stage: StageName) -> Result<(), AnalysisError> {
    if dataset.is_empty() {
        return Err(AnalysisError::MalformedInput(format!(
            "{stage} requires a non-empty counts dataset"
        )));
    }
    Ok(())
}

/// Writes an artifact file, mapping I/O failures to the analyzer taxonomy.
fn write_artifact(path: &Path, content: &str) -> Result<(), AnalysisError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| AnalysisError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| AnalysisError::ArtifactWrite {
        path: path.to_path_buf(),
        source,
    })
}
