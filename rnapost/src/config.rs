//! Pipeline configuration.
//!
//! A [`PipelineConfiguration`] is deserialized once (typically from YAML)
//! and is immutable for the duration of a run. Every stage reads its own
//! parameter sub-struct; unknown upstream naming quirks are confined to the
//! input-resolution candidates computed here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Known suffix variants produced by upstream counting tools.
///
/// Order matters: the longer variant must be stripped first.
const COUNT_SUFFIX_VARIANTS: [&str; 2] = [".bam_counts.tsv", "_counts.tsv"];

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    /// Input file locations.
    pub input: InputConfig,
    /// Output locations.
    pub output: OutputConfig,
    /// Per-stage enable flags.
    #[serde(default)]
    pub stages: StageToggles,
    /// Per-stage parameters.
    #[serde(default)]
    pub parameters: StageParameters,
    /// Abort the run on the first stage failure instead of continuing
    /// degraded.
    #[serde(default)]
    pub fail_fast: bool,
}

impl PipelineConfiguration {
    /// Parses a configuration from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Loads a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Error loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The YAML did not match the configuration schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}

/// Input file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Primary gene-level counts table (TSV, featureCounts-style).
    pub counts_file: PathBuf,
    /// Declared alternate candidates tried, in order, when the primary path
    /// is missing. When empty, a single candidate is derived from the known
    /// upstream suffix variants.
    #[serde(default)]
    pub fallback_paths: Vec<PathBuf>,
    /// Optional transcript-abundance table consumed by the quantification
    /// stage.
    #[serde(default)]
    pub abundance_file: Option<PathBuf>,
}

impl InputConfig {
    /// Returns the alternate candidates to try when the primary is missing.
    ///
    /// Declared `fallback_paths` win. Without them, one candidate is derived
    /// by stripping the known counting-tool suffix variants from the primary
    /// file name and re-appending `_counts.tsv`; a candidate identical to
    /// the primary is dropped.
    #[must_use]
    pub fn alternate_candidates(&self) -> Vec<PathBuf> {
        if !self.fallback_paths.is_empty() {
            return self.fallback_paths.clone();
        }
        derive_suffix_candidate(&self.counts_file)
            .filter(|alt| alt != &self.counts_file)
            .into_iter()
            .collect()
    }
}

/// Derives the conventional `<sample>_counts.tsv` sibling of a primary path.
fn derive_suffix_candidate(primary: &Path) -> Option<PathBuf> {
    let name = primary.file_name()?.to_str()?;
    let mut base = name;
    for suffix in COUNT_SUFFIX_VARIANTS {
        if let Some(stripped) = base.strip_suffix(suffix) {
            base = stripped;
            break;
        }
    }
    let candidate = format!("{base}_counts.tsv");
    Some(primary.with_file_name(candidate))
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base directory for all artifacts, the checkpoint file, and the report.
    pub results_dir: PathBuf,
}

/// Per-stage enable flags. Everything defaults to enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageToggles {
    /// Run the exploratory analysis stage.
    #[serde(default = "default_true")]
    pub exploratory: bool,
    /// Run the quality-assessment stage.
    #[serde(default = "default_true")]
    pub quality: bool,
    /// Run the transcript-quantification stage.
    #[serde(default = "default_true")]
    pub quantification: bool,
    /// Run the enrichment stage.
    #[serde(default = "default_true")]
    pub enrichment: bool,
    /// Render the final report.
    #[serde(default = "default_true")]
    pub report: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            exploratory: true,
            quality: true,
            quantification: true,
            enrichment: true,
            report: true,
        }
    }
}

/// Per-stage parameter sub-maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageParameters {
    /// Exploratory analysis parameters.
    #[serde(default)]
    pub exploratory: ExploratoryParams,
    /// Quality-assessment parameters.
    #[serde(default)]
    pub quality: QualityParams,
    /// Quantification parameters.
    #[serde(default)]
    pub quantification: QuantificationParams,
    /// Enrichment parameters.
    #[serde(default)]
    pub enrichment: EnrichmentParams,
}

/// Parameters recognized by the exploratory analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploratoryParams {
    /// Emit the expression-distribution table.
    #[serde(default = "default_true")]
    pub distribution: bool,
    /// How many top-expressed genes to report.
    #[serde(default = "default_top_genes")]
    pub top_genes: usize,
    /// Count threshold used for the above-threshold summary line.
    #[serde(default = "default_min_counts")]
    pub min_counts: u64,
    /// Expected library size; 0 disables the comparison.
    #[serde(default)]
    pub expected_library_size: u64,
}

impl Default for ExploratoryParams {
    fn default() -> Self {
        Self {
            distribution: true,
            top_genes: default_top_genes(),
            min_counts: default_min_counts(),
            expected_library_size: 0,
        }
    }
}

/// Parameters recognized by the quality analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityParams {
    /// Count threshold for the genes-above-threshold metric.
    #[serde(default = "default_min_counts")]
    pub min_counts: u64,
    /// Expected library size; 0 disables the comparison.
    #[serde(default)]
    pub expected_library_size: u64,
}

impl Default for QualityParams {
    fn default() -> Self {
        Self {
            min_counts: default_min_counts(),
            expected_library_size: 0,
        }
    }
}

/// Parameters recognized by the quantification analyzer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuantificationParams {
    /// Abundance threshold for the detected-transcripts metric.
    #[serde(default)]
    pub min_abundance: f64,
}

/// Parameters recognized by the enrichment analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentParams {
    /// Produce a Gene Ontology candidate list.
    #[serde(default)]
    pub go_analysis: bool,
    /// Produce a KEGG pathway candidate list.
    #[serde(default)]
    pub kegg_analysis: bool,
    /// Percentage of top-expressed genes to select as candidates.
    #[serde(default = "default_top_percent")]
    pub top_percent: f64,
}

impl Default for EnrichmentParams {
    fn default() -> Self {
        Self {
            go_analysis: false,
            kegg_analysis: false,
            top_percent: default_top_percent(),
        }
    }
}

impl EnrichmentParams {
    /// True when at least one enrichment sub-analysis is enabled.
    #[must_use]
    pub const fn any_enabled(&self) -> bool {
        self.go_analysis || self.kegg_analysis
    }
}

const fn default_true() -> bool {
    true
}

const fn default_top_genes() -> usize {
    10
}

const fn default_min_counts() -> u64 {
    10
}

const fn default_top_percent() -> f64 {
    5.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_yaml_applies_defaults() {
        let yaml = r"
input:
  counts_file: /data/sample.bam_counts.tsv
output:
  results_dir: /results
";
        let config = PipelineConfiguration::from_yaml_str(yaml).unwrap();
        assert!(config.stages.exploratory);
        assert!(config.stages.report);
        assert!(!config.fail_fast);
        assert!(config.input.abundance_file.is_none());
        assert_eq!(config.parameters.exploratory.top_genes, 10);
        assert_eq!(config.parameters.enrichment.top_percent, 5.0);
        assert!(!config.parameters.enrichment.any_enabled());
    }

    #[test]
    fn test_full_yaml_round_trip() {
        let yaml = r"
input:
  counts_file: /data/sample_counts.tsv
  abundance_file: /data/abundance.tsv
  fallback_paths:
    - /data/alt_counts.tsv
output:
  results_dir: /results
stages:
  quantification: false
parameters:
  enrichment:
    go_analysis: true
    top_percent: 2.5
fail_fast: true
";
        let config = PipelineConfiguration::from_yaml_str(yaml).unwrap();
        assert!(config.fail_fast);
        assert!(!config.stages.quantification);
        assert!(config.stages.quality);
        assert!(config.parameters.enrichment.go_analysis);
        assert_eq!(config.parameters.enrichment.top_percent, 2.5);
        assert_eq!(
            config.input.alternate_candidates(),
            vec![PathBuf::from("/data/alt_counts.tsv")]
        );
    }

    #[test]
    fn test_derived_candidate_strips_bam_suffix() {
        let input = InputConfig {
            counts_file: PathBuf::from("/data/sampleA.bam_counts.tsv"),
            fallback_paths: vec![],
            abundance_file: None,
        };
        assert_eq!(
            input.alternate_candidates(),
            vec![PathBuf::from("/data/sampleA_counts.tsv")]
        );
    }

    #[test]
    fn test_derived_candidate_skips_identity() {
        let input = InputConfig {
            counts_file: PathBuf::from("/data/sampleA_counts.tsv"),
            fallback_paths: vec![],
            abundance_file: None,
        };
        // Stripping and re-appending reproduces the primary, so there is
        // nothing new to try.
        assert!(input.alternate_candidates().is_empty());
    }

    #[test]
    fn test_declared_fallbacks_win_over_derivation() {
        let input = InputConfig {
            counts_file: PathBuf::from("/data/sampleA.bam_counts.tsv"),
            fallback_paths: vec![PathBuf::from("/data/explicit.tsv")],
            abundance_file: None,
        };
        assert_eq!(
            input.alternate_candidates(),
            vec![PathBuf::from("/data/explicit.tsv")]
        );
    }
}
