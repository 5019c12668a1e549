//! The primary counts dataset.
//!
//! Loads a featureCounts-style tab-separated table: `#`-prefixed comment
//! lines, a header row, a feature-identifier column first, opaque metadata
//! columns in the middle, and the count column last. The count column's
//! header is non-deterministic upstream output naming (often a full BAM
//! path), so schema detection is positional and explicit: the last column
//! is normalized into `raw_counts` and a path-like header is surfaced as a
//! warning instead of silently inferred.

use crate::errors::DatasetError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One row of the counts table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    /// Unique feature identifier (gene or transcript id).
    pub id: String,
    /// Metadata fields between the identifier and the count column
    /// (location, length, strand — kept opaque).
    pub meta: Vec<String>,
    /// Normalized raw count, taken from the last column.
    pub raw_counts: u64,
}

/// The loaded counts table.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    source: Option<PathBuf>,
    columns: Vec<String>,
    features: Vec<Feature>,
    warnings: Vec<String>,
}

impl Dataset {
    /// Loads and validates a counts table from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    /// Parses a counts table from an in-memory string.
    pub fn parse(raw: &str, path: &Path) -> Result<Self, DatasetError> {
        let mut lines = raw.lines().filter(|line| !line.starts_with('#'));

        let header = lines.next().ok_or_else(|| DatasetError::Empty {
            path: path.to_path_buf(),
        })?;
        let columns: Vec<String> = header.split('\t').map(str::to_string).collect();
        if columns.len() < 2 {
            return Err(DatasetError::NoCountColumn {
                path: path.to_path_buf(),
                columns: columns.len(),
            });
        }

        let mut warnings = Vec::new();
        let count_column = &columns[columns.len() - 1];
        if looks_like_tool_path(count_column) {
            warnings.push(format!(
                "count column header {count_column:?} looks like an upstream tool path; \
                 using it positionally"
            ));
        }

        let mut features = Vec::new();
        for (idx, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != columns.len() {
                return Err(DatasetError::RaggedRow {
                    path: path.to_path_buf(),
                    row: idx + 1,
                    found: fields.len(),
                    expected: columns.len(),
                });
            }
            let count_cell = fields[fields.len() - 1];
            let raw_counts = parse_count(count_cell).ok_or_else(|| DatasetError::BadCount {
                path: path.to_path_buf(),
                row: idx + 1,
                value: count_cell.to_string(),
            })?;
            features.push(Feature {
                id: fields[0].to_string(),
                meta: fields[1..fields.len() - 1]
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect(),
                raw_counts,
            });
        }

        for warning in &warnings {
            warn!(path = %path.display(), "{warning}");
        }
        debug!(
            path = %path.display(),
            features = features.len(),
            count_column = %count_column,
            "loaded counts table"
        );

        Ok(Self {
            source: Some(path.to_path_buf()),
            columns,
            features,
            warnings,
        })
    }

    /// An empty stand-in used when loading fails but the run continues.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// The path the dataset was loaded from, when it was.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Header names, count column last.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Warnings recorded during schema detection.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// All features in file order.
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when the dataset holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Sum of all raw counts (the library size).
    #[must_use]
    pub fn total_counts(&self) -> u64 {
        self.features.iter().map(|f| f.raw_counts).sum()
    }

    /// Number of features with a nonzero count.
    #[must_use]
    pub fn expressed_features(&self) -> usize {
        self.features.iter().filter(|f| f.raw_counts > 0).count()
    }

    /// Number of features with at least `threshold` counts.
    #[must_use]
    pub fn features_at_least(&self, threshold: u64) -> usize {
        self.features
            .iter()
            .filter(|f| f.raw_counts >= threshold)
            .count()
    }

    /// The `n` highest-expressed features, ties broken by id for
    /// deterministic output.
    #[must_use]
    pub fn top_features(&self, n: usize) -> Vec<&Feature> {
        let mut sorted: Vec<&Feature> = self.features.iter().collect();
        sorted.sort_by(|a, b| {
            b.raw_counts
                .cmp(&a.raw_counts)
                .then_with(|| a.id.cmp(&b.id))
        });
        sorted.truncate(n);
        sorted
    }

    /// Mean raw count, or 0.0 for an empty dataset.
    #[must_use]
    pub fn mean_count(&self) -> f64 {
        if self.features.is_empty() {
            return 0.0;
        }
        self.total_counts() as f64 / self.features.len() as f64
    }

    /// Median raw count, or 0.0 for an empty dataset.
    #[must_use]
    pub fn median_count(&self) -> f64 {
        if self.features.is_empty() {
            return 0.0;
        }
        let mut counts: Vec<u64> = self.features.iter().map(|f| f.raw_counts).collect();
        counts.sort_unstable();
        let mid = counts.len() / 2;
        if counts.len() % 2 == 0 {
            (counts[mid - 1] + counts[mid]) as f64 / 2.0
        } else {
            counts[mid] as f64
        }
    }

    /// Maximum raw count and the feature carrying it.
    #[must_use]
    pub fn max_feature(&self) -> Option<&Feature> {
        self.features.iter().max_by(|a, b| {
            a.raw_counts
                .cmp(&b.raw_counts)
                .then_with(|| b.id.cmp(&a.id))
        })
    }
}

/// Parses a count cell, tolerating float-formatted integers some upstream
/// tools emit.
fn parse_count(cell: &str) -> Option<u64> {
    if let Ok(v) = cell.parse::<u64>() {
        return Some(v);
    }
    let v = cell.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 {
        Some(v.round() as u64)
    } else {
        None
    }
}

fn looks_like_tool_path(header: &str) -> bool {
    header.contains('/') || header.contains('\\') || header.ends_with(".bam")
}
