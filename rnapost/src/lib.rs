//! # rnapost
//!
//! Postprocessing orchestration for bulk RNA-seq count data.
//!
//! Upstream alignment and quantification tools hand this crate a gene-level
//! counts table (and optionally a transcript-abundance table); the pipeline
//! controller runs a fixed sequence of analysis stages against it:
//!
//! - **Exploratory analysis**: headline statistics and top-expressed genes
//! - **Quality assessment**: detection and library-size metrics
//! - **Quantification**: per-sample abundance summaries and correlations
//! - **Enrichment**: top-gene candidate selection for GO/KEGG lookups
//! - **Report**: a best-effort markdown document over whatever completed
//!
//! Stages checkpoint on completion so a crashed run resumes where it left
//! off, and a `fail_fast` policy decides whether one stage's failure stops
//! the run or merely degrades it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rnapost::prelude::*;
//!
//! let config = PipelineConfiguration::from_yaml_file("pipeline.yaml")?;
//! let mut controller = PipelineController::new(config);
//! let success = controller.run().await;
//! println!("report: {:?}", controller.results().final_report);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

pub mod analyzers;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod results;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::analyzers::{
        EnrichmentAnalyzer, ExploratoryAnalyzer, QualityAnalyzer, QuantificationAnalyzer,
        StageAnalyzer, StageInput,
    };
    pub use crate::checkpoint::{CheckpointStatus, CheckpointStore};
    pub use crate::config::{
        EnrichmentParams, ExploratoryParams, PipelineConfiguration, QualityParams,
        QuantificationParams,
    };
    pub use crate::dataset::{Dataset, Feature};
    pub use crate::errors::{AnalysisError, DatasetError, PipelineError, ReportError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::PipelineController;
    pub use crate::report::MarkdownReporter;
    pub use crate::results::{RunResults, StageName, StageOutcome, StageResult};
}
