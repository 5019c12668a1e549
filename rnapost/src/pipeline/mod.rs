//! The pipeline controller.
//!
//! Orchestrates the fixed postprocessing sequence: resolve the input
//! dataset, iterate the analysis stages in order, apply enable/disable and
//! fail-fast policy, checkpoint completions, and hand the accumulated
//! results to the report generator. Stage failures are caught here and
//! converted into recorded outcomes; nothing escapes [`run`] as an error.
//!
//! [`run`]: PipelineController::run


use crate::analyzers::{
    EnrichmentAnalyzer, ExploratoryAnalyzer, QualityAnalyzer, QuantificationAnalyzer,
    StageAnalyzer, StageInput,
};
use crate::checkpoint::{CheckpointStatus, CheckpointStore};
use crate::config::PipelineConfiguration;
use crate::dataset::Dataset;
use crate::errors::{AnalysisError, PipelineError};
use crate::events::{EventSink, LoggingEventSink};
use crate::report::MarkdownReporter;
use crate::results::{RunResults, StageName};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Orchestrates one postprocessing run.
///
/// Owns the run's [`RunResults`] and dataset for its lifetime; the only
/// state shared with other runs is the on-disk checkpoint store, namespaced
/// by output directory.
pub struct PipelineController {
    config: PipelineConfiguration,
    run_id: Uuid,
    results: RunResults,
    analyzers: BTreeMap<StageName, Box<dyn StageAnalyzer>>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("run_id", &self.run_id)
            .field("fail_fast", &self.config.fail_fast)
            .finish()
    }
}

impl PipelineController {
    /// Creates a controller with the default analyzers wired from `config`.
    #[must_use]
    pub fn new(config: PipelineConfiguration) -> Self {
        let out = &config.output.results_dir;
        let params = &config.parameters;
        let mut analyzers: BTreeMap<StageName, Box<dyn StageAnalyzer>> = BTreeMap::new();
        analyzers.insert(
            StageName::Exploratory,
            Box::new(ExploratoryAnalyzer::new(out, params.exploratory.clone())),
        );
        analyzers.insert(
            StageName::Quality,
            Box::new(QualityAnalyzer::new(out, params.quality.clone())),
        );
        analyzers.insert(
            StageName::Quantification,
            Box::new(QuantificationAnalyzer::new(out, params.quantification.clone())),
        );
        analyzers.insert(
            StageName::Enrichment,
            Box::new(EnrichmentAnalyzer::new(out, params.enrichment.clone())),
        );

        Self {
            config,
            run_id: Uuid::new_v4(),
            results: RunResults::new(),
            analyzers,
            events: Arc::new(LoggingEventSink),
        }
    }

    /// Replaces the analyzer for the stage it reports via
    /// [`StageAnalyzer::stage`]. Used for instrumentation and testing.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: Box<dyn StageAnalyzer>) -> Self {
        self.analyzers.insert(analyzer.stage(), analyzer);
        self
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// This run's correlation id.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The results accumulated so far (complete after [`run`] returns).
    ///
    /// [`run`]: Self::run
    #[must_use]
    pub const fn results(&self) -> &RunResults {
        &self.results
    }

    /// Removes any persisted checkpoints for this configuration's output
    /// directory, forcing the next run to start from the beginning.
    pub fn clear_checkpoints(&self) {
        let mut store = CheckpointStore::open(&self.config.output.results_dir);
        store.clear();
    }

    /// Runs the pipeline; returns `true` only if nothing failed.
    ///
    /// Side effects: output directory creation, per-stage artifact files,
    /// checkpoint updates, the report artifact, and one event per stage
    /// transition.
    pub async fn run(&mut self) -> bool {
        self.emit("pipeline.started", serde_json::json!({}));

        // Step 1: resolve the primary dataset path, trying alternates once.
        let counts_file = match self.resolve_input_path() {
            Ok(path) => path,
            Err(err) => {
                error!(run_id = %self.run_id, error = %err, "aborting: no usable counts file");
                self.emit("pipeline.failed", serde_json::json!({"error": err.to_string()}));
                return false;
            }
        };
        self.results.input_file = Some(counts_file.clone());

        let results_dir = self.config.output.results_dir.clone();
        if let Err(source) = std::fs::create_dir_all(&results_dir) {
            let err = PipelineError::OutputDir {
                path: results_dir,
                source,
            };
            error!(run_id = %self.run_id, error = %err, "aborting: output directory unusable");
            self.emit("pipeline.failed", serde_json::json!({"error": err.to_string()}));
            return false;
        }
        let mut checkpoints = CheckpointStore::open(&results_dir);

        // Step 2: load the dataset. A load failure is non-fatal unless
        // fail_fast is set; stages then see the empty placeholder.
        let dataset = match Dataset::load(&counts_file) {
            Ok(dataset) => dataset,
            Err(source) => {
                let err = PipelineError::Dataset(source);
                warn!(run_id = %self.run_id, error = %err, "counts dataset failed to load");
                self.results.load_error = Some(err.to_string());
                if self.config.fail_fast {
                    self.emit("pipeline.failed", serde_json::json!({"error": err.to_string()}));
                    return false;
                }
                Dataset::placeholder()
            }
        };

        // Step 3: the fixed analysis sequence.
        for stage in StageName::ANALYSIS_ORDER {
            if !self.stage_enabled(stage) {
                debug!(run_id = %self.run_id, stage = %stage, "stage disabled");
                self.skip(stage, "disabled");
                continue;
            }
            if checkpoints.should_skip_step(stage.as_str()) {
                info!(run_id = %self.run_id, stage = %stage, "skipping stage (already completed)");
                self.skip(stage, "already completed");
                continue;
            }
            let input = match self.stage_input(stage, &counts_file, &dataset) {
                Some(input) => input,
                None => continue,
            };

            info!(run_id = %self.run_id, stage = %stage, "running stage");
            self.emit("stage.started", serde_json::json!({"stage": stage.as_str()}));
            checkpoints.save_checkpoint(stage.as_str(), CheckpointStatus::Running);

            let outcome = match self.analyzers.get(&stage) {
                Some(analyzer) => analyzer.run_analysis(input).await,
                None => Err(AnalysisError::MalformedInput(format!(
                    "no analyzer registered for stage {stage}"
                ))),
            };

            match outcome {
                Ok(result) => {
                    checkpoints.save_checkpoint(stage.as_str(), CheckpointStatus::Completed);
                    self.emit("stage.completed", serde_json::json!({"stage": stage.as_str()}));
                    self.results.record_success(result);
                }
                Err(source) => {
                    let err = PipelineError::Stage {
                        stage: stage.to_string(),
                        source,
                    };
                    error!(run_id = %self.run_id, stage = %stage, error = %err, "stage failed");
                    checkpoints.save_checkpoint(stage.as_str(), CheckpointStatus::Failed);
                    self.emit(
                        "stage.failed",
                        serde_json::json!({"stage": stage.as_str(), "error": err.to_string()}),
                    );
                    self.results.record_failure(stage, err.to_string());
                    if self.config.fail_fast {
                        self.emit("pipeline.failed", serde_json::json!({"stage": stage.as_str()}));
                        return false;
                    }
                }
            }
        }

        // Step 4: the report, under the same policy as any other stage.
        if self.config.stages.report && !checkpoints.should_skip_step(StageName::Report.as_str()) {
            let reporter = MarkdownReporter::new(&self.config.output.results_dir);
            self.emit("stage.started", serde_json::json!({"stage": "report"}));
            match reporter.generate_report(&self.results, &dataset) {
                Ok(path) => {
                    checkpoints
                        .save_checkpoint(StageName::Report.as_str(), CheckpointStatus::Completed);
                    self.emit("stage.completed", serde_json::json!({"stage": "report"}));
                    self.results.final_report = Some(path);
                }
                Err(source) => {
                    let err = PipelineError::Report(source);
                    error!(run_id = %self.run_id, error = %err, "report generation failed");
                    checkpoints
                        .save_checkpoint(StageName::Report.as_str(), CheckpointStatus::Failed);
                    self.emit(
                        "stage.failed",
                        serde_json::json!({"stage": "report", "error": err.to_string()}),
                    );
                    self.results.record_failure(StageName::Report, err.to_string());
                    if self.config.fail_fast {
                        self.emit("pipeline.failed", serde_json::json!({"stage": "report"}));
                        return false;
                    }
                }
            }
        }

        // Step 5: the aggregate verdict.
        let success = self.results.is_clean();
        info!(
            run_id = %self.run_id,
            success,
            failed_stages = self.results.failed_count(),
            "pipeline finished"
        );
        self.emit("pipeline.finished", serde_json::json!({"success": success}));
        success
    }

    /// Tries the primary path, then each alternate candidate once.
    fn resolve_input_path(&self) -> Result<PathBuf, PipelineError> {
        let primary = &self.config.input.counts_file;
        if primary.exists() {
            return Ok(primary.clone());
        }
        let candidates = self.config.input.alternate_candidates();
        for candidate in &candidates {
            if candidate.exists() {
                info!(
                    run_id = %self.run_id,
                    file = %candidate.display(),
                    "using alternative counts file"
                );
                return Ok(candidate.clone());
            }
        }
        Err(PipelineError::InputUnresolvable {
            primary: primary.clone(),
            candidates,
        })
    }

    const fn stage_enabled(&self, stage: StageName) -> bool {
        let toggles = &self.config.stages;
        match stage {
            StageName::Exploratory => toggles.exploratory,
            StageName::Quality => toggles.quality,
            StageName::Quantification => toggles.quantification,
            StageName::Enrichment => toggles.enrichment,
            StageName::Report => toggles.report,
        }
    }

    /// Resolves the designated input for a stage, applying the per-stage
    /// auto-skip conditions. `None` means the stage was skipped (never an
    /// error).
    fn stage_input<'a>(
        &'a self,
        stage: StageName,
        counts_file: &'a Path,
        dataset: &'a Dataset,
    ) -> Option<StageInput<'a>> {
        match stage {
            StageName::Exploratory => Some(StageInput::CountsFile(counts_file)),
            StageName::Quality => Some(StageInput::Dataset(dataset)),
            StageName::Quantification => {
                let Some(abundance) = self.config.input.abundance_file.as_deref() else {
                    debug!(run_id = %self.run_id, "no abundance file configured, skipping quantification");
                    self.skip(stage, "no abundance file configured");
                    return None;
                };
                if !abundance.exists() {
                    warn!(
                        run_id = %self.run_id,
                        file = %abundance.display(),
                        "abundance file not found, skipping quantification"
                    );
                    self.skip(stage, "abundance file not found");
                    return None;
                }
                Some(StageInput::AbundanceFile(abundance))
            }
            StageName::Enrichment => {
                if !self.config.parameters.enrichment.any_enabled() {
                    debug!(run_id = %self.run_id, "no enrichment sub-analysis enabled, skipping");
                    self.skip(stage, "no sub-analysis enabled");
                    return None;
                }
                Some(StageInput::Dataset(dataset))
            }
            StageName::Report => None,
        }
    }

    fn skip(&self, stage: StageName, reason: &str) {
        self.emit(
            "stage.skipped",
            serde_json::json!({"stage": stage.as_str(), "reason": reason}),
        );
    }

    fn emit(&self, event_type: &str, mut data: serde_json::Value) {
        if let Some(map) = data.as_object_mut() {
            map.insert(
                "run_id".to_string(),
                serde_json::Value::String(self.run_id.to_string()),
            );
        }
        self.events.emit(event_type, Some(data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputConfig, OutputConfig, StageParameters, StageToggles};

    fn config(dir: &Path) -> PipelineConfiguration {
        PipelineConfiguration {
            input: InputConfig {
                counts_file: dir.join("counts.tsv"),
                fallback_paths: vec![],
                abundance_file: None,
            },
            output: OutputConfig {
                results_dir: dir.join("results"),
            },
            stages: StageToggles::default(),
            parameters: StageParameters::default(),
            fail_fast: false,
        }
    }

    #[test]
    fn test_controller_wires_default_analyzers() {
        let dir = std::env::temp_dir();
        let controller = PipelineController::new(config(&dir));
        for stage in StageName::ANALYSIS_ORDER {
            assert!(controller.analyzers.contains_key(&stage), "missing {stage}");
        }
    }

    #[tokio::test]
    async fn test_unresolvable_input_aborts_without_stages() {
        let tmp = tempfile::tempdir().unwrap();
        let mut controller = PipelineController::new(config(tmp.path()));
        assert!(!controller.run().await);
        assert!(controller.results().stages.is_empty());
        assert!(controller.results().final_report.is_none());
    }
}
