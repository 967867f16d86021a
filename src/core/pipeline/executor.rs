//! End-to-end execution: discover, filter, persist.

use super::assembly::build_stages;
use super::engine::{EngineOptions, PipelineEngine};
use crate::core::config::CurationConfig;
use crate::core::item::{DirectorySource, Item, ItemSource, SourceConfig};
use crate::core::oracle::OracleProvider;
use crate::core::persist::{persist_all, DirectorySink, PersistSummary, PersistenceSink};
use crate::core::report::PipelineReport;
use crate::core::stage::Stage;
use crate::error::{ConfigError, CurateError};
use crate::events::{null_sender, Event, EventSender, PipelineEvent, PipelinePhase};
use std::path::PathBuf;
use std::sync::Arc;

/// Result of pipeline execution
#[derive(Debug)]
pub struct PipelineResult {
    /// Per-stage accounting
    pub report: PipelineReport,
    /// Items that survived every stage, in input order
    pub survivors: Vec<Item>,
    /// Entries skipped during discovery (non-fatal)
    pub scan_errors: Vec<String>,
    /// Persistence totals; `None` on a dry run
    pub persisted: Option<PersistSummary>,
}

/// Configuration for the pipeline
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Root of the input collection
    pub input: Option<PathBuf>,
    /// Destination for survivors
    pub output: Option<PathBuf>,
    /// Discovery settings
    pub source: SourceConfig,
    /// Engine settings
    pub engine: EngineOptions,
    /// Filter without persisting anything
    pub dry_run: bool,
}

/// Builder for a curation pipeline
pub struct PipelineBuilder {
    config: PipelineConfig,
    stages: Vec<Box<dyn Stage>>,
    source: Option<Box<dyn ItemSource>>,
    sink: Option<Box<dyn PersistenceSink>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            stages: Vec::new(),
            source: None,
            sink: None,
        }
    }

    /// Take stages and settings from a curation config
    pub fn from_config(config: &CurationConfig, provider: Arc<dyn OracleProvider>) -> Self {
        let mut builder = Self::new()
            .stages(build_stages(config, provider))
            .parallel(config.parallel);
        builder.config.input = config.input.clone();
        builder.config.output = config.output.clone();
        builder.config.source.extensions = config.extensions.clone();
        builder
    }

    /// Set the input collection root
    pub fn input(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input = Some(path.into());
        self
    }

    /// Set the output directory used by the default sink
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = Some(path.into());
        self
    }

    /// Replace all stages
    pub fn stages(mut self, stages: Vec<Box<dyn Stage>>) -> Self {
        self.stages = stages;
        self
    }

    /// Append one stage
    pub fn stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Use a custom item source instead of walking `input`
    pub fn source(mut self, source: Box<dyn ItemSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set discovery configuration
    pub fn source_config(mut self, config: SourceConfig) -> Self {
        self.config.source = config;
        self
    }

    /// Use a custom persistence sink instead of copying into `output`
    pub fn sink(mut self, sink: Box<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run decide phases in parallel (default) or sequentially
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.engine.parallel = parallel;
        self
    }

    /// Skip persistence
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<Pipeline, CurateError> {
        let input = self
            .config
            .input
            .clone()
            .ok_or_else(|| ConfigError::Missing("input directory".to_string()))?;

        let sink = match (self.sink, &self.config.output) {
            (Some(sink), _) => Some(sink),
            (None, Some(output)) => {
                Some(Box::new(DirectorySink::new(output)) as Box<dyn PersistenceSink>)
            }
            (None, None) if self.config.dry_run => None,
            (None, None) => return Err(ConfigError::Missing("output directory".to_string()).into()),
        };

        let source = self
            .source
            .unwrap_or_else(|| Box::new(DirectorySource::new(self.config.source.clone())));

        Ok(Pipeline {
            input,
            engine: self.config.engine,
            dry_run: self.config.dry_run,
            stages: self.stages,
            source,
            sink,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured curation run
pub struct Pipeline {
    input: PathBuf,
    engine: EngineOptions,
    dry_run: bool,
    stages: Vec<Box<dyn Stage>>,
    source: Box<dyn ItemSource>,
    sink: Option<Box<dyn PersistenceSink>>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Run the pipeline without events
    pub fn run(&mut self) -> Result<PipelineResult, CurateError> {
        self.run_with_events(&null_sender())
    }

    /// Run the pipeline with event reporting
    ///
    /// Nothing is persisted unless every stage completes.
    pub fn run_with_events(&mut self, events: &EventSender) -> Result<PipelineResult, CurateError> {
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Scanning,
        }));

        let discovery = self
            .source
            .discover_with_events(&self.input, events)
            .map_err(|e| aborted(events, e.into()))?;
        let scan_errors: Vec<String> = discovery.errors.iter().map(|e| e.to_string()).collect();

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Filtering,
        }));

        // The engine reports its own abort
        let mut engine = PipelineEngine::new(self.engine);
        let run = engine.run(discovery.items, &mut self.stages, events)?;
        let survivors = run.survivors.into_items();

        let persisted = match (&self.sink, self.dry_run) {
            (Some(sink), false) => {
                events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
                    phase: PipelinePhase::Persisting,
                }));
                let summary = persist_all(sink.as_ref(), &survivors, events)
                    .map_err(|e| aborted(events, e.into()))?;
                Some(summary)
            }
            _ => {
                tracing::info!(survivors = survivors.len(), "dry run, nothing persisted");
                None
            }
        };

        Ok(PipelineResult {
            report: run.report,
            survivors,
            scan_errors,
            persisted,
        })
    }
}

fn aborted(events: &EventSender, error: CurateError) -> CurateError {
    tracing::error!(error = %error, "run aborted");
    events.send(Event::Pipeline(PipelineEvent::Aborted {
        stage: error.stage_name().map(str::to_string),
        message: error.to_string(),
    }));
    error
}
