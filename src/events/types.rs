//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the curation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Input discovery events
    Scan(ScanEvent),
    /// Per-stage events
    Stage(StageEvent),
    /// Persistence events
    Persist(PersistEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events while discovering input images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Discovery has started
    Started { root: PathBuf },
    /// An entry could not be read but discovery continues
    Error { path: PathBuf, message: String },
    /// Discovery completed
    Completed { total_items: usize },
}

/// Events emitted while a single stage runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageEvent {
    /// The stage is about to run its setup phase
    Started {
        index: usize,
        name: String,
        count_in: usize,
    },
    /// Setup finished; per-item decisions follow
    SetupCompleted { index: usize, name: String },
    /// Progress through the decide phase
    Progress(StageProgress),
    /// The stage finished and its counts are final
    Completed(StageSummary),
}

/// Progress information during a decide phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    /// Position of the stage in the pipeline
    pub index: usize,
    /// Items decided so far
    pub completed: usize,
    /// Items entering the stage
    pub total: usize,
}

/// Counts for a finished stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub index: usize,
    pub name: String,
    pub count_in: usize,
    pub count_out: usize,
}

/// Events while copying survivors to the output location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PersistEvent {
    /// Persistence started
    Started { total_items: usize },
    /// One item was handled
    ItemPersisted { id: String, written: bool },
    /// Persistence finished
    Completed { written: usize, already_present: usize },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started with this many stages
    Started { stage_count: usize },
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed successfully
    Completed { summary: PipelineSummary },
    /// Pipeline aborted on a fatal error
    Aborted {
        stage: Option<String>,
        message: String,
    },
}

/// Phases of a curation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Scanning,
    Filtering,
    Persisting,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Items entering the first stage
    pub initial_count: usize,
    /// Items surviving the last stage
    pub final_count: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Scanning => write!(f, "Scanning"),
            PipelinePhase::Filtering => write!(f, "Filtering"),
            PipelinePhase::Persisting => write!(f, "Persisting"),
        }
    }
}
