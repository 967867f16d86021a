//! # Core Module
//!
//! The UI-agnostic curation engine.
//!
//! ## Modules
//! - `item` - Discovers images and tracks the working set
//! - `config` - Loads the run configuration and per-stage options
//! - `stage` - The two-phase stage contract and the classifier stages
//! - `oracle` - Interfaces to external classifiers
//! - `dedupe` - Near-duplicate clustering
//! - `pipeline` - Runs stages in order and persists the survivors
//! - `report` - Per-stage accounting and export
//! - `persist` - Idempotent output sinks

pub mod config;
pub mod dedupe;
pub mod item;
pub mod oracle;
pub mod persist;
pub mod pipeline;
pub mod report;
pub mod stage;

// Re-export commonly used types
pub use config::{CurationConfig, StageConfig, StageOptions};
pub use dedupe::{DistanceOracle, DuplicateClusterer, Edge};
pub use item::{Item, WorkingSet};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineEngine, PipelineResult};
pub use report::{PipelineReport, StageReport};
pub use stage::{Decision, Stage, StageKind};
