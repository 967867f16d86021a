//! # Pipeline Module
//!
//! Orchestrates a full curation run.
//!
//! ## Phases
//! 1. **Scan** - Discover the input collection
//! 2. **Filter** - Run every stage in order; each stage's setup sees the
//!    whole surviving set, then decides per item
//! 3. **Persist** - Copy survivors to the output directory (skipped on a
//!    dry run or an aborted run)
//!
//! ## Parallelism
//! Uses rayon for the per-item decide phase. Decisions are collected in
//! input order, so parallel and sequential runs produce identical output.

mod assembly;
mod engine;
mod executor;

pub use assembly::build_stages;
pub use engine::{EngineOptions, PipelineEngine, PipelineRun, RunState};
pub use executor::{Pipeline, PipelineBuilder, PipelineConfig, PipelineResult};
