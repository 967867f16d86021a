//! # Report Module
//!
//! Per-stage accounting for one completed run.
//!
//! Every stage contributes one [`StageReport`] in execution order. Reports
//! are only produced for runs that complete; an aborted run yields an error
//! instead.

mod export;

pub use export::{export_csv, export_json, export_to_file, ExportFormat};

use crate::core::stage::StageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage_name: String,
    pub kind: StageKind,
    pub count_in: usize,
    pub count_out: usize,
    /// How many items were dropped for each reason
    pub drop_reasons: BTreeMap<String, usize>,
    pub duration_ms: u64,
}

impl StageReport {
    pub fn dropped(&self) -> usize {
        self.count_in.saturating_sub(self.count_out)
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub initial_count: usize,
    pub final_count: usize,
    pub stages: Vec<StageReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    /// Percentage of the initial items that survived, 0 for an empty input
    pub fn retention_percent(&self) -> f64 {
        if self.initial_count == 0 {
            return 0.0;
        }
        self.final_count as f64 / self.initial_count as f64 * 100.0
    }

    /// Total number of items removed across all stages
    pub fn filtered_count(&self) -> usize {
        self.initial_count.saturating_sub(self.final_count)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
