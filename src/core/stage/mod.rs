//! # Stage Module
//!
//! The two-phase contract every pipeline step implements.
//!
//! ## Lifecycle
//! 1. **setup** - called once with the working set as it enters the stage.
//!    Loads models, reads options, precomputes set-level state. May fail
//!    fatally.
//! 2. **decide** - called once per surviving item, possibly in parallel.
//!    Reads the state built by setup and returns a [`Decision`].
//!
//! `setup` takes `&mut self` and `decide` takes `&self`, so state can only
//! change before the decide phase starts.
//!
//! ## Per-item failures
//! Classifier stages resolve item errors locally with an [`ErrorPolicy`]:
//! - oracle errors fall back to the stage's policy (fail-open by default)
//! - unreadable images are always dropped

mod advertisement;
mod age;
mod classifier;
mod full_body;
mod person;

pub use advertisement::AdvertisementFilter;
pub use age::AgeFilter;
pub use full_body::FullBodyFilter;
pub use person::PersonDetector;

use crate::core::item::Item;
use crate::error::{ItemError, StageError};
use serde::{Deserialize, Serialize};

/// Outcome of one stage for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub keep: bool,
    pub reason: Option<String>,
}

impl Decision {
    /// Keep the item
    pub fn keep() -> Self {
        Self {
            keep: true,
            reason: None,
        }
    }

    /// Drop the item, recording why
    pub fn drop(reason: impl Into<String>) -> Self {
        Self {
            keep: false,
            reason: Some(reason.into()),
        }
    }

    /// Attach or replace the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// A single step of the pipeline
pub trait Stage: Send + Sync {
    /// Name used in reports and diagnostics
    fn name(&self) -> &str;

    /// What kind of stage this is
    fn kind(&self) -> StageKind;

    /// Prepare the stage for the items entering it
    fn setup(&mut self, items: &[Item]) -> Result<(), StageError>;

    /// Decide whether one item survives this stage
    ///
    /// Errors returned here are fatal for the run; per-item problems must be
    /// resolved into a [`Decision`] instead.
    fn decide(&self, item: &Item) -> Result<Decision, StageError>;
}

/// Built-in stage kinds, as named in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Near-duplicate consolidation
    Dedupe,
    /// Keep images containing a person
    PersonDetector,
    /// Keep images where head and legs are visible
    FullBody,
    /// Keep images whose subject meets a minimum age
    Age,
    /// Drop promotional images
    Advertisement,
}

impl StageKind {
    /// Report name used when the configuration gives none
    pub fn default_name(&self) -> &'static str {
        match self {
            StageKind::Dedupe => "dedupe",
            StageKind::PersonDetector => "person_detector",
            StageKind::FullBody => "full_body",
            StageKind::Age => "age",
            StageKind::Advertisement => "advertisement",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.default_name())
    }
}

/// How a classifier stage resolves a failed oracle call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Keep the item; transient classifier faults never destroy data
    #[default]
    FailOpen,
    /// Drop the item
    FailClosed,
}

impl ErrorPolicy {
    /// Turn an item-scoped error into a decision.
    ///
    /// Unreadable items are dropped whatever the policy.
    pub fn resolve(&self, stage: &str, error: ItemError) -> Decision {
        match error {
            ItemError::Unreadable { ref path, ref reason } => {
                tracing::debug!(stage, path = %path.display(), reason = %reason, "dropping unreadable image");
                Decision::drop("unreadable image")
            }
            ItemError::Classifier { ref id, ref source } => match self {
                ErrorPolicy::FailOpen => {
                    tracing::warn!(stage, id = %id, error = %source, "classifier failed, keeping item");
                    Decision::keep().with_reason(format!("classifier error: {source}"))
                }
                ErrorPolicy::FailClosed => {
                    tracing::warn!(stage, id = %id, error = %source, "classifier failed, dropping item");
                    Decision::drop("classifier error")
                }
            },
        }
    }
}
