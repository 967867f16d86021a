//! # Error Module
//!
//! Error types for the curation pipeline.
//!
//! ## Two classes of failure
//! - **Fatal** - aborts the whole run: a resource cannot be loaded, the
//!   distance oracle fails entirely, or an engine invariant is broken.
//!   These surface as [`CurateError`] and always name the stage involved.
//! - **Item** - scoped to one image ([`ItemError`]). Resolved inside the stage
//!   into a keep/drop decision and never escapes it.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error. Every variant is fatal for the run.
#[derive(Error, Debug)]
pub enum CurateError {
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("Stage '{stage}' broke a pipeline invariant: {reason}")]
    InvariantViolation { stage: String, reason: String },

    #[error("Pipeline engine cannot run again: it is already {state}")]
    EngineReused { state: &'static str },

    #[error("Item id '{id}' appears more than once in the input")]
    DuplicateItem { id: String },

    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Failed to write report {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CurateError {
    /// Name of the stage that caused the abort, if any
    pub fn stage_name(&self) -> Option<&str> {
        match self {
            CurateError::Stage { stage, .. } | CurateError::InvariantViolation { stage, .. } => {
                Some(stage)
            }
            _ => None,
        }
    }
}

/// Fatal failures raised by a stage during `setup` or `decide`
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Failed to load resource '{resource}': {reason}")]
    ResourceLoad { resource: String, reason: String },

    #[error("Missing required option '{key}'")]
    MissingOption { key: String },

    #[error("Invalid value for option '{key}': expected {expected}")]
    InvalidOption { key: String, expected: String },

    #[error("Oracle failed: {0}")]
    OracleFailed(#[source] OracleError),

    #[error("decide() called before setup() completed")]
    NotReady,
}

/// Failures reported by an external oracle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("No {kind} backend is available")]
    Unavailable { kind: String },

    #[error("No annotation recorded for item '{id}'")]
    MissingAnnotation { id: String },

    #[error("Oracle call failed: {0}")]
    Failed(String),
}

/// Failures scoped to a single item
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Failed to decode image {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Classifier failed on '{id}': {source}")]
    Classifier {
        id: String,
        #[source]
        source: OracleError,
    },
}

/// Errors that occur while discovering input images
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors in the curation configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("No stages configured")]
    NoStages,

    #[error("Stage name '{name}' is used more than once")]
    DuplicateStageName { name: String },

    #[error("Missing required setting: {0}")]
    Missing(String),
}

/// Errors while copying surviving items to the output location
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy '{id}' to {target}: {source}")]
    Copy {
        id: String,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CurateError>;
