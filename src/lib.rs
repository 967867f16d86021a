//! # Image Curator
//!
//! A staged pipeline that narrows a collection of images down to a curated
//! subset and explains how much each stage removed.
//!
//! ## Core Philosophy
//! - **Deterministic** - the same input and oracle answers always yield the same survivors
//! - **Auditable** - every stage reports how many items went in and came out
//! - **All or nothing** - a run either completes and persists, or aborts with one reason
//!
//! ## Architecture
//! The library is split into a core engine and presentation layers:
//! - `core` - stages, duplicate clustering, the pipeline engine and persistence
//! - `events` - Event-driven progress reporting
//! - `error` - Fatal and per-item error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{CurateError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `default_level`
/// applies when `RUST_LOG` is not set.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // A subscriber may already be installed (e.g. by an embedding application)
    let _ = tracing::subscriber::set_global_default(subscriber);
}
