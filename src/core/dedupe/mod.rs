//! # Dedupe Module
//!
//! Consolidates near-duplicate images into equivalence classes and keeps
//! exactly one member of each.
//!
//! ## How It Works
//! 1. A [`DistanceOracle`] compares the items it chooses to compare and
//!    reports [`Edge`]s with a numeric distance
//! 2. Every edge with `distance <= threshold` unions its two endpoints
//!    (duplicate relationships are transitively closed)
//! 3. Each cluster keeps its lexicographically smallest id; every other
//!    member is dropped as a duplicate of it
//!
//! If A~B and B~C then {A, B, C} is one cluster even if A and C were
//! never compared, or compare above the threshold.
//!
//! ## Built-in oracles
//! | `oracle` option | Distance |
//! |-----------------|----------|
//! | `perceptual`    | Hamming distance between gradient hashes |
//! | `exact`         | 0 for byte-identical files |

mod clusterer;
mod clusters;
mod oracles;

pub use clusterer::DuplicateClusterer;
pub use clusters::DuplicateClusters;
pub use oracles::{ContentDigestOracle, PerceptualHashOracle};

use crate::core::item::Item;
use crate::error::OracleError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Distance between two items, as reported by a distance oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: String,
    pub b: String,
    pub distance: f64,
}

impl Edge {
    pub fn new(a: impl Into<String>, b: impl Into<String>, distance: f64) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            distance,
        }
    }
}

/// Everything a distance oracle learned about a working set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    /// Pairs the oracle compared
    pub edges: Vec<Edge>,
    /// Items whose content could not be read
    pub unreadable: BTreeSet<String>,
}

impl From<Vec<Edge>> for Comparison {
    fn from(edges: Vec<Edge>) -> Self {
        Self {
            edges,
            unreadable: BTreeSet::new(),
        }
    }
}

/// Pairwise distance source used by the duplicate clusterer
///
/// The oracle decides which pairs to compare; it is not required to be
/// exhaustive. Failing on individual items only loses edges. Returning an
/// error means the oracle failed entirely, which aborts the run.
pub trait DistanceOracle: Send + Sync {
    fn compare(&self, items: &[Item]) -> Result<Comparison, OracleError>;
}
