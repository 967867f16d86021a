//! # Item Module
//!
//! Items are the images flowing through the pipeline, and the working set
//! is the ordered collection of items still alive between stages.
//!
//! ## Identity
//! An item's id is its path relative to the input root, with `/`
//! separators. Ids are unique within a run and sort the same way on
//! every platform, which is what makes canonical duplicate selection
//! reproducible.
//!
//! ## Example
//! ```rust,ignore
//! use image_curator::core::item::{DirectorySource, ItemSource, SourceConfig};
//!
//! let source = DirectorySource::new(SourceConfig::default());
//! let discovery = source.discover(Path::new("data/original_raw"))?;
//! let working_set = WorkingSet::new(discovery.items)?;
//! ```

mod filter;
mod source;

pub use filter::ExtensionFilter;
pub use source::{DirectorySource, SourceConfig};

use crate::error::{CurateError, ScanError};
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One image in the collection. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    id: String,
    path: PathBuf,
}

impl Item {
    /// Create an item from its id and the location of its content
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// Stable, unique key of the item
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the item's bytes live
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Ordered, duplicate-free sequence of surviving items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    items: Vec<Item>,
}

impl WorkingSet {
    /// Build a working set, rejecting repeated ids
    pub fn new(items: Vec<Item>) -> Result<Self, CurateError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.id()) {
                return Err(CurateError::DuplicateItem {
                    id: item.id().to_string(),
                });
            }
        }
        Ok(Self { items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Surviving items in order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Surviving ids in order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(Item::id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Keep the items whose flag is set, preserving order.
    ///
    /// `keep` must have exactly one flag per item.
    pub(crate) fn retain_flagged(&self, keep: &[bool]) -> Self {
        debug_assert_eq!(keep.len(), self.items.len());
        let items = self
            .items
            .iter()
            .zip(keep)
            .filter_map(|(item, &keep)| keep.then(|| item.clone()))
            .collect();
        Self { items }
    }

    /// True if every id here also appears in `other`, in the same relative order
    pub fn is_ordered_subset_of(&self, other: &WorkingSet) -> bool {
        let mut remaining = other.ids();
        self.ids().all(|id| remaining.any(|candidate| candidate == id))
    }
}

/// Result of discovering the input collection
#[derive(Debug)]
pub struct Discovery {
    /// Discovered items, sorted by id
    pub items: Vec<Item>,
    /// Entries that could not be read (non-fatal)
    pub errors: Vec<ScanError>,
}

/// Trait for input collections
///
/// Implement this trait to feed items from somewhere other than a directory.
pub trait ItemSource: Send + Sync {
    /// Enumerate the collection under `root`
    fn discover(&self, root: &Path) -> Result<Discovery, ScanError> {
        self.discover_with_events(root, &crate::events::null_sender())
    }

    /// Enumerate with progress reporting via events
    fn discover_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<Discovery, ScanError>;
}
