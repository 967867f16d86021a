//! Oracles backed by precomputed annotations.
//!
//! Model inference often happens in a separate process (a GPU box, a batch
//! job). Its output can be exported as JSON keyed by item id and replayed
//! here, which keeps curation runs reproducible:
//!
//! ```json
//! {
//!   "crop (1).png": {
//!     "detections": [{ "class_id": 0, "confidence": 0.91 }],
//!     "poses": [{ "keypoint_confidences": [0.9, 0.8, ...] }],
//!     "faces": [{ "age": 27.0, "bbox_area": 5120.0 }],
//!     "ad_scores": { "ad": 0.21, "natural": 0.27 }
//!   }
//! }
//! ```
//!
//! The model reference configured for a stage is the path of the file.
//! An item without an entry, or an entry without the signal a stage needs,
//! is an oracle error for that item.

use super::{
    AdPrompts, AdScores, AdvertisementScorer, AgeEstimator, Detection, Face, ObjectDetector,
    OracleProvider, PersonPose, PoseEstimator,
};
use crate::core::item::Item;
use crate::error::OracleError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Recorded oracle output for one item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemAnnotation {
    #[serde(default)]
    pub detections: Option<Vec<Detection>>,
    #[serde(default)]
    pub poses: Option<Vec<PersonPose>>,
    #[serde(default)]
    pub faces: Option<Vec<Face>>,
    #[serde(default)]
    pub ad_scores: Option<AdScores>,
}

/// Annotations for a whole collection, keyed by item id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationStore {
    entries: HashMap<String, ItemAnnotation>,
}

impl AnnotationStore {
    /// Load a store from a JSON file
    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OracleError::Failed(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| OracleError::Failed(format!("{}: {}", path.display(), e)))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn signal<T: Clone>(
        &self,
        item: &Item,
        pick: impl FnOnce(&ItemAnnotation) -> Option<&T>,
    ) -> Result<T, OracleError> {
        self.entries
            .get(item.id())
            .and_then(pick)
            .cloned()
            .ok_or_else(|| OracleError::MissingAnnotation {
                id: item.id().to_string(),
            })
    }
}

impl ObjectDetector for AnnotationStore {
    fn detect(&self, item: &Item, _image: &DynamicImage) -> Result<Vec<Detection>, OracleError> {
        self.signal(item, |a| a.detections.as_ref())
    }
}

impl PoseEstimator for AnnotationStore {
    fn estimate(&self, item: &Item, _image: &DynamicImage) -> Result<Vec<PersonPose>, OracleError> {
        self.signal(item, |a| a.poses.as_ref())
    }
}

impl AgeEstimator for AnnotationStore {
    fn estimate(&self, item: &Item, _image: &DynamicImage) -> Result<Vec<Face>, OracleError> {
        self.signal(item, |a| a.faces.as_ref())
    }
}

impl AdvertisementScorer for AnnotationStore {
    // Scores were computed offline against whatever prompts the export used
    fn score(
        &self,
        item: &Item,
        _image: &DynamicImage,
        _prompts: &AdPrompts,
    ) -> Result<AdScores, OracleError> {
        self.signal(item, |a| a.ad_scores.as_ref())
    }
}

/// Provider that resolves every model reference to an annotation file
#[derive(Debug, Clone, Default)]
pub struct AnnotationProvider {
    /// Relative model references are resolved against this directory
    base_dir: Option<PathBuf>,
}

impl AnnotationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative references against `dir` (usually the config file's directory)
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn load(&self, model: &str) -> Result<AnnotationStore, OracleError> {
        let path = Path::new(model);
        let path = match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        };
        let store = AnnotationStore::load(&path)?;
        tracing::debug!(path = %path.display(), entries = store.len(), "loaded annotations");
        Ok(store)
    }
}

impl OracleProvider for AnnotationProvider {
    fn object_detector(&self, model: &str) -> Result<Box<dyn ObjectDetector>, OracleError> {
        Ok(Box::new(self.load(model)?))
    }

    fn pose_estimator(&self, model: &str) -> Result<Box<dyn PoseEstimator>, OracleError> {
        Ok(Box::new(self.load(model)?))
    }

    fn age_estimator(&self, model: &str) -> Result<Box<dyn AgeEstimator>, OracleError> {
        Ok(Box::new(self.load(model)?))
    }

    fn advertisement_scorer(
        &self,
        model: &str,
    ) -> Result<Box<dyn AdvertisementScorer>, OracleError> {
        Ok(Box::new(self.load(model)?))
    }
}
