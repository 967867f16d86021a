//! # Oracle Module
//!
//! Interfaces to the external classifiers that classifier stages wrap.
//!
//! Oracles return rich signals (detections, keypoints, faces, prompt
//! scores). Those signals stay inside the stage that asked for them; only
//! the resulting keep/drop decision leaves the stage.
//!
//! ## Providers
//! Stages do not construct oracles themselves. During `setup` they ask an
//! [`OracleProvider`] for an oracle bound to the configured model
//! reference. A provider that cannot supply one makes setup fail, which
//! aborts the run.

mod annotations;

pub use annotations::{AnnotationProvider, AnnotationStore, ItemAnnotation};

use crate::core::item::Item;
use crate::error::OracleError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// One object found by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// COCO class id (0 = person)
    pub class_id: u64,
    pub confidence: f64,
}

/// Keypoint confidences for one detected person, in COCO-17 order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonPose {
    pub keypoint_confidences: Vec<f64>,
}

/// One detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    /// Estimated age in years
    pub age: f64,
    /// Bounding box area in pixels, used to pick the dominant face
    pub bbox_area: f64,
}

/// Text prompts an advertisement scorer compares an image against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdPrompts {
    pub ad: String,
    pub natural: String,
}

impl Default for AdPrompts {
    fn default() -> Self {
        Self {
            ad: "a promotional advertisement or marketing image".to_string(),
            natural: "a candid photo of a person".to_string(),
        }
    }
}

/// Similarity of an image to each prompt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdScores {
    pub ad: f64,
    pub natural: f64,
}

/// Finds objects in an image
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, item: &Item, image: &DynamicImage) -> Result<Vec<Detection>, OracleError>;
}

/// Estimates body keypoints for each person in an image
pub trait PoseEstimator: Send + Sync {
    fn estimate(&self, item: &Item, image: &DynamicImage) -> Result<Vec<PersonPose>, OracleError>;
}

/// Detects faces and estimates their age
pub trait AgeEstimator: Send + Sync {
    fn estimate(&self, item: &Item, image: &DynamicImage) -> Result<Vec<Face>, OracleError>;
}

/// Scores an image against advertisement and natural-photo prompts
pub trait AdvertisementScorer: Send + Sync {
    fn score(
        &self,
        item: &Item,
        image: &DynamicImage,
        prompts: &AdPrompts,
    ) -> Result<AdScores, OracleError>;
}

/// Builds oracles from a model reference.
///
/// Every method defaults to [`OracleError::Unavailable`], so a provider only
/// implements the oracles it actually has a backend for.
pub trait OracleProvider: Send + Sync {
    fn object_detector(&self, model: &str) -> Result<Box<dyn ObjectDetector>, OracleError> {
        let _ = model;
        Err(unavailable("object detector"))
    }

    fn pose_estimator(&self, model: &str) -> Result<Box<dyn PoseEstimator>, OracleError> {
        let _ = model;
        Err(unavailable("pose estimator"))
    }

    fn age_estimator(&self, model: &str) -> Result<Box<dyn AgeEstimator>, OracleError> {
        let _ = model;
        Err(unavailable("age estimator"))
    }

    fn advertisement_scorer(
        &self,
        model: &str,
    ) -> Result<Box<dyn AdvertisementScorer>, OracleError> {
        let _ = model;
        Err(unavailable("advertisement scorer"))
    }
}

fn unavailable(kind: &str) -> OracleError {
    OracleError::Unavailable {
        kind: kind.to_string(),
    }
}

/// A provider with no backends at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOracles;

impl OracleProvider for NoOracles {}
