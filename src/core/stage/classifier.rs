//! Shared plumbing for stages that wrap a per-item classifier.

use super::{Decision, ErrorPolicy};
use crate::core::config::StageOptions;
use crate::core::item::Item;
use crate::error::{ItemError, OracleError, StageError};
use image::DynamicImage;

/// Option key naming the model reference handed to the oracle provider
pub(super) const MODEL_KEY: &str = "model";

/// Decode an item's content
pub(super) fn load_image(item: &Item) -> Result<DynamicImage, ItemError> {
    image::open(item.path()).map_err(|e| ItemError::Unreadable {
        path: item.path().to_path_buf(),
        reason: e.to_string(),
    })
}

/// Decode the item, run `classify`, and resolve any failure through `policy`
pub(super) fn classify_item<F>(
    stage: &str,
    item: &Item,
    policy: ErrorPolicy,
    classify: F,
) -> Decision
where
    F: FnOnce(&DynamicImage) -> Result<Decision, OracleError>,
{
    let outcome = load_image(item).and_then(|image| {
        classify(&image).map_err(|source| ItemError::Classifier {
            id: item.id().to_string(),
            source,
        })
    });

    match outcome {
        Ok(decision) => {
            tracing::trace!(stage, id = item.id(), keep = decision.keep, "decided");
            decision
        }
        Err(error) => policy.resolve(stage, error),
    }
}

/// Read the model reference and build the oracle, mapping failures to a fatal load error
pub(super) fn load_oracle<T>(
    options: &StageOptions,
    build: impl FnOnce(&str) -> Result<T, OracleError>,
) -> Result<T, StageError> {
    let model = options.require_str(MODEL_KEY)?;
    build(model).map_err(|e| StageError::ResourceLoad {
        resource: model.to_string(),
        reason: e.to_string(),
    })
}
