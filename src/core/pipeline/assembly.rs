//! Turns a [`CurationConfig`] into concrete stages.

use crate::core::config::CurationConfig;
use crate::core::dedupe::DuplicateClusterer;
use crate::core::oracle::OracleProvider;
use crate::core::stage::{AdvertisementFilter, AgeFilter, FullBodyFilter, PersonDetector, Stage, StageKind};
use std::sync::Arc;

/// Build the configured stages in order.
///
/// Each stage receives its own copy of its options; nothing is validated
/// here beyond what the config itself checks. Options are read during setup.
pub fn build_stages(
    config: &CurationConfig,
    provider: Arc<dyn OracleProvider>,
) -> Vec<Box<dyn Stage>> {
    config
        .stages
        .iter()
        .map(|stage| {
            let name = stage.display_name().to_string();
            let options = stage.options.clone();
            let provider = Arc::clone(&provider);

            let built: Box<dyn Stage> = match stage.kind {
                StageKind::Dedupe => Box::new(DuplicateClusterer::new(name, options)),
                StageKind::PersonDetector => Box::new(PersonDetector::new(name, options, provider)),
                StageKind::FullBody => Box::new(FullBodyFilter::new(name, options, provider)),
                StageKind::Age => Box::new(AgeFilter::new(name, options, provider)),
                StageKind::Advertisement => {
                    Box::new(AdvertisementFilter::new(name, options, provider))
                }
            };
            built
        })
        .collect()
}
