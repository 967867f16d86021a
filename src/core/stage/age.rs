//! Keep images whose dominant face meets a minimum estimated age.

use super::classifier::{classify_item, load_oracle};
use super::{Decision, ErrorPolicy, Stage, StageKind};
use crate::core::config::StageOptions;
use crate::core::item::Item;
use crate::core::oracle::{AgeEstimator, Face, OracleProvider};
use crate::error::StageError;
use std::sync::Arc;

/// Age-threshold stage backed by an [`AgeEstimator`]
pub struct AgeFilter {
    name: String,
    options: StageOptions,
    provider: Arc<dyn OracleProvider>,
    state: Option<Ready>,
}

struct Ready {
    estimator: Box<dyn AgeEstimator>,
    min_age: f64,
    policy: ErrorPolicy,
}

impl AgeFilter {
    pub fn new(
        name: impl Into<String>,
        options: StageOptions,
        provider: Arc<dyn OracleProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            provider,
            state: None,
        }
    }
}

/// The face with the largest bounding box; the earliest one wins a tie
fn dominant_face(faces: &[Face]) -> Option<&Face> {
    faces
        .iter()
        .reduce(|best, face| if face.bbox_area > best.bbox_area { face } else { best })
}

impl Stage for AgeFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Age
    }

    fn setup(&mut self, _items: &[Item]) -> Result<(), StageError> {
        let min_age = self.options.require_f64("min_age")?;
        let policy = self.options.error_policy(ErrorPolicy::FailOpen)?;
        let estimator = load_oracle(&self.options, |model| self.provider.age_estimator(model))?;

        self.state = Some(Ready {
            estimator,
            min_age,
            policy,
        });
        Ok(())
    }

    fn decide(&self, item: &Item) -> Result<Decision, StageError> {
        let ready = self.state.as_ref().ok_or(StageError::NotReady)?;

        Ok(classify_item(&self.name, item, ready.policy, |image| {
            let faces = ready.estimator.estimate(item, image)?;
            let decision = match dominant_face(&faces) {
                None => Decision::drop("no face detected"),
                Some(face) if face.age >= ready.min_age => Decision::keep(),
                Some(face) => Decision::drop(format!(
                    "estimated age {:.0} below {:.0}",
                    face.age, ready.min_age
                )),
            };
            Ok(decision)
        }))
    }
}
