//! Keep images where the subject's head and legs are both visible.

use super::classifier::{classify_item, load_oracle};
use super::{Decision, ErrorPolicy, Stage, StageKind};
use crate::core::config::StageOptions;
use crate::core::item::Item;
use crate::core::oracle::{OracleProvider, PersonPose, PoseEstimator};
use crate::error::StageError;
use std::sync::Arc;

// COCO-17 keypoint indices
const NOSE: usize = 0;
const LEFT_KNEE: usize = 13;
const RIGHT_KNEE: usize = 14;
const LEFT_ANKLE: usize = 15;
const RIGHT_ANKLE: usize = 16;

/// Pose-visibility stage backed by a [`PoseEstimator`]
pub struct FullBodyFilter {
    name: String,
    options: StageOptions,
    provider: Arc<dyn OracleProvider>,
    state: Option<Ready>,
}

struct Ready {
    estimator: Box<dyn PoseEstimator>,
    keypoint_threshold: f64,
    policy: ErrorPolicy,
}

impl FullBodyFilter {
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

/// Head (nose) plus at least one knee or ankle above the threshold.
///
/// Keypoints the estimator did not report count as invisible.
fn is_full_body(pose: &PersonPose, threshold: f64) -> bool {
    let visible = |index: usize| {
        pose.keypoint_confidences
            .get(index)
            .is_some_and(|&confidence| confidence > threshold)
    };

    let has_head = visible(NOSE);
    let has_legs = [LEFT_KNEE, RIGHT_KNEE, LEFT_ANKLE, RIGHT_ANKLE]
        .into_iter()
        .any(visible);

    has_head && has_legs
}

impl Stage for FullBodyFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::FullBody
    }

    fn setup(&mut self, _items: &[Item]) -> Result<(), StageError> {
        let keypoint_threshold = self.options.require_f64("keypoint_threshold")?;
        let policy = self.options.error_policy(ErrorPolicy::FailOpen)?;
        let estimator = load_oracle(&self.options, |model| self.provider.pose_estimator(model))?;

        self.state = Some(Ready {
            estimator,
            keypoint_threshold,
            policy,
        });
        Ok(())
    }

    fn decide(&self, item: &Item) -> Result<Decision, StageError> {
        let ready = self.state.as_ref().ok_or(StageError::NotReady)?;

        Ok(classify_item(&self.name, item, ready.policy, |image| {
            let poses = ready.estimator.estimate(item, image)?;
            // Only the first (most prominent) person is considered
            match poses.first() {
                None => Ok(Decision::drop("no person pose detected")),
                Some(pose) if is_full_body(pose, ready.keypoint_threshold) => Ok(Decision::keep()),
                Some(_) => Ok(Decision::drop("full body not visible")),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::classifier::test_support::png_item;
    use super::*;
    use crate::error::OracleError;
    use image::DynamicImage;
    use tempfile::TempDir;

    fn pose(visible: &[usize]) -> PersonPose {
        let mut keypoint_confidences = vec![0.1; 17];
        for &index in visible {
            keypoint_confidences[index] = 0.9;
        }
        PersonPose {
            keypoint_confidences,
        }
    }

    #[test]
    fn head_and_one_ankle_is_full_body() {
        assert!(is_full_body(&pose(&[NOSE, RIGHT_ANKLE]), 0.5));
        assert!(is_full_body(&pose(&[NOSE, LEFT_KNEE]), 0.5));
    }

    #[test]
    fn missing_head_or_legs_is_not_full_body() {
        assert!(!is_full_body(&pose(&[LEFT_KNEE, RIGHT_ANKLE]), 0.5));
        assert!(!is_full_body(&pose(&[NOSE]), 0.5));
    }

    #[test]
    fn threshold_is_strict() {
        let mut exact = pose(&[]);
        exact.keypoint_confidences[NOSE] = 0.5;
        exact.keypoint_confidences[LEFT_ANKLE] = 0.5;
        assert!(!is_full_body(&exact, 0.5));
    }

    #[test]
    fn truncated_keypoints_count_as_invisible() {
        let short = PersonPose {
            keypoint_confidences: vec![0.9; 5],
        };
        assert!(!is_full_body(&short, 0.5));
    }

    struct Estimator;

    impl PoseEstimator for Estimator {
        fn estimate(&self, item: &Item, _image: &DynamicImage) -> Result<Vec<PersonPose>, OracleError> {
            match item.id() {
                "standing.png" => Ok(vec![pose(&[NOSE, LEFT_ANKLE]), pose(&[])]),
                "portrait.png" => Ok(vec![pose(&[NOSE])]),
                _ => Ok(vec![]),
            }
        }
    }

    struct Provider;

    impl OracleProvider for Provider {
        fn pose_estimator(&self, _model: &str) -> Result<Box<dyn PoseEstimator>, OracleError> {
            Ok(Box::new(Estimator))
        }
    }

    #[test]
    fn decides_on_first_person() {
        let dir = TempDir::new().unwrap();
        let options = StageOptions::new()
            .with("model", "yolov8n-pose")
            .with("keypoint_threshold", 0.5);
        let mut stage = FullBodyFilter::new("full_body", options, Arc::new(Provider));
        stage.setup(&[]).unwrap();

        assert!(stage.decide(&png_item(dir.path(), "standing.png")).unwrap().keep);
        assert!(!stage.decide(&png_item(dir.path(), "portrait.png")).unwrap().keep);
        assert!(!stage.decide(&png_item(dir.path(), "empty.png")).unwrap().keep);
    }

    #[test]
    fn unavailable_estimator_fails_setup() {
        let options = StageOptions::new()
            .with("model", "yolov8n-pose")
            .with("keypoint_threshold", 0.5);
        let mut stage =
            FullBodyFilter::new("full_body", options, Arc::new(crate::core::oracle::NoOracles));

        assert!(matches!(
            stage.setup(&[]),
            Err(StageError::ResourceLoad { .. })
        ));
    }
}
