//! Keep images in which a person is detected.

use super::classifier::{classify_item, load_oracle};
use super::{Decision, ErrorPolicy, Stage, StageKind};
use crate::core::config::StageOptions;
use crate::core::item::Item;
use crate::core::oracle::{Detection, ObjectDetector, OracleProvider};
use crate::error::StageError;
use std::sync::Arc;

/// COCO class id for "person"
const DEFAULT_PERSON_CLASS_ID: u64 = 0;

/// Object-presence stage backed by an [`ObjectDetector`]
pub struct PersonDetector {
    name: String,
    options: StageOptions,
    provider: Arc<dyn OracleProvider>,
    state: Option<Ready>,
}

struct Ready {
    detector: Box<dyn ObjectDetector>,
    confidence_threshold: f64,
    person_class_id: u64,
    policy: ErrorPolicy,
}

impl PersonDetector {
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

/// True if any detection is a person strictly above the confidence threshold
fn contains_person(detections: &[Detection], person_class_id: u64, threshold: f64) -> bool {
    detections
        .iter()
        .any(|d| d.class_id == person_class_id && d.confidence > threshold)
}

impl Stage for PersonDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::PersonDetector
    }

    fn setup(&mut self, _items: &[Item]) -> Result<(), StageError> {
        let confidence_threshold = self.options.require_f64("confidence_threshold")?;
        let person_class_id = self
            .options
            .u64("person_class_id")?
            .unwrap_or(DEFAULT_PERSON_CLASS_ID);
        let policy = self.options.error_policy(ErrorPolicy::FailOpen)?;
        let detector = load_oracle(&self.options, |model| self.provider.object_detector(model))?;

        self.state = Some(Ready {
            detector,
            confidence_threshold,
            person_class_id,
            policy,
        });
        Ok(())
    }

    fn decide(&self, item: &Item) -> Result<Decision, StageError> {
        let ready = self.state.as_ref().ok_or(StageError::NotReady)?;

        Ok(classify_item(&self.name, item, ready.policy, |image| {
            let detections = ready.detector.detect(item, image)?;
            if contains_person(&detections, ready.person_class_id, ready.confidence_threshold) {
                Ok(Decision::keep())
            } else {
                Ok(Decision::drop("no person detected"))
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::classifier::test_support::{corrupt_item, png_item};
    use super::*;
    use crate::error::OracleError;
    use image::DynamicImage;
    use tempfile::TempDir;

    struct FixedDetector;

    impl ObjectDetector for FixedDetector {
        fn detect(&self, item: &Item, _image: &DynamicImage) -> Result<Vec<Detection>, OracleError> {
            match item.id() {
                "person.png" => Ok(vec![Detection { class_id: 0, confidence: 0.8 }]),
                "faint.png" => Ok(vec![Detection { class_id: 0, confidence: 0.2 }]),
                "borderline.png" => Ok(vec![Detection { class_id: 0, confidence: 0.5 }]),
                "dog.png" => Ok(vec![Detection { class_id: 16, confidence: 0.95 }]),
                _ => Err(OracleError::Failed("inference error".to_string())),
            }
        }
    }

    struct Provider;

    impl OracleProvider for Provider {
        fn object_detector(&self, _model: &str) -> Result<Box<dyn ObjectDetector>, OracleError> {
            Ok(Box::new(FixedDetector))
        }
    }

    fn ready_stage() -> PersonDetector {
        let options = StageOptions::new()
            .with("model", "yolov8n")
            .with("confidence_threshold", 0.5);
        let mut stage = PersonDetector::new("person_detector", options, Arc::new(Provider));
        stage.setup(&[]).unwrap();
        stage
    }

    #[test]
    fn keeps_confident_person_detections() {
        let dir = TempDir::new().unwrap();
        let stage = ready_stage();

        assert!(stage.decide(&png_item(dir.path(), "person.png")).unwrap().keep);
        assert!(!stage.decide(&png_item(dir.path(), "faint.png")).unwrap().keep);
        assert!(!stage.decide(&png_item(dir.path(), "dog.png")).unwrap().keep);
    }

    #[test]
    fn confidence_equal_to_threshold_is_not_a_detection() {
        let dir = TempDir::new().unwrap();
        let decision = ready_stage()
            .decide(&png_item(dir.path(), "borderline.png"))
            .unwrap();

        assert!(!decision.keep);
        assert_eq!(decision.reason.as_deref(), Some("no person detected"));
    }

    #[test]
    fn detector_failure_keeps_the_item() {
        let dir = TempDir::new().unwrap();
        let stage = ready_stage();

        let decision = stage.decide(&png_item(dir.path(), "mystery.png")).unwrap();
        assert!(decision.keep);
    }

    #[test]
    fn unreadable_item_is_dropped() {
        let dir = TempDir::new().unwrap();
        let stage = ready_stage();

        assert!(!stage.decide(&corrupt_item(dir.path(), "person.png")).unwrap().keep);
    }

    #[test]
    fn missing_threshold_fails_setup() {
        let options = StageOptions::new().with("model", "yolov8n");
        let mut stage = PersonDetector::new("person_detector", options, Arc::new(Provider));

        assert!(matches!(
            stage.setup(&[]),
            Err(StageError::MissingOption { .. })
        ));
    }

    #[test]
    fn decide_before_setup_is_rejected() {
        let stage = PersonDetector::new("person_detector", StageOptions::new(), Arc::new(Provider));
        let item = Item::new("a.png", "/data/a.png");

        assert!(matches!(stage.decide(&item), Err(StageError::NotReady)));
    }
}
