//! Drop images that look like advertisements rather than candid photos.

use super::classifier::{classify_item, load_oracle};
use super::{Decision, ErrorPolicy, Stage, StageKind};
use crate::core::config::StageOptions;
use crate::core::item::Item;
use crate::core::oracle::{AdPrompts, AdvertisementScorer, OracleProvider};
use crate::error::StageError;
use std::sync::Arc;

/// Prompt-similarity stage backed by an [`AdvertisementScorer`]
pub struct AdvertisementFilter {
    name: String,
    options: StageOptions,
    provider: Arc<dyn OracleProvider>,
    state: Option<Ready>,
}

struct Ready {
    scorer: Box<dyn AdvertisementScorer>,
    prompts: AdPrompts,
    policy: ErrorPolicy,
}

impl AdvertisementFilter {
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

impl Stage for AdvertisementFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StageKind {
        StageKind::Advertisement
    }

    fn setup(&mut self, _items: &[Item]) -> Result<(), StageError> {
        let defaults = AdPrompts::default();
        let prompts = AdPrompts {
            ad: self
                .options
                .str("ad_prompt")?
                .map_or(defaults.ad, str::to_string),
            natural: self
                .options
                .str("natural_prompt")?
                .map_or(defaults.natural, str::to_string),
        };
        let policy = self.options.error_policy(ErrorPolicy::FailOpen)?;
        let scorer = load_oracle(&self.options, |model| {
            self.provider.advertisement_scorer(model)
        })?;

        self.state = Some(Ready {
            scorer,
            prompts,
            policy,
        });
        Ok(())
    }

    fn decide(&self, item: &Item) -> Result<Decision, StageError> {
        let ready = self.state.as_ref().ok_or(StageError::NotReady)?;

        Ok(classify_item(&self.name, item, ready.policy, |image| {
            let scores = ready.scorer.score(item, image, &ready.prompts)?;
            if scores.ad > scores.natural {
                Ok(Decision::drop("advertisement"))
            } else {
                Ok(Decision::keep())
            }
        }))
    }
}
