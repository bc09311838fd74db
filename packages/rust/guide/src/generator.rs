//! Guide generation with bounded retries.

use tracing::{debug, error, info, instrument, warn};

use questguide_shared::{GeneratorConfig, Guide, Quest};

use crate::model::TextModel;
use crate::prompt::PromptBuilder;
use crate::segment::segment;

/// Turns a quest into a segmented [`Guide`] using a [`TextModel`].
pub struct GuideGenerator<M> {
    model: M,
    prompts: PromptBuilder,
    config: GeneratorConfig,
}

impl<M: TextModel> GuideGenerator<M> {
    pub fn new(model: M, config: GeneratorConfig) -> Self {
        Self {
            model,
            prompts: PromptBuilder::default(),
            config,
        }
    }

    /// Replace the prompt builder, e.g. to register extra special categories.
    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Generate a guide for `quest`.
    ///
    /// Attempts run strictly one after another, separated by the configured
    /// delay. Returns `None` once every attempt has failed; callers fall back
    /// to showing the quest without a guide.
    #[instrument(skip_all, fields(quest_id = %quest.id, model = self.model.name()))]
    pub async fn generate(&self, quest: &Quest) -> Option<Guide> {
        let prompt = self.prompts.build(quest);
        let max_attempts = self.config.max_attempts.max(1);
        debug!(prompt_chars = prompt.len(), max_attempts, "generating guide");

        for attempt in 1..=max_attempts {
            match self.model.complete(&prompt).await {
                Ok(text) => {
                    let segmentation = segment(&text, &quest.objectives);
                    info!(
                        attempt,
                        objectives = segmentation.guide.objectives.len(),
                        "guide generated"
                    );
                    return Some(segmentation.guide);
                }
                Err(e) => {
                    warn!(attempt, max_attempts, error = %e, "guide generation attempt failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        error!(attempts = max_attempts, "guide generation failed, no guide available");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use questguide_shared::{Objective, QuestGuideError, Result, Rewards};
    use tokio::time::Instant;

    /// Fails the first `failures` calls, then answers with `reply`.
    struct ScriptedModel {
        failures: usize,
        reply: String,
        calls: AtomicUsize,
        call_times: Mutex<Vec<Instant>>,
    }

    impl ScriptedModel {
        fn new(failures: usize, reply: &str) -> Self {
            Self {
                failures,
                reply: reply.into(),
                calls: AtomicUsize::new(0),
                call_times: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextModel for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.call_times.lock().unwrap().push(Instant::now());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(QuestGuideError::Model("service unavailable".into()))
            } else {
                Ok(self.reply.clone())
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn quest() -> Quest {
        Quest {
            id: "q1".into(),
            name: "Checking".into(),
            trader: "Prapor".into(),
            location: None,
            min_player_level: None,
            objectives: vec![Objective {
                id: "o1".into(),
                kind: "visit".into(),
                description: "Reach the bunker".into(),
                optional: false,
                marker_item: None,
                items: vec![],
                count: None,
                found_in_raid: false,
            }],
            prerequisite_quests: vec![],
            trader_requirements: vec![],
            rewards: Rewards::default(),
            wiki_link: None,
            image_link: None,
            kappa_required: false,
            lightkeeper_required: false,
        }
    }

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            max_attempts: 2,
            retry_delay: Duration::from_millis(1000),
        }
    }

    const REPLY: &str = "## Overview\nEasy.\n\n### Objective 1: Reach the bunker\nTake the east gate.";

    #[tokio::test(start_paused = true)]
    async fn persistent_failure_gives_up_after_two_spaced_attempts() {
        let generator = GuideGenerator::new(ScriptedModel::new(usize::MAX, REPLY), config());

        let guide = generator.generate(&quest()).await;

        assert!(guide.is_none());
        let model = generator.model();
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        let times = model.call_times.lock().unwrap();
        assert_eq!(times[1] - times[0], Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_second_attempt() {
        let generator = GuideGenerator::new(ScriptedModel::new(1, REPLY), config());

        let guide = generator.generate(&quest()).await.unwrap();

        assert_eq!(generator.model().calls.load(Ordering::SeqCst), 2);
        assert_eq!(guide.overview, "Easy.");
        assert_eq!(guide.objectives, vec!["Take the east gate."]);
        assert_eq!(guide.raw, REPLY);
    }

    #[tokio::test]
    async fn first_success_makes_one_call() {
        let generator = GuideGenerator::new(ScriptedModel::new(0, REPLY), config());
        assert!(generator.generate(&quest()).await.is_some());
        assert_eq!(generator.model().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let generator = GuideGenerator::new(
            ScriptedModel::new(0, REPLY),
            GeneratorConfig {
                max_attempts: 0,
                retry_delay: Duration::ZERO,
            },
        );
        assert!(generator.generate(&quest()).await.is_some());
    }
}
