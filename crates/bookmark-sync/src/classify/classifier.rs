//! Cascade driver used by the sync flow.

use std::sync::Arc;

use ai::AIProvider;
use anyhow::Result;

use super::cache::ClassificationCache;
use super::cascade::{
    CacheTier, ClassificationCascade, ClassificationTier, GenerationSettings, GenerativeTier,
    RuleTier,
};
use super::prompts::PromptManager;
use super::result::ClassificationResult;
use super::rules::RuleClassifier;
use crate::content::ContentRecord;

/// Classifies records through cache, AI and keyword rules.
///
/// [`AiClassifier::classify`] never fails. The cache is shared with the
/// generative tier, which is the only tier that writes to it.
pub struct AiClassifier {
    cache: Arc<ClassificationCache>,
    cascade: ClassificationCascade,
}

impl AiClassifier {
    /// Build the standard cache, AI, rules chain.
    ///
    /// `provider` may be `None`, in which case the AI tier always defers to
    /// the keyword rules.
    pub fn new(
        provider: Option<Arc<dyn AIProvider>>,
        rules: RuleClassifier,
        settings: GenerationSettings,
        cache: Arc<ClassificationCache>,
    ) -> Result<Self> {
        let prompts = PromptManager::new()?;
        let tiers: Vec<Arc<dyn ClassificationTier>> = vec![
            Arc::new(CacheTier::new(Arc::clone(&cache))),
            Arc::new(GenerativeTier::new(
                provider,
                prompts,
                settings,
                Arc::clone(&cache),
            )),
            Arc::new(RuleTier::new(rules)),
        ];

        Ok(Self {
            cache,
            cascade: ClassificationCascade::new(tiers),
        })
    }

    /// Wrap a custom cascade.
    pub fn with_cascade(cascade: ClassificationCascade, cache: Arc<ClassificationCache>) -> Self {
        Self { cache, cascade }
    }

    /// Classify a record against the store's current categories.
    pub async fn classify(
        &self,
        record: &ContentRecord,
        existing_categories: &[String],
    ) -> ClassificationResult {
        self.cascade.run(record, existing_categories).await
    }

    pub fn cache(&self) -> &Arc<ClassificationCache> {
        &self.cache
    }

    pub fn cascade(&self) -> &ClassificationCascade {
        &self.cascade
    }
}
