//! Ordered classification tiers.
//!
//! Each tier either produces a result or reports a [`TierFailure`], and the
//! cascade moves on to the next tier. When every tier fails the cascade
//! returns [`ClassificationResult::fallback`].

use std::sync::Arc;
use std::time::Duration;

use ai::{parse_ai_response, AIMessage, AIProvider, AiError, GenerateOptions};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cache::{fingerprint, ClassificationCache};
use super::prompts::PromptManager;
use super::result::ClassificationResult;
use super::rules::RuleClassifier;
use crate::content::ContentRecord;

/// Why a tier produced no result.
#[derive(Debug, Error)]
pub enum TierFailure {
    #[error("no fresh cache entry")]
    CacheMiss,

    #[error("AI provider not configured")]
    ProviderUnavailable,

    #[error("failed to render prompt: {0}")]
    Prompt(String),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("AI request timed out after {0:?}")]
    Timeout(Duration),

    #[error("no keyword matched")]
    NoMatch,
}

/// Input shared by every tier for one classification.
pub struct ClassifyRequest<'a> {
    pub record: &'a ContentRecord,
    pub existing_categories: &'a [String],
    /// Fingerprint of the record text, computed once per request.
    pub fingerprint: String,
}

impl<'a> ClassifyRequest<'a> {
    pub fn new(record: &'a ContentRecord, existing_categories: &'a [String]) -> Self {
        Self {
            record,
            existing_categories,
            fingerprint: fingerprint(&record.text),
        }
    }
}

/// One stage of the classification chain.
#[async_trait]
pub trait ClassificationTier: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Try to classify the request.
    async fn attempt(
        &self,
        request: &ClassifyRequest<'_>,
    ) -> Result<ClassificationResult, TierFailure>;
}

/// Serves fresh entries from the classification cache.
pub struct CacheTier {
    cache: Arc<ClassificationCache>,
}

impl CacheTier {
    pub fn new(cache: Arc<ClassificationCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ClassificationTier for CacheTier {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn attempt(
        &self,
        request: &ClassifyRequest<'_>,
    ) -> Result<ClassificationResult, TierFailure> {
        self.cache
            .get(&request.fingerprint)
            .ok_or(TierFailure::CacheMiss)
    }
}

/// Generation settings for the AI tier.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: ai::gemini::default_model().to_string(),
            temperature: 0.3,
            max_output_tokens: 1000,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Asks a generative model and caches what it answers.
pub struct GenerativeTier {
    provider: Option<Arc<dyn AIProvider>>,
    prompts: PromptManager,
    settings: GenerationSettings,
    cache: Arc<ClassificationCache>,
}

impl GenerativeTier {
    pub fn new(
        provider: Option<Arc<dyn AIProvider>>,
        prompts: PromptManager,
        settings: GenerationSettings,
        cache: Arc<ClassificationCache>,
    ) -> Self {
        Self {
            provider,
            prompts,
            settings,
            cache,
        }
    }
}

#[async_trait]
impl ClassificationTier for GenerativeTier {
    fn name(&self) -> &'static str {
        "ai"
    }

    async fn attempt(
        &self,
        request: &ClassifyRequest<'_>,
    ) -> Result<ClassificationResult, TierFailure> {
        let provider = self
            .provider
            .as_ref()
            .filter(|p| p.is_configured())
            .ok_or(TierFailure::ProviderUnavailable)?;

        let instructions = self
            .prompts
            .classification_instructions()
            .map_err(|e| TierFailure::Prompt(e.to_string()))?;
        let prompt = self
            .prompts
            .classification_prompt(request.record, request.existing_categories)
            .map_err(|e| TierFailure::Prompt(e.to_string()))?;

        let options = GenerateOptions {
            temperature: Some(self.settings.temperature),
            max_tokens: Some(self.settings.max_output_tokens),
            json_mode: true,
            ..Default::default()
        };
        let messages = [AIMessage::system(instructions), AIMessage::user(prompt)];

        let response = tokio::time::timeout(
            self.settings.timeout,
            provider.generate_text(&self.settings.model, &messages, &options),
        )
        .await
        .map_err(|_| TierFailure::Timeout(self.settings.timeout))??;

        debug!(
            provider = provider.name(),
            output_tokens = response.usage.output_tokens,
            "AI classification response received"
        );

        let result = parse_ai_response::<ClassificationResult>(&response)?.normalized();
        self.cache.put(request.fingerprint.clone(), result.clone());
        Ok(result)
    }
}

/// Keyword scoring; never cached.
pub struct RuleTier {
    rules: RuleClassifier,
}

impl RuleTier {
    pub fn new(rules: RuleClassifier) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl ClassificationTier for RuleTier {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn attempt(
        &self,
        request: &ClassifyRequest<'_>,
    ) -> Result<ClassificationResult, TierFailure> {
        let result = self
            .rules
            .classify(request.record, request.existing_categories);
        if result.is_match() {
            Ok(result)
        } else {
            Err(TierFailure::NoMatch)
        }
    }
}

/// Tiers evaluated in order until one succeeds.
#[derive(Default)]
pub struct ClassificationCascade {
    tiers: Vec<Arc<dyn ClassificationTier>>,
}

impl ClassificationCascade {
    pub fn new(tiers: Vec<Arc<dyn ClassificationTier>>) -> Self {
        Self { tiers }
    }

    /// Append a tier after the existing ones.
    pub fn push(&mut self, tier: Arc<dyn ClassificationTier>) {
        self.tiers.push(tier);
    }

    /// Insert a tier at `index`, shifting later tiers back.
    pub fn insert(&mut self, index: usize, tier: Arc<dyn ClassificationTier>) {
        self.tiers.insert(index, tier);
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Run the tiers in order. Always returns a result.
    pub async fn run(
        &self,
        record: &ContentRecord,
        existing_categories: &[String],
    ) -> ClassificationResult {
        let request = ClassifyRequest::new(record, existing_categories);

        for tier in &self.tiers {
            match tier.attempt(&request).await {
                Ok(result) => {
                    info!(
                        tier = tier.name(),
                        category = result.category.as_deref().unwrap_or("-"),
                        confidence = result.confidence,
                        "Classified record"
                    );
                    return result;
                }
                Err(TierFailure::CacheMiss | TierFailure::NoMatch) => {
                    debug!(tier = tier.name(), "Tier produced no result");
                }
                Err(failure) => {
                    warn!(tier = tier.name(), error = %failure, "Classification tier failed");
                }
            }
        }

        warn!(url = %record.url, "All classification tiers failed, using default category");
        ClassificationResult::fallback(&record.text)
    }
}
