//! Content classification.
//!
//! Records are classified by a chain of tiers: a fingerprint cache, a
//! generative model, and keyword rules, with a fixed default when all of
//! them fail.

mod cache;
mod cascade;
mod classifier;
mod prompts;
mod result;
mod rules;

pub use cache::{fingerprint, ClassificationCache, CACHE_TTL_DAYS, FINGERPRINT_PREFIX_CHARS};
pub use cascade::{
    CacheTier, ClassificationCascade, ClassificationTier, ClassifyRequest, GenerationSettings,
    GenerativeTier, RuleTier, TierFailure,
};
pub use classifier::AiClassifier;
pub use prompts::PromptManager;
pub use result::{
    ClassificationResult, DEFAULT_CATEGORY, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS,
};
pub use rules::{default_rules, KeywordRule, RuleClassifier};
