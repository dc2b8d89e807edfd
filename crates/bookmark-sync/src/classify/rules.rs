//! Keyword rule classifier.
//!
//! Deterministic fallback used when the generative tier is unavailable.

use serde::{Deserialize, Serialize};

use super::result::{ClassificationResult, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::content::{truncate_chars, ContentRecord};

/// Score needed to reach full keyword confidence before the cap.
const SCORE_SCALE: f32 = 3.0;

/// Upper bound on keyword confidence.
const MAX_CONFIDENCE: f32 = 0.9;

/// Points for a keyword found in the text.
const TEXT_MATCH_POINTS: u32 = 1;

/// Points for a keyword equal to a hashtag.
const HASHTAG_MATCH_POINTS: u32 = 2;

/// Keywords that vote for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new<I, S>(category: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category: category.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Score lower-cased text and hashtags against this rule.
    fn score(&self, text: &str, hashtags: &[String]) -> u32 {
        self.keywords
            .iter()
            .map(|keyword| keyword.to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .map(|keyword| {
                let mut points = 0;
                if text.contains(&keyword) {
                    points += TEXT_MATCH_POINTS;
                }
                if hashtags.iter().any(|tag| *tag == keyword) {
                    points += HASHTAG_MATCH_POINTS;
                }
                points
            })
            .sum()
    }
}

/// Built-in keyword tables in declaration order.
pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(
            "Tech",
            [
                "code",
                "programming",
                "javascript",
                "python",
                "react",
                "ai",
                "ml",
                "developer",
                "coding",
                "github",
                "api",
                "software",
                "编程",
                "代码",
                "开发",
                "算法",
                "数据",
            ],
        ),
        KeywordRule::new(
            "Design",
            [
                "design",
                "ui",
                "ux",
                "figma",
                "css",
                "typography",
                "layout",
                "设计",
                "界面",
                "交互",
                "视觉",
                "配色",
            ],
        ),
        KeywordRule::new(
            "News",
            [
                "breaking",
                "news",
                "report",
                "announcement",
                "新闻",
                "报道",
                "消息",
                "快讯",
            ],
        ),
        KeywordRule::new(
            "Learning",
            [
                "learn",
                "tutorial",
                "course",
                "education",
                "study",
                "学习",
                "教程",
                "课程",
                "教育",
            ],
        ),
        KeywordRule::new(
            "Tools",
            [
                "tool",
                "app",
                "software",
                "plugin",
                "extension",
                "工具",
                "应用",
                "插件",
                "扩展",
            ],
        ),
        KeywordRule::new(
            "Thoughts",
            [
                "thought",
                "opinion",
                "idea",
                "philosophy",
                "思考",
                "想法",
                "观点",
                "哲学",
                "感悟",
            ],
        ),
    ]
}

/// Scores records against keyword tables.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    rules: Vec<KeywordRule>,
}

impl RuleClassifier {
    /// Classifier over the built-in tables.
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Classifier over exactly `rules`.
    pub fn with_rules(rules: Vec<KeywordRule>) -> Self {
        Self { rules }
    }

    /// Built-in tables merged with `overrides`.
    pub fn with_overrides(overrides: &[KeywordRule]) -> Self {
        let mut classifier = Self::new();
        classifier.merge(overrides);
        classifier
    }

    /// Merge `overrides` by category key.
    ///
    /// A known category has its keywords replaced in place; an unknown one
    /// is appended after the existing tables.
    pub fn merge(&mut self, overrides: &[KeywordRule]) {
        for rule in overrides {
            match self.rules.iter_mut().find(|r| r.category == rule.category) {
                Some(existing) => existing.keywords.clone_from(&rule.keywords),
                None => self.rules.push(rule.clone()),
            }
        }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Pick the best-scoring category.
    ///
    /// A non-empty `existing_categories` restricts the candidates. Returns
    /// [`ClassificationResult::unmatched`] when nothing scores.
    pub fn classify(
        &self,
        record: &ContentRecord,
        existing_categories: &[String],
    ) -> ClassificationResult {
        let text = record.text.to_lowercase();
        let hashtags: Vec<String> = record.hashtags.iter().map(|h| h.to_lowercase()).collect();

        let mut best: Option<(&KeywordRule, u32)> = None;
        for rule in &self.rules {
            if !existing_categories.is_empty() && !existing_categories.contains(&rule.category) {
                continue;
            }
            let score = rule.score(&text, &hashtags);
            // Strictly greater keeps the first-declared category on ties.
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((rule, score));
            }
        }

        match best {
            Some((rule, score)) if score > 0 => {
                let trimmed = record.text.trim();
                ClassificationResult {
                    category: Some(rule.category.clone()),
                    title: truncate_chars(trimmed, TITLE_MAX_CHARS).to_string(),
                    summary: truncate_chars(trimmed, SUMMARY_MAX_CHARS).to_string(),
                    is_new: false,
                    confidence: (score as f32 / SCORE_SCALE).min(MAX_CONFIDENCE),
                    reason: format!("Keyword match ({score})"),
                }
            }
            _ => ClassificationResult::unmatched(),
        }
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new()
    }
}
