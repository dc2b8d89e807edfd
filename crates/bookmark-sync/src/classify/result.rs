//! Classification result type.

use serde::{Deserialize, Serialize};

use crate::content::truncate_chars;

/// Maximum characters in a generated title.
pub const TITLE_MAX_CHARS: usize = 15;

/// Maximum characters in a generated summary.
pub const SUMMARY_MAX_CHARS: usize = 150;

/// Prefix marking a summary produced after every tier failed.
pub const FAILED_SUMMARY_PREFIX: &str = "[AI Failed] ";

/// Category assigned when every tier failed.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Confidence reported with [`DEFAULT_CATEGORY`].
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Outcome of classifying one record.
///
/// Field names match the JSON shape the generative model is asked for, so
/// model output deserializes straight into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Chosen category, absent when nothing matched.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// True when the category is not among the store's existing ones.
    #[serde(default)]
    pub is_new: bool,
    /// Confidence in `[0.0, 1.0]`.
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reason: String,
}

impl ClassificationResult {
    /// Result used when every tier failed.
    ///
    /// Title and summary are cut from `text` with surrounding whitespace
    /// trimmed, so indentation or leading newlines in a captured post do not
    /// count against [`TITLE_MAX_CHARS`]. The summary keeps the marker
    /// prefix and the whole string stays within [`SUMMARY_MAX_CHARS`].
    pub fn fallback(text: &str) -> Self {
        let text = text.trim();
        let body_chars = SUMMARY_MAX_CHARS - FAILED_SUMMARY_PREFIX.chars().count();

        Self {
            category: Some(DEFAULT_CATEGORY.to_string()),
            title: truncate_chars(text, TITLE_MAX_CHARS).to_string(),
            summary: format!("{FAILED_SUMMARY_PREFIX}{}", truncate_chars(text, body_chars)),
            is_new: false,
            confidence: DEFAULT_CONFIDENCE,
            reason: "AI classification failed, default category used".to_string(),
        }
    }

    /// Result with no category, used by the keyword tier when nothing scores.
    pub fn unmatched() -> Self {
        Self {
            category: None,
            title: String::new(),
            summary: String::new(),
            is_new: false,
            confidence: 0.0,
            reason: "No keyword match".to_string(),
        }
    }

    /// Whether a category was chosen with non-zero confidence.
    pub fn is_match(&self) -> bool {
        self.category.is_some() && self.confidence > 0.0
    }

    /// Clamp confidence into range and cap title and summary lengths.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        };
        self.title = truncate_chars(self.title.trim(), TITLE_MAX_CHARS).to_string();
        self.summary = truncate_chars(self.summary.trim(), SUMMARY_MAX_CHARS).to_string();
        self.category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_stays_within_summary_limit() {
        let text = "x".repeat(400);
        let result = ClassificationResult::fallback(&text);

        assert!(result.summary.starts_with(FAILED_SUMMARY_PREFIX));
        assert_eq!(result.summary.chars().count(), SUMMARY_MAX_CHARS);
        assert_eq!(result.title.chars().count(), TITLE_MAX_CHARS);
        assert_eq!(result.category.as_deref(), Some(DEFAULT_CATEGORY));
        assert!((result.confidence - DEFAULT_CONFIDENCE).abs() < f32::EPSILON);
    }

    #[test]
    fn test_fallback_short_text() {
        let result = ClassificationResult::fallback("  hi  ");
        assert_eq!(result.title, "hi");
        assert_eq!(result.summary, "[AI Failed] hi");
    }

    #[test]
    fn test_fallback_ignores_surrounding_whitespace() {
        let result = ClassificationResult::fallback("\n\n    Notes from the conference\n");
        assert_eq!(result.title, "Notes from the ");
        assert_eq!(result.title.chars().count(), TITLE_MAX_CHARS);
        assert_eq!(result.summary, "[AI Failed] Notes from the conference");
    }

    #[test]
    fn test_deserialize_partial_model_output() {
        let result: ClassificationResult =
            serde_json::from_str(r#"{"category": "Tech", "confidence": 0.8}"#).unwrap();
        assert_eq!(result.category.as_deref(), Some("Tech"));
        assert!(!result.is_new);
        assert!(result.title.is_empty());
    }

    #[test]
    fn test_normalized_clamps_and_truncates() {
        let result = ClassificationResult {
            category: Some("  ".to_string()),
            title: "A very long generated title".to_string(),
            summary: "s".repeat(300),
            is_new: true,
            confidence: 1.7,
            reason: String::new(),
        }
        .normalized();

        assert_eq!(result.category, None);
        assert_eq!(result.title.chars().count(), TITLE_MAX_CHARS);
        assert_eq!(result.summary.chars().count(), SUMMARY_MAX_CHARS);
        assert!((result.confidence - 1.0).abs() < f32::EPSILON);
    }
}
