//! Prompt template management.

use anyhow::Result;
use handlebars::Handlebars;
use serde::Serialize;

use super::result::{SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::content::ContentRecord;

/// Name of the classification template.
const CLASSIFY: &str = "classify";

/// Name of the classification instructions template.
const CLASSIFY_SYSTEM: &str = "classify_system";

/// Placeholder for empty lists in the prompt.
const NONE: &str = "none";

/// Manages Handlebars prompt templates.
pub struct PromptManager {
    handlebars: Handlebars<'static>,
}

impl PromptManager {
    /// Create a new prompt manager with embedded templates.
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        // Prompts are plain text; HTML escaping would mangle post content.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(true);

        handlebars.register_template_string(CLASSIFY, CLASSIFY_TEMPLATE)?;
        handlebars.register_template_string(CLASSIFY_SYSTEM, CLASSIFY_SYSTEM_TEMPLATE)?;

        Ok(Self { handlebars })
    }

    /// Render the system instructions that accompany every classification.
    pub fn classification_instructions(&self) -> Result<String> {
        Ok(self.handlebars.render(
            CLASSIFY_SYSTEM,
            &InstructionData {
                title_max: TITLE_MAX_CHARS,
                summary_max: SUMMARY_MAX_CHARS,
            },
        )?)
    }

    /// Render the classification prompt for a record.
    pub fn classification_prompt(
        &self,
        record: &ContentRecord,
        existing_categories: &[String],
    ) -> Result<String> {
        let media_kinds: Vec<&str> = record.media_kinds().into_iter().map(|k| k.as_str()).collect();
        let hashtags: Vec<&str> = record.hashtags.iter().map(String::as_str).collect();

        let data = ClassifyPromptData {
            text: &record.text,
            hashtags: join_or_none(&hashtags),
            author: &record.author.handle,
            media_types: join_or_none(&media_kinds),
            categories: join_or_none(existing_categories),
        };

        Ok(self.handlebars.render(CLASSIFY, &data)?)
    }
}

#[derive(Serialize)]
struct InstructionData {
    title_max: usize,
    summary_max: usize,
}

#[derive(Serialize)]
struct ClassifyPromptData<'a> {
    text: &'a str,
    hashtags: String,
    author: &'a str,
    media_types: String,
    categories: String,
}

fn join_or_none<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        NONE.to_string()
    } else {
        items
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Classification instructions, sent as the system instruction.
const CLASSIFY_SYSTEM_TEMPLATE: &str = r#"You are a content classification assistant for saved social-media posts. Each message describes one post and the categories that already exist.

Analyze the topic of the post, then:
1. If one of the existing categories fits, choose it
2. If none fits exactly but one is close, choose the closest
3. If nothing fits at all, suggest a new short category name (one or two words) and set isNew to true
4. Write a concise title of at most {{title_max}} characters capturing the core of the post
5. Write a summary of at most {{summary_max}} characters covering the main content

Respond with JSON only, no other text:
{
  "category": "category name",
  "title": "short title",
  "summary": "content summary",
  "isNew": false,
  "confidence": 0.95,
  "reason": "why this category"
}"#;

/// Per-post classification prompt.
const CLASSIFY_TEMPLATE: &str = r"Existing categories: {{categories}}

Post:
- Text: {{text}}
- Hashtags: {{hashtags}}
- Author: @{{author}}
- Media types: {{media_types}}";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Author, Media, MediaKind};
    use chrono::Utc;

    #[test]
    fn test_prompt_embeds_record_fields() {
        let prompts = PromptManager::new().unwrap();
        let record = ContentRecord::new(
            "1",
            "https://x.com/dev/status/1",
            Author::new("Dev", "dev"),
            "Async <Rust> & you",
            Utc::now(),
        )
        .with_hashtags(["rust", "async"])
        .with_media(vec![Media::new(MediaKind::Image, "https://i/1")]);

        let prompt = prompts
            .classification_prompt(&record, &["Tech".to_string(), "News".to_string()])
            .unwrap();

        assert!(prompt.contains("Existing categories: Tech, News"));
        assert!(prompt.contains("- Text: Async <Rust> & you"));
        assert!(prompt.contains("- Hashtags: async, rust"));
        assert!(prompt.contains("- Author: @dev"));
        assert!(prompt.contains("- Media types: image"));
    }

    #[test]
    fn test_prompt_marks_empty_lists() {
        let prompts = PromptManager::new().unwrap();
        let record = ContentRecord::new(
            "1",
            "https://x.com/dev/status/1",
            Author::new("Dev", "dev"),
            "plain",
            Utc::now(),
        );

        let prompt = prompts.classification_prompt(&record, &[]).unwrap();

        assert!(prompt.contains("Existing categories: none"));
        assert!(prompt.contains("- Hashtags: none"));
        assert!(prompt.contains("- Media types: none"));
    }

    #[test]
    fn test_instructions_carry_length_limits() {
        let prompts = PromptManager::new().unwrap();
        let instructions = prompts.classification_instructions().unwrap();

        assert!(instructions.contains("at most 15 characters"));
        assert!(instructions.contains("at most 150 characters"));
        assert!(instructions.contains("Respond with JSON only"));
        assert!(!instructions.contains("{{"));
    }
}
