//! Types for a captured post.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post captured at bookmark time.
///
/// Records are immutable once built: the classification and sync flow only
/// reads them, and the retry queue stores a copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Platform post ID.
    pub id: String,
    /// Canonical post URL.
    pub url: String,
    /// Post author.
    pub author: Author,
    /// Full post text.
    pub text: String,
    /// Hashtags without the leading `#`.
    #[serde(default)]
    pub hashtags: BTreeSet<String>,
    /// Mentioned handles without the leading `@`.
    #[serde(default)]
    pub mentions: BTreeSet<String>,
    /// Attached media, in post order.
    #[serde(default)]
    pub media: Vec<Media>,
    /// Engagement counters at capture time.
    #[serde(default)]
    pub stats: Stats,
    /// When the post was published.
    pub timestamp: DateTime<Utc>,
}

impl ContentRecord {
    /// Create a record with no hashtags, mentions, media or stats.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        author: Author,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            author,
            text: text.into(),
            hashtags: BTreeSet::new(),
            mentions: BTreeSet::new(),
            media: Vec::new(),
            stats: Stats::default(),
            timestamp,
        }
    }

    #[must_use]
    pub fn with_hashtags<I, S>(mut self, hashtags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hashtags = hashtags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_mentions<I, S>(mut self, mentions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mentions = mentions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: Vec<Media>) -> Self {
        self.media = media;
        self
    }

    #[must_use]
    pub const fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    /// Distinct media kinds in first-seen order.
    pub fn media_kinds(&self) -> Vec<MediaKind> {
        let mut kinds = Vec::new();
        for item in &self.media {
            if !kinds.contains(&item.kind) {
                kinds.push(item.kind);
            }
        }
        kinds
    }

    /// Text prefix for logs and history previews.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.text.trim();
        if text.chars().count() <= max_chars {
            text.to_string()
        } else {
            format!("{}...", truncate_chars(text, max_chars))
        }
    }
}

/// Post author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// Handle without the leading `@`.
    pub handle: String,
}

impl Author {
    pub fn new(name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: handle.into(),
        }
    }
}

/// Media attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(alias = "type")]
    pub kind: MediaKind,
    pub url: String,
    /// Link cards carry a title; images and videos usually don't.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Media {
    pub fn new(kind: MediaKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            title: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Kind of attached media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Link,
}

impl MediaKind {
    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Link => "link",
        }
    }

    /// Capitalized label used for store select options.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Link => "Link",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engagement counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub replies: u64,
    #[serde(default)]
    pub retweets: u64,
    #[serde(default)]
    pub likes: u64,
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
