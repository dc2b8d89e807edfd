//! Notion API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{ContentStore, CreatedItem, StoreError};
use crate::classify::ClassificationResult;
use crate::content::{ContentRecord, MediaKind};

const NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Notion API version sent with every request.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Notion rejects rich text objects longer than this.
const RICH_TEXT_LIMIT: usize = 2000;

/// Title length used when the classification produced none.
const FALLBACK_TITLE_CHARS: usize = 100;

const PROP_TITLE: &str = "Title";
const PROP_URL: &str = "URL";
const PROP_SAVED_AT: &str = "Saved At";
const PROP_SUMMARY: &str = "Summary";
const PROP_AUTHOR: &str = "Author";
const PROP_CATEGORY: &str = "Category";
const PROP_TAGS: &str = "Tags";
const PROP_MEDIA: &str = "Media Type";

/// Credentials and endpoint for a Notion database.
#[derive(Debug, Clone, Default)]
pub struct NotionConfig {
    pub api_key: Option<String>,
    pub database_id: Option<String>,
    pub base_url: Option<String>,
}

impl NotionConfig {
    pub fn is_complete(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.database_id.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// Summary of the target database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub title: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DatabaseResponse {
    #[serde(default)]
    title: Vec<PlainText>,
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PlainText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    message: String,
}

/// Notion client bound to one database.
pub struct NotionClient {
    client: Client,
    api_key: String,
    database_id: String,
    base_url: String,
}

impl NotionClient {
    /// Create a client. Missing credentials yield an unconfigured client
    /// whose calls fail with [`StoreError::NotConfigured`].
    pub fn new(config: &NotionConfig, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().unwrap_or_default(),
            database_id: config.database_id.clone().unwrap_or_default(),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(NOTION_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn ensure_configured(&self) -> Result<(), StoreError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(StoreError::NotConfigured)
        }
    }

    /// Fetch the database title and its category options.
    pub async fn get_database(&self) -> Result<DatabaseInfo, StoreError> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(format!("{}/databases/{}", self.base_url, self.database_id))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let database: DatabaseResponse = Self::read_json(response).await?;

        Ok(DatabaseInfo {
            title: database
                .title
                .iter()
                .map(|t| t.plain_text.as_str())
                .collect(),
            categories: category_options(&database.properties),
        })
    }

    async fn read_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Request(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<NotionErrorBody>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unknown error")
                        .to_string()
                });
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| StoreError::Response(e.to_string()))
    }
}

#[async_trait]
impl ContentStore for NotionClient {
    fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.database_id.is_empty()
    }

    async fn existing_categories(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.get_database().await?.categories)
    }

    async fn create_item(
        &self,
        record: &ContentRecord,
        classification: &ClassificationResult,
    ) -> Result<CreatedItem, StoreError> {
        self.ensure_configured()?;

        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": build_properties(record, classification),
            "children": build_blocks(record),
        });

        debug!(url = %record.url, "Creating Notion page");

        let response = self
            .client
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        let page: PageResponse = Self::read_json(response).await?;
        info!(page_id = %page.id, "Notion page created");

        Ok(CreatedItem {
            id: page.id,
            url: page.url,
        })
    }
}

/// Option names of the category select property, or empty when the
/// property is missing or not a select.
fn category_options(properties: &serde_json::Map<String, Value>) -> Vec<String> {
    let Some(property) = properties.get(PROP_CATEGORY) else {
        return Vec::new();
    };
    if property.get("type").and_then(Value::as_str) != Some("select") {
        return Vec::new();
    }

    property
        .pointer("/select/options")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|o| o.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn rich_text(content: &str) -> Value {
    let chunks: Vec<Value> = chunk_chars(content, RICH_TEXT_LIMIT)
        .into_iter()
        .map(|chunk| json!({ "text": { "content": chunk } }))
        .collect();
    Value::Array(chunks)
}

fn chunk_chars(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn build_properties(record: &ContentRecord, classification: &ClassificationResult) -> Value {
    let title = if classification.title.is_empty() {
        truncate_with_ellipsis(record.text.trim(), FALLBACK_TITLE_CHARS)
    } else {
        classification.title.clone()
    };

    let mut properties = serde_json::Map::new();
    properties.insert(PROP_TITLE.into(), json!({ "title": rich_text(&title) }));
    properties.insert(PROP_URL.into(), json!({ "url": record.url }));
    properties.insert(
        PROP_SAVED_AT.into(),
        json!({ "date": { "start": chrono::Utc::now().to_rfc3339() } }),
    );
    properties.insert(
        PROP_SUMMARY.into(),
        json!({ "rich_text": rich_text(&classification.summary) }),
    );

    if !record.author.handle.is_empty() {
        properties.insert(
            PROP_AUTHOR.into(),
            json!({ "rich_text": rich_text(&format!("@{}", record.author.handle)) }),
        );
    }

    if let Some(category) = &classification.category {
        properties.insert(
            PROP_CATEGORY.into(),
            json!({ "select": { "name": category } }),
        );
    }

    if !record.hashtags.is_empty() {
        let tags: Vec<Value> = record
            .hashtags
            .iter()
            .map(|tag| json!({ "name": tag }))
            .collect();
        properties.insert(PROP_TAGS.into(), json!({ "multi_select": tags }));
    }

    let kinds = record.media_kinds();
    if !kinds.is_empty() {
        let names: Vec<Value> = kinds
            .iter()
            .map(|kind| json!({ "name": kind.label() }))
            .collect();
        properties.insert(PROP_MEDIA.into(), json!({ "multi_select": names }));
    }

    Value::Object(properties)
}

fn build_blocks(record: &ContentRecord) -> Vec<Value> {
    let mut blocks = vec![json!({
        "type": "callout",
        "callout": {
            "icon": { "type": "emoji", "emoji": "👤" },
            "rich_text": rich_text(&format!(
                "{} (@{})\n📅 {}",
                record.author.name,
                record.author.handle,
                record.timestamp.format("%Y-%m-%d %H:%M")
            )),
            "color": "blue_background"
        }
    })];

    if !record.text.is_empty() {
        blocks.push(json!({
            "type": "paragraph",
            "paragraph": { "rich_text": rich_text(&record.text) }
        }));
    }

    if !record.media.is_empty() {
        blocks.push(divider());
        for item in record.media.iter().filter(|m| !m.url.is_empty()) {
            blocks.push(match item.kind {
                MediaKind::Image => json!({
                    "type": "image",
                    "image": { "type": "external", "external": { "url": item.url } }
                }),
                MediaKind::Video => json!({
                    "type": "bookmark",
                    "bookmark": { "url": item.url }
                }),
                MediaKind::Link => {
                    let caption = item
                        .title
                        .as_deref()
                        .map_or_else(|| json!([]), rich_text);
                    json!({
                        "type": "bookmark",
                        "bookmark": { "url": item.url, "caption": caption }
                    })
                }
            });
        }
    }

    let stats = record.stats;
    blocks.push(divider());
    blocks.push(json!({
        "type": "paragraph",
        "paragraph": {
            "rich_text": rich_text(&format!(
                "💬 {} replies | 🔁 {} retweets | ❤️ {} likes",
                format_number(stats.replies),
                format_number(stats.retweets),
                format_number(stats.likes)
            )),
            "color": "gray"
        }
    }));

    blocks
}

fn divider() -> Value {
    json!({ "type": "divider", "divider": {} })
}

/// Compact engagement count, e.g. `1.2K` or `3.4M`.
pub fn format_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Author, Media, Stats};
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> ContentRecord {
        ContentRecord::new(
            "7",
            "https://x.com/carol/status/7",
            Author::new("Carol", "carol"),
            "Notes on async cancellation",
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        )
        .with_hashtags(["rust"])
        .with_media(vec![
            Media::new(MediaKind::Image, "https://img/1.png"),
            Media::new(MediaKind::Link, "https://blog/post").with_title("Post"),
        ])
        .with_stats(Stats {
            replies: 12,
            retweets: 1_500,
            likes: 2_300_000,
        })
    }

    fn classification() -> ClassificationResult {
        ClassificationResult {
            category: Some("Tech".to_string()),
            title: "Async notes".to_string(),
            summary: "Cancellation in async Rust".to_string(),
            is_new: false,
            confidence: 0.9,
            reason: "r".to_string(),
        }
    }

    fn client_for(server: &MockServer) -> NotionClient {
        NotionClient::new(
            &NotionConfig {
                api_key: Some("secret".to_string()),
                database_id: Some("db-1".to_string()),
                base_url: Some(server.uri()),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_500), "1.5K");
        assert_eq!(format_number(2_300_000), "2.3M");
    }

    #[test]
    fn test_properties_include_classification() {
        let props = build_properties(&record(), &classification());

        assert_eq!(props["Title"]["title"][0]["text"]["content"], "Async notes");
        assert_eq!(props["Category"]["select"]["name"], "Tech");
        assert_eq!(props["Author"]["rich_text"][0]["text"]["content"], "@carol");
        assert_eq!(props["Tags"]["multi_select"][0]["name"], "rust");
        assert_eq!(props["Media Type"]["multi_select"][0]["name"], "Image");
        assert_eq!(props["Media Type"]["multi_select"][1]["name"], "Link");
    }

    #[test]
    fn test_properties_fall_back_to_text_title() {
        let mut classification = classification();
        classification.title.clear();
        classification.category = None;

        let props = build_properties(&record(), &classification);
        assert_eq!(
            props["Title"]["title"][0]["text"]["content"],
            "Notes on async cancellation"
        );
        assert!(props.get("Category").is_none());
    }

    #[test]
    fn test_blocks_layout() {
        let blocks = build_blocks(&record());
        let types: Vec<&str> = blocks.iter().filter_map(|b| b["type"].as_str()).collect();

        assert_eq!(
            types,
            ["callout", "paragraph", "divider", "image", "bookmark", "divider", "paragraph"]
        );
        assert_eq!(
            blocks[0]["callout"]["rich_text"][0]["text"]["content"],
            "Carol (@carol)\n📅 2024-03-01 09:30"
        );
        assert_eq!(
            blocks[6]["paragraph"]["rich_text"][0]["text"]["content"],
            "💬 12 replies | 🔁 1.5K retweets | ❤️ 2.3M likes"
        );
    }

    #[test]
    fn test_long_text_is_chunked() {
        let text = "a".repeat(RICH_TEXT_LIMIT + 10);
        let value = rich_text(&text);
        let chunks = value.as_array().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1]["text"]["content"].as_str().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_existing_categories_reads_select_options() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/databases/db-1"))
            .and(header("Notion-Version", NOTION_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": [{"plain_text": "Bookmarks"}],
                "properties": {
                    "Category": {
                        "type": "select",
                        "select": {"options": [{"name": "Tech"}, {"name": "Design"}]}
                    }
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.existing_categories().await.unwrap(), ["Tech", "Design"]);
        assert_eq!(client.get_database().await.unwrap().title, "Bookmarks");
    }

    #[tokio::test]
    async fn test_existing_categories_empty_when_not_select() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {"Category": {"type": "rich_text", "rich_text": {}}}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.existing_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_item_returns_page_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(json!({"parent": {"database_id": "db-1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "page-123",
                "url": "https://notion.so/page-123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let item = client
            .create_item(&record(), &classification())
            .await
            .unwrap();
        assert_eq!(item.id, "page-123");
    }

    #[tokio::test]
    async fn test_create_item_surfaces_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "object": "error",
                "status": 400,
                "message": "Category is not a property that exists."
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .create_item(&record(), &classification())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Api { status: 400, .. }));
        assert!(err.to_string().contains("Category is not a property"));
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let client = NotionClient::new(&NotionConfig::default(), Duration::from_secs(1)).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(
            client.existing_categories().await,
            Err(StoreError::NotConfigured)
        ));
    }
}
