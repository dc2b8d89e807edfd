//! Integration tests for the capture-to-Notion sync flow.
//!
//! These tests drive the orchestrator against mocked Gemini and Notion
//! endpoints with state kept in a temporary directory.

use std::sync::Arc;
use std::time::Duration;

use ai::GeminiProvider;
use bookmark_sync::classify::{GenerationSettings, DEFAULT_CATEGORY};
use bookmark_sync::store::NotionConfig;
use bookmark_sync::sync::{SyncConfig, SyncOutcome};
use bookmark_sync::{
    AiClassifier, Author, ClassificationCache, ContentRecord, DrainSummary, NotionClient,
    RetryQueue, RuleClassifier, Settings, StatePaths, SyncError, SyncHistory, SyncOrchestrator,
};
use chrono::Utc;
use notify::Notifier;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(id: &str, text: &str) -> ContentRecord {
    ContentRecord::new(
        id,
        format!("https://x.com/ferris/status/{id}"),
        Author::new("Ferris", "ferris"),
        text,
        Utc::now(),
    )
    .with_hashtags(["rustlang"])
}

fn gemini_body(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"parts": [{"text": text}], "role": "model"},
            "finishReason": "STOP"
        }]
    })
}

async fn mount_database(server: &MockServer, categories: &[&str]) {
    let options: Vec<Value> = categories.iter().map(|name| json!({"name": name})).collect();
    Mock::given(method("GET"))
        .and(path("/databases/db-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": [{"plain_text": "Bookmarks"}],
            "properties": {
                "Category": {"type": "select", "select": {"options": options}}
            }
        })))
        .mount(server)
        .await;
}

fn page_created(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": id,
        "url": format!("https://notion.so/{id}")
    }))
}

/// Wires an orchestrator over on-disk state in `paths`.
async fn orchestrator(
    paths: &StatePaths,
    notion: &MockServer,
    gemini: Option<&MockServer>,
    cache: Arc<ClassificationCache>,
) -> SyncOrchestrator {
    let store = NotionClient::new(
        &NotionConfig {
            api_key: Some("secret".to_string()),
            database_id: Some("db-1".to_string()),
            base_url: Some(notion.uri()),
        },
        Duration::from_secs(5),
    )
    .unwrap();

    let provider = gemini.map(|server| {
        Arc::new(
            GeminiProvider::new("test-key")
                .unwrap()
                .with_base_url(server.uri()),
        ) as Arc<dyn ai::AIProvider>
    });
    let classifier = AiClassifier::new(
        provider,
        RuleClassifier::new(),
        GenerationSettings::default(),
        cache,
    )
    .unwrap();

    SyncOrchestrator::new(
        SyncConfig {
            auto_sync_enabled: true,
            request_timeout: Duration::from_secs(5),
        },
        Arc::new(store),
        Arc::new(classifier),
        Arc::new(SyncHistory::open(paths.history()).await.unwrap()),
        Arc::new(RetryQueue::open(paths.queue()).await.unwrap()),
        Arc::new(Notifier::disabled()),
    )
}

mod classification_tests {
    use super::*;

    #[tokio::test]
    async fn test_repeat_sync_reuses_cached_classification() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let notion = MockServer::start().await;
        let gemini = MockServer::start().await;

        mount_database(&notion, &["Tech", "Design"]).await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(page_created("page-1"))
            .expect(2)
            .mount(&notion)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r".*:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
                r#"Sure! {"category":"Tech","title":"T","summary":"S","isNew":false,"confidence":0.9,"reason":"r"} thanks"#,
            )))
            .expect(1)
            .mount(&gemini)
            .await;

        let cache = Arc::new(ClassificationCache::new());
        let orchestrator = orchestrator(&paths, &notion, Some(&gemini), Arc::clone(&cache)).await;
        let post = record("1", "Lifetimes finally clicked for me today");

        let SyncOutcome::Synced(first) = orchestrator.sync(&post).await.unwrap() else {
            panic!("expected first sync to succeed");
        };
        let SyncOutcome::Synced(second) = orchestrator.sync(&post).await.unwrap() else {
            panic!("expected second sync to succeed");
        };

        assert_eq!(first.classification.category.as_deref(), Some("Tech"));
        assert_eq!(first.classification.summary, "S");
        assert_eq!(first.classification, second.classification);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_survives_restart() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let notion = MockServer::start().await;
        let gemini = MockServer::start().await;

        mount_database(&notion, &[]).await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(page_created("page-1"))
            .mount(&notion)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(
                r#"{"category":"Learning","title":"Notes","summary":"Study notes","isNew":true,"confidence":0.8,"reason":"course"}"#,
            )))
            .expect(1)
            .mount(&gemini)
            .await;

        let post = record("2", "My notes from the async workshop");

        let cache = Arc::new(ClassificationCache::new());
        let first = orchestrator(&paths, &notion, Some(&gemini), Arc::clone(&cache)).await;
        first.sync(&post).await.unwrap();
        cache.save(&paths.cache()).unwrap();

        let reloaded = Arc::new(ClassificationCache::load(&paths.cache()).unwrap());
        let second = orchestrator(&paths, &notion, Some(&gemini), reloaded).await;
        let SyncOutcome::Synced(receipt) = second.sync(&post).await.unwrap() else {
            panic!("expected sync to succeed");
        };

        assert_eq!(receipt.classification.category.as_deref(), Some("Learning"));
        assert!(receipt.classification.is_new);
    }

    #[tokio::test]
    async fn test_ai_outage_falls_back_to_default_within_limits() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let notion = MockServer::start().await;
        let gemini = MockServer::start().await;

        mount_database(&notion, &[]).await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(page_created("page-9"))
            .mount(&notion)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&gemini)
            .await;

        let text = "qqq ".repeat(100);
        let orchestrator = orchestrator(
            &paths,
            &notion,
            Some(&gemini),
            Arc::new(ClassificationCache::new()),
        )
        .await;
        let post = ContentRecord::new(
            "3",
            "https://x.com/ferris/status/3",
            Author::new("Ferris", "ferris"),
            text,
            Utc::now(),
        );

        let SyncOutcome::Synced(receipt) = orchestrator.sync(&post).await.unwrap() else {
            panic!("expected sync to succeed");
        };
        let classification = receipt.classification;

        assert_eq!(classification.category.as_deref(), Some(DEFAULT_CATEGORY));
        assert!((classification.confidence - 0.5).abs() < f32::EPSILON);
        assert!(classification.title.chars().count() <= 15);
        assert!(classification.summary.chars().count() <= 150);
    }
}

mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_sync_survives_restart_and_replays() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let notion = MockServer::start().await;

        mount_database(&notion, &["Tech"]).await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({
                "object": "error",
                "status": 502,
                "message": "upstream unavailable"
            })))
            .up_to_n_times(1)
            .mount(&notion)
            .await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(page_created("page-2"))
            .mount(&notion)
            .await;

        let post = record("4", "Shipping a new rust crate for parsing");

        {
            let orchestrator =
                orchestrator(&paths, &notion, None, Arc::new(ClassificationCache::new())).await;
            let err = orchestrator.sync(&post).await.unwrap_err();
            assert!(matches!(err, SyncError::Persistence(_)));
            assert!(err.to_string().contains("upstream unavailable"));
        }

        let reopened = RetryQueue::open(paths.queue()).await.unwrap();
        let queued = reopened.snapshot().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].record.id, "4");
        assert_eq!(queued[0].retry_count, 0);

        let orchestrator =
            orchestrator(&paths, &notion, None, Arc::new(ClassificationCache::new())).await;
        let summary = orchestrator.retry_failed().await.unwrap();

        assert_eq!(
            summary,
            DrainSummary {
                succeeded: 1,
                failed: 0,
                total: 1
            }
        );
        assert!(RetryQueue::open(paths.queue()).await.unwrap().is_empty().await);

        let history = SyncHistory::open(paths.history()).await.unwrap();
        let entries = history.recent(10).await;
        assert_eq!(entries.len(), 2);
        assert!(entries[0].success);
        assert_eq!(entries[0].item_id.as_deref(), Some("page-2"));
        assert!(!entries[1].success);
    }

    #[tokio::test]
    async fn test_item_dropped_after_five_failed_replays() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let notion = MockServer::start().await;

        mount_database(&notion, &[]).await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&notion)
            .await;

        let orchestrator =
            orchestrator(&paths, &notion, None, Arc::new(ClassificationCache::new())).await;
        orchestrator
            .sync(&record("5", "always failing"))
            .await
            .unwrap_err();

        for attempt in 1..5 {
            let summary = orchestrator.retry_failed().await.unwrap();
            assert_eq!(summary.failed, 1);
            let queued = orchestrator.queue().snapshot().await;
            assert_eq!(queued.len(), 1, "dropped too early on attempt {attempt}");
            assert_eq!(queued[0].retry_count, attempt);
        }

        let summary = orchestrator.retry_failed().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert!(orchestrator.queue().is_empty().await);
    }
}

mod configuration_tests {
    use super::*;
    use bookmark_sync::sync::SkipReason;

    #[tokio::test]
    async fn test_missing_credentials_skip_without_touching_state() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());

        let settings = Settings::default()
            .with_overrides(|key| (key == "AI_PROVIDER").then(|| "none".to_string()))
            .unwrap();
        let classifier = AiClassifier::new(
            settings.build_ai_provider().unwrap(),
            settings.rule_classifier(),
            settings.generation_settings(),
            Arc::new(ClassificationCache::new()),
        )
        .unwrap();
        let store = NotionClient::new(&settings.notion_config(), settings.request_timeout()).unwrap();
        let orchestrator = SyncOrchestrator::new(
            settings.sync_config(),
            Arc::new(store),
            Arc::new(classifier),
            Arc::new(SyncHistory::open(paths.history()).await.unwrap()),
            Arc::new(RetryQueue::open(paths.queue()).await.unwrap()),
            Arc::new(Notifier::disabled()),
        );

        let outcome = orchestrator.sync(&record("6", "hello")).await.unwrap();

        assert!(matches!(
            outcome,
            SyncOutcome::Skipped(SkipReason::MissingCredentials)
        ));
        assert!(!paths.queue().exists());
        assert!(!paths.history().exists());
    }

    #[tokio::test]
    async fn test_custom_rules_drive_classification_without_ai() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path());
        let notion = MockServer::start().await;

        mount_database(&notion, &["Cooking", "Tech"]).await;
        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(page_created("page-7"))
            .mount(&notion)
            .await;

        let mut settings = Settings::default();
        settings.merge_custom_rules(vec![bookmark_sync::classify::KeywordRule::new(
            "Cooking",
            ["sourdough", "recipe"],
        )]);
        settings.save(&paths.settings()).unwrap();
        let settings = Settings::load(&paths.settings()).unwrap();

        let store = NotionClient::new(
            &NotionConfig {
                api_key: Some("secret".to_string()),
                database_id: Some("db-1".to_string()),
                base_url: Some(notion.uri()),
            },
            Duration::from_secs(5),
        )
        .unwrap();
        let classifier = AiClassifier::new(
            None,
            settings.rule_classifier(),
            settings.generation_settings(),
            Arc::new(ClassificationCache::new()),
        )
        .unwrap();
        let orchestrator = SyncOrchestrator::new(
            settings.sync_config(),
            Arc::new(store),
            Arc::new(classifier),
            Arc::new(SyncHistory::in_memory()),
            Arc::new(RetryQueue::in_memory()),
            Arc::new(Notifier::disabled()),
        );

        let post = record("7", "A sourdough recipe for the weekend");
        let SyncOutcome::Synced(receipt) = orchestrator.sync(&post).await.unwrap() else {
            panic!("expected sync to succeed");
        };

        assert_eq!(receipt.classification.category.as_deref(), Some("Cooking"));
        assert_eq!(receipt.item.id, "page-7");
    }
}
