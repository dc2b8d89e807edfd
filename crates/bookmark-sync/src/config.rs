//! Settings file and environment overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ai::{AIProvider, GeminiProvider};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::{GenerationSettings, KeywordRule, RuleClassifier};
use crate::store::NotionConfig;
use crate::sync::SyncConfig;

/// Default bound on each AI and store call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default sampling temperature for classification.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default output token budget for classification.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;

const ENV_NOTION_API_KEY: &str = "NOTION_API_KEY";
const ENV_NOTION_DATABASE_ID: &str = "NOTION_DATABASE_ID";
const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
const ENV_AI_PROVIDER: &str = "AI_PROVIDER";
const ENV_AI_MODEL: &str = "AI_MODEL";
const ENV_AUTO_SYNC: &str = "BOOKMARK_SYNC_AUTO";
const ENV_TIMEOUT_SECS: &str = "BOOKMARK_SYNC_TIMEOUT_SECS";

/// Which generative provider classifies content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    #[default]
    Gemini,
    /// Skip the AI tier and classify with keyword rules only.
    #[serde(rename = "none")]
    Disabled,
}

impl FromStr for AiProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "none" | "off" | "rules" => Ok(Self::Disabled),
            other => bail!("Unknown AI provider: {other}"),
        }
    }
}

/// User settings, stored as `settings.json` in the state directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ai_provider: AiProviderKind,
    /// Model override; the provider default is used when unset.
    pub ai_model: Option<String>,
    pub enable_auto_sync: bool,
    pub request_timeout_secs: u64,
    /// Keyword tables merged over the built-in ones.
    pub custom_rules: Vec<KeywordRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notion_api_key: None,
            notion_database_id: None,
            gemini_api_key: None,
            ai_provider: AiProviderKind::default(),
            ai_model: None,
            enable_auto_sync: true,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            custom_rules: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    /// Save settings to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    ///
    /// # Environment Variables
    /// - `NOTION_API_KEY`, `NOTION_DATABASE_ID`: store credentials
    /// - `GEMINI_API_KEY`: AI credentials
    /// - `AI_PROVIDER`: `gemini` or `none`
    /// - `AI_MODEL`: model override
    /// - `BOOKMARK_SYNC_AUTO`: `true`/`false`
    /// - `BOOKMARK_SYNC_TIMEOUT_SECS`: request timeout in seconds
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_NOTION_API_KEY) {
            self.notion_api_key = Some(v);
        }
        if let Some(v) = get(ENV_NOTION_DATABASE_ID) {
            self.notion_database_id = Some(v);
        }
        if let Some(v) = get(ENV_GEMINI_API_KEY) {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = get(ENV_AI_PROVIDER) {
            self.ai_provider = v.parse()?;
        }
        if let Some(v) = get(ENV_AI_MODEL) {
            self.ai_model = Some(v);
        }
        if let Some(v) = get(ENV_AUTO_SYNC) {
            self.enable_auto_sync = parse_bool(&v)
                .with_context(|| format!("{ENV_AUTO_SYNC} must be true or false, got {v}"))?;
        }
        if let Some(v) = get(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_SECS} must be a number, got {v}"))?;
        }
        Ok(self)
    }

    /// Merge keyword tables into the stored custom rules by category.
    pub fn merge_custom_rules(&mut self, rules: Vec<KeywordRule>) {
        for rule in rules {
            match self
                .custom_rules
                .iter_mut()
                .find(|r| r.category == rule.category)
            {
                Some(existing) => existing.keywords = rule.keywords,
                None => self.custom_rules.push(rule),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn notion_config(&self) -> NotionConfig {
        NotionConfig {
            api_key: self.notion_api_key.clone(),
            database_id: self.notion_database_id.clone(),
            base_url: None,
        }
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            auto_sync_enabled: self.enable_auto_sync,
            request_timeout: self.request_timeout(),
        }
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self
                .ai_model
                .clone()
                .unwrap_or_else(|| ai::gemini::default_model().to_string()),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: self.request_timeout(),
        }
    }

    /// Built-in keyword tables with the custom rules merged in.
    pub fn rule_classifier(&self) -> RuleClassifier {
        RuleClassifier::with_overrides(&self.custom_rules)
    }

    /// The configured AI provider, or `None` when AI is switched off.
    ///
    /// A Gemini provider without a key is still returned; the AI tier
    /// treats it as unavailable.
    pub fn build_ai_provider(&self) -> Result<Option<Arc<dyn AIProvider>>> {
        match self.ai_provider {
            AiProviderKind::Disabled => Ok(None),
            AiProviderKind::Gemini => {
                let provider =
                    GeminiProvider::with_timeout(self.gemini_api_key.clone(), self.request_timeout())?;
                Ok(Some(Arc::new(provider)))
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Locations of the state files.
#[derive(Debug, Clone)]
pub struct StatePaths {
    dir: PathBuf,
}

impl StatePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings(&self) -> PathBuf {
        self.dir.join("settings.json")
    }

    pub fn history(&self) -> PathBuf {
        self.dir.join("history.json")
    }

    pub fn queue(&self) -> PathBuf {
        self.dir.join("failed-syncs.json")
    }

    pub fn cache(&self) -> PathBuf {
        self.dir.join("classification-cache.json")
    }
}
