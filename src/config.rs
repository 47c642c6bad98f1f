use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::{Period, ProviderId};

const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are an experienced software engineer. Summarize the GitHub project below.

Project: {{name}}
Primary language: {{lang}}
Description: {{desc}}
URL: {{url}}

Requirements:
1. Keep each summary between 50 and 80 words.
2. Focus on the problem the project solves or the core capability it provides.
3. Be direct. Do not open with phrases such as "This project is".
4. Reply with one JSON object and nothing else, shaped as {"en": "<English summary>", "zh": "<Simplified Chinese summary>"}."#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub collect: CollectConfig,

    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Which (period, language) combinations the collection loop walks and how
/// long it pauses between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
    pub periods: Vec<Period>,
    /// Collector language keys; the empty string is the all-languages listing.
    pub languages: Vec<String>,
    pub source_dir: String,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Every missing provider is attempted concurrently.
    #[default]
    Parallel,
    /// Providers are tried in configured order until one succeeds.
    Fallback,
}

/// Shape the prompt asks the provider to answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    /// A JSON object of language code to summary text.
    #[default]
    Translations,
    /// A single-language plain-text summary.
    Plain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub mode: DispatchMode,
    pub providers: Vec<ProviderId>,
    pub max_retries: u32,
    pub timeout_ms: u64,
    /// Pause after a repository that needed at least one provider call.
    pub delay_ms: u64,
    /// Base of the exponential backoff between retries; 0 retries immediately.
    pub retry_backoff_ms: u64,
    pub summary_format: SummaryFormat,
    pub prompt_template: String,
    pub filters: AiFilters,
    pub chatgpt: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub gemini: ProviderConfig,
}

/// Restricts enrichment to selected collection combinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiFilters {
    pub languages: Vec<String>,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trending-digest");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("trending.db").to_string_lossy().to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            periods: Period::ALL.to_vec(),
            languages: [
                "", "python", "javascript", "java", "go", "rust", "typescript", "c++", "c", "swift",
                "kotlin",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            source_dir: "data/raw".to_string(),
            min_delay_ms: 2000,
            max_delay_ms: 5000,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: DispatchMode::default(),
            providers: vec![ProviderId::DeepSeek, ProviderId::Gemini],
            max_retries: 3,
            timeout_ms: 30_000,
            delay_ms: 3000,
            retry_backoff_ms: 1000,
            summary_format: SummaryFormat::default(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            filters: AiFilters::default(),
            chatgpt: ProviderConfig::new("gpt-4o-mini", "https://api.openai.com/v1"),
            deepseek: ProviderConfig::new("deepseek-chat", "https://api.deepseek.com/v1"),
            gemini: ProviderConfig::new(
                "gemini-2.5-flash",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
        }
    }
}

impl Default for AiFilters {
    fn default() -> Self {
        Self {
            languages: vec![String::new()],
            periods: vec![Period::Daily],
        }
    }
}

impl ProviderConfig {
    pub fn new(model: &str, base_url: &str) -> Self {
        Self {
            model: model.to_string(),
            base_url: base_url.to_string(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

impl AiConfig {
    pub fn provider_config(&self, provider: ProviderId) -> &ProviderConfig {
        match provider {
            ProviderId::ChatGpt => &self.chatgpt,
            ProviderId::DeepSeek => &self.deepseek,
            ProviderId::Gemini => &self.gemini,
        }
    }

    /// Whether enrichment runs for this collection combination.
    pub fn applies_to(&self, language: &str, period: Period) -> bool {
        self.enabled
            && self.filters.languages.iter().any(|l| l == language)
            && self.filters.periods.contains(&period)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            server: ServerConfig::default(),
            collect: CollectConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trending-digest")
            .join("config.toml")
    }

    /// Layers secrets and switches from the environment over the file values.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("TRENDING_DB_PATH") {
            self.db_path = path;
        }
        if let Some(enabled) = var("AI_ENABLED") {
            self.ai.enabled = enabled.eq_ignore_ascii_case("true");
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.ai.chatgpt.api_key = Some(key);
        }
        if let Some(key) = var("DEEPSEEK_API_KEY") {
            self.ai.deepseek.api_key = Some(key);
        }
        if let Some(key) = var("GEMINI_API_KEY") {
            self.ai.gemini.api_key = Some(key);
        }
    }
}
