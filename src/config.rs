use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub extract: ExtractConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
}

/// Review feed endpoint and pagination parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub app_id: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Fixed pause between page fetches, in milliseconds.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Consecutive empty pages tolerated before extraction stops.
    #[serde(default = "default_max_empty_pages")]
    pub max_empty_pages: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Fixed UTC offset of the market the app serves; windowing and
    /// month bucketing both happen in this zone.
    #[serde(default = "default_tz_offset_hours")]
    pub timezone_offset_hours: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_root")]
    pub data_root: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    /// Reported alongside predictions so the dashboard can tell model
    /// generations apart.
    #[serde(default = "default_model_version")]
    pub model_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicsConfig {
    #[serde(default = "default_min_reviews")]
    pub min_reviews: usize,
    #[serde(default = "default_min_tokens")]
    pub min_tokens: usize,
    #[serde(default = "default_pos_topics")]
    pub pos_topics: usize,
    #[serde(default = "default_neg_topics")]
    pub neg_topics: usize,
}

fn default_lang() -> String {
    "es".to_string()
}
fn default_country() -> String {
    "mx".to_string()
}
fn default_page_size() -> usize {
    1000
}
fn default_pause_ms() -> u64 {
    200
}
fn default_fetch_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_max_empty_pages() -> u32 {
    3
}
fn default_timeout_seconds() -> u64 {
    30
}
fn default_window_days() -> i64 {
    7
}
fn default_tz_offset_hours() -> i32 {
    -6
}
fn default_data_root() -> String {
    "data".to_string()
}
fn default_model_version() -> String {
    "lexicon_v1".to_string()
}
fn default_min_reviews() -> usize {
    300
}
fn default_min_tokens() -> usize {
    3
}
fn default_pos_topics() -> usize {
    20
}
fn default_neg_topics() -> usize {
    30
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            model_version: default_model_version(),
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            min_reviews: default_min_reviews(),
            min_tokens: default_min_tokens(),
            pos_topics: default_pos_topics(),
            neg_topics: default_neg_topics(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path, e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;

        if config.extract.window_days <= 0 {
            return Err(PipelineError::Config(
                "extract.window_days must be positive".to_string(),
            ));
        }
        if config.source.page_size == 0 {
            return Err(PipelineError::Config(
                "source.page_size must be positive".to_string(),
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let cfg: Config = toml::from_str(
            r#"
            [source]
            base_url = "https://reviews.example.com/v1/reviews"
            app_id = "com.bancomer.mbanking"

            [extract]

            [storage]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.source.page_size, 1000);
        assert_eq!(cfg.source.max_empty_pages, 3);
        assert_eq!(cfg.extract.window_days, 7);
        assert_eq!(cfg.extract.timezone_offset_hours, -6);
        assert_eq!(cfg.storage.data_root, "data");
        assert_eq!(cfg.topics.min_reviews, 300);
        assert_eq!(cfg.topics.pos_topics, 20);
        assert_eq!(cfg.topics.neg_topics, 30);
    }
}
