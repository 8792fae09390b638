use super::{ReviewPage, ReviewSource, SourceReview};
use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Play Store review feed client. Fetches one newest-first page per call,
/// carrying the feed's continuation token between calls.
pub struct PlayStoreSource {
    client: reqwest::Client,
    config: SourceConfig,
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    reviews: Vec<FeedReview>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedReview {
    id: String,
    posted_at: String,
    rating: u8,
    #[serde(default)]
    text: String,
    #[serde(default)]
    app_version: Option<String>,
}

impl PlayStoreSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    fn convert(&self, raw: FeedReview) -> Result<SourceReview> {
        let posted_at = DateTime::parse_from_rfc3339(&raw.posted_at).map_err(|e| {
            PipelineError::SourceFetch(format!(
                "unparseable posted_at '{}' for review {}: {}",
                raw.posted_at, raw.id, e
            ))
        })?;
        Ok(SourceReview {
            id: raw.id,
            posted_at,
            rating: raw.rating,
            text: raw.text,
            app_version: raw.app_version,
        })
    }
}

#[async_trait]
impl ReviewSource for PlayStoreSource {
    #[instrument(skip(self, cursor))]
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<ReviewPage> {
        let mut query: Vec<(&str, String)> = vec![
            ("appId", self.config.app_id.clone()),
            ("lang", self.config.lang.clone()),
            ("country", self.config.country.clone()),
            ("count", self.config.page_size.to_string()),
            ("sort", "newest".to_string()),
        ];
        if let Some(token) = cursor {
            query.push(("cursor", token.to_string()));
        }

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::SourceFetch(format!(
                "review feed returned HTTP {} for app {}",
                status, self.config.app_id
            )));
        }

        let page: FeedPage = response.json().await?;
        debug!(
            "Fetched page with {} reviews (cursor present: {})",
            page.reviews.len(),
            page.next_cursor.is_some()
        );

        let mut reviews = Vec::with_capacity(page.reviews.len());
        for raw in page.reviews {
            reviews.push(self.convert(raw)?);
        }

        info!("Review feed page: {} records", reviews.len());
        Ok(ReviewPage {
            reviews,
            next_cursor: page.next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> PlayStoreSource {
        let config: SourceConfig = toml::from_str(
            r#"
            base_url = "https://reviews.example.com/v1/reviews"
            app_id = "com.bancomer.mbanking"
            "#,
        )
        .unwrap();
        PlayStoreSource::new(config).unwrap()
    }

    #[test]
    fn test_convert_parses_fixed_offset_timestamp() {
        let src = source();
        let review = src
            .convert(FeedReview {
                id: "gp:1".to_string(),
                posted_at: "2025-06-15T08:30:00-06:00".to_string(),
                rating: 5,
                text: "excelente".to_string(),
                app_version: Some("5.0.0".to_string()),
            })
            .unwrap();
        assert_eq!(review.posted_at.to_rfc3339(), "2025-06-15T08:30:00-06:00");
        assert_eq!(review.rating, 5);
    }

    #[test]
    fn test_convert_rejects_bad_timestamp() {
        let src = source();
        let err = src.convert(FeedReview {
            id: "gp:2".to_string(),
            posted_at: "June 15".to_string(),
            rating: 1,
            text: String::new(),
            app_version: None,
        });
        assert!(matches!(err, Err(PipelineError::SourceFetch(_))));
    }
}
