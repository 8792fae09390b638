//! Chooses which sentiment partition feeds topic modeling.
//!
//! Recency is preferred but volume wins: scanning newest-backward, the
//! first month holding at least `min_reviews` rows is selected. When no
//! month qualifies the *oldest* month is used regardless of size, so the
//! pipeline always has input rather than stalling. Lower topic quality
//! is the accepted tradeoff.

use crate::domain::{MonthKey, SentimentRow};
use crate::error::Result;
use crate::storage::partitions::{list_months, read_partition, StagePrefix};
use crate::storage::BlobStore;
use tracing::{info, warn};

#[derive(Debug)]
pub struct SelectedMonth {
    pub month: MonthKey,
    pub rows: Vec<SentimentRow>,
    /// False when the selection fell back to the oldest month.
    pub met_threshold: bool,
}

/// Select the month to run topic modeling on. Errors with
/// `InsufficientData` only when the sentiment stage has no partitions at
/// all; a single available month is returned immediately, threshold or
/// not.
pub async fn select_month(store: &dyn BlobStore, min_reviews: usize) -> Result<SelectedMonth> {
    let months = list_months(store, StagePrefix::Sentiment).await?;
    if months.is_empty() {
        return Err(crate::error::PipelineError::InsufficientData(
            StagePrefix::Sentiment.prefix().to_string(),
        ));
    }

    for &month in months.iter().rev() {
        let rows: Vec<SentimentRow> = read_partition(store, StagePrefix::Sentiment, month).await?;
        if rows.len() >= min_reviews {
            info!(
                "Selected {}: {} reviews (>= {})",
                month,
                rows.len(),
                min_reviews
            );
            return Ok(SelectedMonth {
                month,
                rows,
                met_threshold: true,
            });
        }
        warn!(
            "{} has only {} reviews (< {}), trying previous month",
            month,
            rows.len(),
            min_reviews
        );
    }

    let oldest = months[0];
    let rows: Vec<SentimentRow> = read_partition(store, StagePrefix::Sentiment, oldest).await?;
    warn!(
        "No month with >= {} reviews, using oldest {} ({} reviews)",
        min_reviews,
        oldest,
        rows.len()
    );
    Ok(SelectedMonth {
        month: oldest,
        rows,
        met_threshold: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SentimentLabel;
    use crate::error::PipelineError;
    use crate::storage::partitions::write_partition;
    use crate::storage::InMemoryBlobStore;
    use chrono::DateTime;

    async fn seed_month(store: &InMemoryBlobStore, month: MonthKey, count: usize) {
        let posted = DateTime::parse_from_rfc3339("2025-06-10T08:00:00-06:00").unwrap();
        let rows: Vec<SentimentRow> = (0..count)
            .map(|i| SentimentRow {
                review_id: format!("{}-{}", month, i),
                posted_at: posted,
                rating: 3,
                content: "texto".to_string(),
                app_version: None,
                review_date: posted.date_naive(),
                review_time: posted.time(),
                content_clean: "texto".to_string(),
                sentiment_label: SentimentLabel::Pos,
                confidence: 0.8,
            })
            .collect();
        write_partition(store, StagePrefix::Sentiment, month, &rows)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_most_recent_qualifying_month_wins() {
        let store = InMemoryBlobStore::new();
        seed_month(&store, MonthKey::new(2025, 1), 50).await;
        seed_month(&store, MonthKey::new(2025, 2), 10).await;
        seed_month(&store, MonthKey::new(2025, 3), 400).await;

        let selected = select_month(&store, 300).await.unwrap();
        assert_eq!(selected.month, MonthKey::new(2025, 3));
        assert_eq!(selected.rows.len(), 400);
        assert!(selected.met_threshold);
    }

    #[tokio::test]
    async fn test_fallback_to_oldest_when_nothing_qualifies() {
        let store = InMemoryBlobStore::new();
        seed_month(&store, MonthKey::new(2025, 1), 50).await;
        seed_month(&store, MonthKey::new(2025, 2), 10).await;

        let selected = select_month(&store, 300).await.unwrap();
        assert_eq!(selected.month, MonthKey::new(2025, 1));
        assert_eq!(selected.rows.len(), 50);
        assert!(!selected.met_threshold);
    }

    #[tokio::test]
    async fn test_recent_month_skipped_in_favor_of_older_qualifier() {
        let store = InMemoryBlobStore::new();
        seed_month(&store, MonthKey::new(2025, 1), 350).await;
        seed_month(&store, MonthKey::new(2025, 2), 10).await;

        let selected = select_month(&store, 300).await.unwrap();
        assert_eq!(selected.month, MonthKey::new(2025, 1));
        assert!(selected.met_threshold);
    }

    #[tokio::test]
    async fn test_single_month_is_returned_even_below_threshold() {
        let store = InMemoryBlobStore::new();
        seed_month(&store, MonthKey::new(2025, 4), 7).await;

        let selected = select_month(&store, 300).await.unwrap();
        assert_eq!(selected.month, MonthKey::new(2025, 4));
        assert_eq!(selected.rows.len(), 7);
    }

    #[tokio::test]
    async fn test_no_months_at_all_is_an_error() {
        let store = InMemoryBlobStore::new();
        let err = select_month(&store, 300).await;
        assert!(matches!(err, Err(PipelineError::InsufficientData(_))));
    }
}
