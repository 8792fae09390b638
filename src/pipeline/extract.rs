//! Time-windowed extraction over the paginated review feed.
//!
//! The feed is ordered newest-first, so the first record older than the
//! window start ends the whole extraction; it is a cutoff, not a filter.
//! The window deliberately overlaps prior runs to catch late-arriving
//! reviews; the merge step makes the overlap harmless.

use crate::config::{ExtractConfig, SourceConfig};
use crate::domain::RawReviewRow;
use crate::error::Result;
use crate::observability::metrics;
use crate::source::{ReviewPage, ReviewSource, SourceReview};
use chrono::{DateTime, Duration, FixedOffset};
use std::collections::HashSet;
use tracing::{info, warn};

pub struct WindowedExtractor<'a> {
    source: &'a dyn ReviewSource,
    window_days: i64,
    tz: FixedOffset,
    fetch_retries: u32,
    retry_delay: std::time::Duration,
    max_empty_pages: u32,
    pause: std::time::Duration,
}

impl<'a> WindowedExtractor<'a> {
    pub fn new(
        source: &'a dyn ReviewSource,
        source_cfg: &SourceConfig,
        extract_cfg: &ExtractConfig,
    ) -> Self {
        let tz = FixedOffset::east_opt(extract_cfg.timezone_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
        Self {
            source,
            window_days: extract_cfg.window_days,
            tz,
            fetch_retries: source_cfg.fetch_retries.max(1),
            retry_delay: std::time::Duration::from_millis(source_cfg.retry_delay_ms),
            max_empty_pages: source_cfg.max_empty_pages.max(1),
            pause: std::time::Duration::from_millis(source_cfg.pause_ms),
        }
    }

    /// Market timezone used for windowing and month bucketing.
    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    /// Walk the feed and return every review posted within
    /// `[now - window, now]`. No side effects: a failure beyond the retry
    /// budget discards everything accumulated for this invocation.
    pub async fn extract(&self, now: DateTime<FixedOffset>) -> Result<Vec<RawReviewRow>> {
        let end = now;
        let start = now - Duration::days(self.window_days);
        info!(
            "Extracting reviews between {} and {}",
            start.date_naive(),
            end.date_naive()
        );

        let mut rows: Vec<RawReviewRow> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut empty_pages = 0u32;
        let mut pages = 0u64;

        loop {
            let page = self.fetch_page_with_retry(cursor.as_deref()).await?;
            pages += 1;

            let mut stop_early = false;
            for review in &page.reviews {
                let posted = review.posted_at.with_timezone(&self.tz);
                if posted < start {
                    // Newest-first ordering: everything after this record
                    // is older still.
                    stop_early = true;
                    break;
                }
                if posted <= end {
                    rows.push(self.to_row(review, posted));
                }
            }
            if stop_early {
                break;
            }

            if page.reviews.is_empty() {
                empty_pages += 1;
                if empty_pages >= self.max_empty_pages {
                    warn!(
                        "{} consecutive empty pages with no cutoff reached, stopping",
                        empty_pages
                    );
                    break;
                }
            } else {
                empty_pages = 0;
            }

            let next = match page.next_cursor {
                Some(token) => token,
                None => break,
            };
            if !seen_cursors.insert(next.clone()) {
                warn!("Review feed repeated a continuation cursor, stopping");
                break;
            }
            cursor = Some(next);
            tokio::time::sleep(self.pause).await;
        }

        metrics::extract::pages_fetched(pages);
        metrics::extract::reviews_kept(rows.len() as u64);
        info!("Extraction kept {} reviews across {} pages", rows.len(), pages);
        Ok(rows)
    }

    fn to_row(&self, review: &SourceReview, posted: DateTime<FixedOffset>) -> RawReviewRow {
        RawReviewRow {
            review_id: review.id.clone(),
            posted_at: posted,
            rating: review.rating,
            content: review.text.clone(),
            app_version: review.app_version.clone(),
        }
    }

    async fn fetch_page_with_retry(&self, cursor: Option<&str>) -> Result<ReviewPage> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.source.fetch_page(cursor).await {
                Ok(page) => {
                    metrics::extract::page_fetch_success();
                    return Ok(page);
                }
                Err(e) => {
                    metrics::extract::page_fetch_error();
                    if attempt >= self.fetch_retries {
                        return Err(e);
                    }
                    warn!(
                        "Page fetch attempt {}/{} failed: {}, retrying",
                        attempt, self.fetch_retries, e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
