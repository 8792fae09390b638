// Review source: paginated, reverse-chronological feed of store reviews

pub mod play_store;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

pub use play_store::PlayStoreSource;

/// One review as served by the feed, before it becomes a pipeline row.
#[derive(Debug, Clone)]
pub struct SourceReview {
    pub id: String,
    pub posted_at: DateTime<FixedOffset>,
    pub rating: u8,
    pub text: String,
    pub app_version: Option<String>,
}

/// One page of the feed plus the continuation cursor, if any.
#[derive(Debug, Clone)]
pub struct ReviewPage {
    pub reviews: Vec<SourceReview>,
    pub next_cursor: Option<String>,
}

/// Paginated review feed ordered newest-first. Passing `None` as the
/// cursor fetches the first page; the returned cursor continues from
/// where the page left off.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<ReviewPage>;
}
