//! Record shapes persisted at each pipeline stage.
//!
//! The CSV schema is additive: each stage's row struct repeats the prior
//! stage's columns in the same declaration order and appends its own.
//! Downstream consumers read columns by name, so field names and order
//! must stay stable across runs.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary sentiment assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Pos,
    Neg,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Pos => write!(f, "pos"),
            SentimentLabel::Neg => write!(f, "neg"),
        }
    }
}

/// Calendar month a partition belongs to, rendered as `YYYY_MM` in keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_datetime(dt: &DateTime<FixedOffset>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}_{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('_')
            .ok_or_else(|| format!("not a YYYY_MM month key: '{s}'"))?;
        let year: i32 = y
            .parse()
            .map_err(|_| format!("bad year in month key: '{s}'"))?;
        let month: u32 = m
            .parse()
            .map_err(|_| format!("bad month in month key: '{s}'"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in key: '{s}'"));
        }
        Ok(Self { year, month })
    }
}

/// A review as extracted from the store feed, before any enrichment.
///
/// `review_id` is the stable identity: two rows with the same id are the
/// same review regardless of drift in any other column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReviewRow {
    pub review_id: String,
    pub posted_at: DateTime<FixedOffset>,
    pub rating: u8,
    pub content: String,
    pub app_version: Option<String>,
}

impl RawReviewRow {
    pub fn month(&self) -> MonthKey {
        MonthKey::from_datetime(&self.posted_at)
    }
}

/// Raw columns plus normalized text and the date/time split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanRow {
    pub review_id: String,
    pub posted_at: DateTime<FixedOffset>,
    pub rating: u8,
    pub content: String,
    pub app_version: Option<String>,
    pub review_date: NaiveDate,
    pub review_time: NaiveTime,
    pub content_clean: String,
}

impl CleanRow {
    pub fn from_raw(raw: RawReviewRow, content_clean: String) -> Self {
        let review_date = raw.posted_at.date_naive();
        let review_time = raw.posted_at.time();
        Self {
            review_id: raw.review_id,
            posted_at: raw.posted_at,
            rating: raw.rating,
            content: raw.content,
            app_version: raw.app_version,
            review_date,
            review_time,
            content_clean,
        }
    }
}

/// Clean columns plus the sentiment prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentRow {
    pub review_id: String,
    pub posted_at: DateTime<FixedOffset>,
    pub rating: u8,
    pub content: String,
    pub app_version: Option<String>,
    pub review_date: NaiveDate,
    pub review_time: NaiveTime,
    pub content_clean: String,
    pub sentiment_label: SentimentLabel,
    pub confidence: f64,
}

impl SentimentRow {
    pub fn from_clean(clean: CleanRow, sentiment_label: SentimentLabel, confidence: f64) -> Self {
        Self {
            review_id: clean.review_id,
            posted_at: clean.posted_at,
            rating: clean.rating,
            content: clean.content,
            app_version: clean.app_version,
            review_date: clean.review_date,
            review_time: clean.review_time,
            content_clean: clean.content_clean,
            sentiment_label,
            confidence,
        }
    }
}

/// Sentiment columns plus the topic assignment. `topic_id` -1 is reserved
/// for non-classified rows; the label tells the two reasons apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRow {
    pub review_id: String,
    pub posted_at: DateTime<FixedOffset>,
    pub rating: u8,
    pub content: String,
    pub app_version: Option<String>,
    pub review_date: NaiveDate,
    pub review_time: NaiveTime,
    pub content_clean: String,
    pub sentiment_label: SentimentLabel,
    pub confidence: f64,
    pub topic_id: i32,
    pub topic_label: String,
    pub topic_score: f64,
}

impl TopicRow {
    pub fn from_sentiment(
        row: SentimentRow,
        topic_id: i32,
        topic_label: String,
        topic_score: f64,
    ) -> Self {
        Self {
            review_id: row.review_id,
            posted_at: row.posted_at,
            rating: row.rating,
            content: row.content,
            app_version: row.app_version,
            review_date: row.review_date,
            review_time: row.review_time,
            content_clean: row.content_clean,
            sentiment_label: row.sentiment_label,
            confidence: row.confidence,
            topic_id,
            topic_label,
            topic_score,
        }
    }
}

/// One entry of a topic model's summary table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicInfo {
    pub topic_id: i32,
    pub label: String,
    pub frequency: usize,
}
