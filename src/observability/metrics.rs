//! Simple metrics module for the review pipeline
//!
//! This module provides a straightforward API for recording metrics using
//! the standard Prometheus naming conventions.

use std::fmt;
use tracing::info;

/// Enum representing all metric names used in the system
/// This eliminates magic strings and provides compile-time safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Extract metrics
    ExtractPageFetchSuccess,
    ExtractPageFetchError,
    ExtractPagesFetched,
    ExtractReviewsKept,

    // Merge metrics
    MergeRowsWritten,
    MergeDuplicatesDropped,
    MergePartitionsTouched,

    // Clean metrics
    CleanRowsProcessed,
    CleanEmptyDocuments,

    // Sentiment metrics
    SentimentRowsScored,
    SentimentConfidence,

    // Topic metrics
    TopicsDocsShort,
    TopicsDocsClassified,
    TopicsOutliers,

    // Pipeline metrics
    PipelineRunsSuccess,
    PipelineRunsError,
    PipelineStageDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            // Extract metrics
            MetricName::ExtractPageFetchSuccess => "rp_extract_page_fetch_success_total",
            MetricName::ExtractPageFetchError => "rp_extract_page_fetch_error_total",
            MetricName::ExtractPagesFetched => "rp_extract_pages_fetched_total",
            MetricName::ExtractReviewsKept => "rp_extract_reviews_kept_total",

            // Merge metrics
            MetricName::MergeRowsWritten => "rp_merge_rows_written_total",
            MetricName::MergeDuplicatesDropped => "rp_merge_duplicates_dropped_total",
            MetricName::MergePartitionsTouched => "rp_merge_partitions_touched_total",

            // Clean metrics
            MetricName::CleanRowsProcessed => "rp_clean_rows_processed_total",
            MetricName::CleanEmptyDocuments => "rp_clean_empty_documents_total",

            // Sentiment metrics
            MetricName::SentimentRowsScored => "rp_sentiment_rows_scored_total",
            MetricName::SentimentConfidence => "rp_sentiment_confidence",

            // Topic metrics
            MetricName::TopicsDocsShort => "rp_topics_docs_short_total",
            MetricName::TopicsDocsClassified => "rp_topics_docs_classified_total",
            MetricName::TopicsOutliers => "rp_topics_outliers_total",

            // Pipeline metrics
            MetricName::PipelineRunsSuccess => "rp_pipeline_runs_success_total",
            MetricName::PipelineRunsError => "rp_pipeline_runs_error_total",
            MetricName::PipelineStageDuration => "rp_pipeline_stage_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Install the Prometheus recorder. Scheduled runs are scraped; nothing
/// is pushed.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    builder
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    info!("Metrics system initialized");
    Ok(())
}

// ============================================================================
// Extract Metrics
// ============================================================================

pub mod extract {
    use super::MetricName;

    /// Record a successful page fetch
    pub fn page_fetch_success() {
        ::metrics::counter!(MetricName::ExtractPageFetchSuccess.as_str()).increment(1);
    }

    /// Record a failed page fetch attempt
    pub fn page_fetch_error() {
        ::metrics::counter!(MetricName::ExtractPageFetchError.as_str()).increment(1);
    }

    /// Record total pages walked during a run
    pub fn pages_fetched(count: u64) {
        ::metrics::counter!(MetricName::ExtractPagesFetched.as_str()).increment(count);
    }

    /// Record reviews kept inside the window
    pub fn reviews_kept(count: u64) {
        ::metrics::counter!(MetricName::ExtractReviewsKept.as_str()).increment(count);
    }
}

// ============================================================================
// Merge Metrics
// ============================================================================

pub mod merge {
    use super::MetricName;

    /// Record rows written into a monthly partition
    pub fn rows_written(count: u64) {
        ::metrics::counter!(MetricName::MergeRowsWritten.as_str()).increment(count);
    }

    /// Record duplicate review ids collapsed during merge
    pub fn duplicates_dropped(count: u64) {
        ::metrics::counter!(MetricName::MergeDuplicatesDropped.as_str()).increment(count);
    }

    /// Record partitions rewritten by a run
    pub fn partitions_touched(count: u64) {
        ::metrics::counter!(MetricName::MergePartitionsTouched.as_str()).increment(count);
    }
}

// ============================================================================
// Clean Metrics
// ============================================================================

pub mod clean {
    use super::MetricName;

    /// Record rows normalized
    pub fn rows_processed(count: u64) {
        ::metrics::counter!(MetricName::CleanRowsProcessed.as_str()).increment(count);
    }

    /// Record rows whose normalized text came out empty
    pub fn empty_documents(count: u64) {
        ::metrics::counter!(MetricName::CleanEmptyDocuments.as_str()).increment(count);
    }
}

// ============================================================================
// Sentiment Metrics
// ============================================================================

pub mod sentiment {
    use super::MetricName;

    /// Record rows scored by the classifier
    pub fn rows_scored(count: u64) {
        ::metrics::counter!(MetricName::SentimentRowsScored.as_str()).increment(count);
    }

    /// Record a prediction confidence
    pub fn confidence(value: f64) {
        ::metrics::histogram!(MetricName::SentimentConfidence.as_str()).record(value);
    }
}

// ============================================================================
// Topic Metrics
// ============================================================================

pub mod topics {
    use super::MetricName;

    /// Record documents routed to the too-short bucket
    pub fn docs_short(count: u64) {
        ::metrics::counter!(MetricName::TopicsDocsShort.as_str()).increment(count);
    }

    /// Record documents that went through a topic model
    pub fn docs_classified(count: u64) {
        ::metrics::counter!(MetricName::TopicsDocsClassified.as_str()).increment(count);
    }

    /// Record documents the model could not cluster
    pub fn outliers(count: u64) {
        ::metrics::counter!(MetricName::TopicsOutliers.as_str()).increment(count);
    }
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;

    /// Record a completed run
    pub fn run_success() {
        ::metrics::counter!(MetricName::PipelineRunsSuccess.as_str()).increment(1);
    }

    /// Record a failed run, labeled by the stage that failed
    pub fn run_error(stage: &str) {
        ::metrics::counter!(
            MetricName::PipelineRunsError.as_str(),
            "stage" => stage.to_string()
        )
        .increment(1);
    }

    /// Record how long a stage took
    pub fn stage_duration(stage: &str, secs: f64) {
        ::metrics::histogram!(
            MetricName::PipelineStageDuration.as_str(),
            "stage" => stage.to_string()
        )
        .record(secs);
    }
}
