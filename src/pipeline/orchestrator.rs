//! Sequential pipeline driver.
//!
//! `Extract -> Clean -> SentimentEnrich -> SelectMonth -> TopicEnrich`,
//! one run at a time, no orchestrator-level retries. The first stage
//! failure ends the run with the originating stage attached. All durable
//! state lives in the partitioned store; the orchestrator is re-created
//! fresh for every scheduled run.

use crate::config::Config;
use crate::domain::MonthKey;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::clean::clean_months;
use crate::pipeline::extract::WindowedExtractor;
use crate::pipeline::merge::merge_into_store;
use crate::pipeline::month_select::select_month;
use crate::pipeline::sentiment::{sentiment_months, SentimentClassifier};
use crate::pipeline::topics::{topics_for_month, TopicModelFactory};
use crate::source::ReviewSource;
use crate::storage::partitions::{latest_month, StagePrefix};
use crate::storage::BlobStore;
use chrono::Utc;
use std::fmt;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Clean,
    SentimentEnrich,
    SelectMonth,
    TopicEnrich,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Clean => "clean",
            Stage::SentimentEnrich => "sentiment_enrich",
            Stage::SelectMonth => "select_month",
            Stage::TopicEnrich => "topic_enrich",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal failure state: the stage that failed plus the cause.
#[derive(Debug, thiserror::Error)]
#[error("pipeline failed in {stage} stage: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

/// Terminal success state with per-stage counts for reporting.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub extracted: usize,
    pub duplicates_dropped: usize,
    /// Months whose raw partitions this run rewrote.
    pub months: Vec<MonthKey>,
    pub cleaned: usize,
    pub sentiment_rows: usize,
    pub topic_month: MonthKey,
    pub topic_rows: usize,
    pub topic_outliers: usize,
}

pub struct PipelineOrchestrator<'a> {
    store: &'a dyn BlobStore,
    source: &'a dyn ReviewSource,
    sentiment: &'a dyn SentimentClassifier,
    topic_models: &'a dyn TopicModelFactory,
    config: &'a Config,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(
        store: &'a dyn BlobStore,
        source: &'a dyn ReviewSource,
        sentiment: &'a dyn SentimentClassifier,
        topic_models: &'a dyn TopicModelFactory,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            source,
            sentiment,
            topic_models,
            config,
        }
    }

    /// Run the pipeline to one of its terminal states.
    pub async fn run(&self) -> std::result::Result<RunSummary, StageFailure> {
        let run_id = Uuid::new_v4();
        info!(
            "Starting pipeline run {} (sentiment model {})",
            run_id, self.config.sentiment.model_version
        );

        match self.run_stages(run_id).await {
            Ok(summary) => {
                metrics::pipeline::run_success();
                info!(
                    "Pipeline run {} done: {} extracted, {} cleaned, topics on {}",
                    run_id, summary.extracted, summary.cleaned, summary.topic_month
                );
                Ok(summary)
            }
            Err(failure) => {
                metrics::pipeline::run_error(failure.stage.as_str());
                error!("Pipeline run {} failed: {}", run_id, failure);
                Err(failure)
            }
        }
    }

    async fn run_stages(&self, run_id: Uuid) -> std::result::Result<RunSummary, StageFailure> {
        let (extracted, duplicates_dropped, months) = self
            .timed(Stage::Extract, self.extract_stage())
            .await?;

        let cleaned = self
            .timed(Stage::Clean, clean_months(self.store, &months))
            .await?;

        let sentiment_rows = self
            .timed(
                Stage::SentimentEnrich,
                sentiment_months(self.store, &months, self.sentiment),
            )
            .await?;

        let selected = self
            .timed(
                Stage::SelectMonth,
                select_month(self.store, self.config.topics.min_reviews),
            )
            .await?;

        let topic_month = selected.month;
        let report = self
            .timed(
                Stage::TopicEnrich,
                topics_for_month(
                    self.store,
                    topic_month,
                    selected.rows,
                    &self.config.topics,
                    self.topic_models,
                ),
            )
            .await?;

        Ok(RunSummary {
            run_id,
            extracted,
            duplicates_dropped,
            months,
            cleaned,
            sentiment_rows,
            topic_month,
            topic_rows: report.total,
            topic_outliers: report.outliers,
        })
    }

    async fn extract_stage(&self) -> Result<(usize, usize, Vec<MonthKey>)> {
        let extractor = WindowedExtractor::new(self.source, &self.config.source, &self.config.extract);
        let now = Utc::now().with_timezone(&extractor.timezone());
        let rows = extractor.extract(now).await?;
        let extracted = rows.len();

        let merge = merge_into_store(self.store, rows).await?;
        let months = if merge.months.is_empty() {
            // Quiet window: nothing extracted, refresh the newest raw
            // partition so downstream stages still run.
            vec![latest_month(self.store, StagePrefix::Raw).await?]
        } else {
            merge.months
        };
        Ok((extracted, merge.duplicates_dropped, months))
    }

    async fn timed<T>(
        &self,
        stage: Stage,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> std::result::Result<T, StageFailure> {
        let start = Instant::now();
        let result = fut.await;
        metrics::pipeline::stage_duration(stage.as_str(), start.elapsed().as_secs_f64());
        result.map_err(|source| StageFailure { stage, source })
    }
}
