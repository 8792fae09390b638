//! Partition key scheme and typed CSV codec over the blob store.
//!
//! Every stage owns one prefix; a monthly partition is one CSV blob at
//! `stage_prefix/YYYY_MM/stem_YYYY_MM.csv`. A stage either overwrites a
//! partition completely or leaves it untouched.

use super::BlobStore;
use crate::domain::MonthKey;
use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;

/// One step of the enrichment pipeline, each with its own durable
/// output prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePrefix {
    Raw,
    Clean,
    Sentiment,
    Topics,
}

impl StagePrefix {
    pub fn prefix(&self) -> &'static str {
        match self {
            StagePrefix::Raw => "raw/playstore",
            StagePrefix::Clean => "clean/playstore",
            StagePrefix::Sentiment => "sentiment/playstore",
            StagePrefix::Topics => "topics/playstore",
        }
    }

    fn file_stem(&self) -> &'static str {
        match self {
            StagePrefix::Raw => "reviews",
            StagePrefix::Clean => "clean_reviews",
            StagePrefix::Sentiment => "reviews_sentiment",
            StagePrefix::Topics => "topics",
        }
    }

    /// Full blob key of this stage's partition for a month.
    pub fn key(&self, month: MonthKey) -> String {
        format!("{}/{}/{}_{}.csv", self.prefix(), month, self.file_stem(), month)
    }
}

/// Decode a partition blob into typed rows.
pub fn decode_rows<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

/// Encode typed rows into CSV bytes, headers from field names.
pub fn encode_rows<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| PipelineError::Storage(format!("CSV buffer flush failed: {}", e)))
}

/// Read one monthly partition; absent key propagates as
/// `MissingPartition`.
pub async fn read_partition<T: DeserializeOwned>(
    store: &dyn BlobStore,
    stage: StagePrefix,
    month: MonthKey,
) -> Result<Vec<T>> {
    let bytes = store.get(&stage.key(month)).await?;
    decode_rows(&bytes)
}

/// Read one monthly partition, treating an absent key as an empty
/// partition. Any other storage fault still propagates.
pub async fn read_partition_or_empty<T: DeserializeOwned>(
    store: &dyn BlobStore,
    stage: StagePrefix,
    month: MonthKey,
) -> Result<Vec<T>> {
    match store.get(&stage.key(month)).await {
        Ok(bytes) => decode_rows(&bytes),
        Err(e) if e.is_missing_partition() => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Overwrite one monthly partition with the given rows.
pub async fn write_partition<T: Serialize>(
    store: &dyn BlobStore,
    stage: StagePrefix,
    month: MonthKey,
    rows: &[T],
) -> Result<()> {
    let bytes = encode_rows(rows)?;
    store.put(&stage.key(month), bytes).await
}

/// Enumerate the months a stage has partitions for, ascending.
pub async fn list_months(store: &dyn BlobStore, stage: StagePrefix) -> Result<Vec<MonthKey>> {
    let prefix = format!("{}/", stage.prefix());
    let keys = store.list(&prefix).await?;
    let mut months = BTreeSet::new();
    for key in keys {
        let rest = match key.strip_prefix(&prefix) {
            Some(rest) => rest,
            None => continue,
        };
        let segment = rest.split('/').next().unwrap_or("");
        if let Ok(month) = segment.parse::<MonthKey>() {
            months.insert(month);
        }
    }
    Ok(months.into_iter().collect())
}

/// Most recent month available for a stage, or `InsufficientData` when
/// the stage has never written anything.
pub async fn latest_month(store: &dyn BlobStore, stage: StagePrefix) -> Result<MonthKey> {
    list_months(store, stage)
        .await?
        .into_iter()
        .next_back()
        .ok_or_else(|| PipelineError::InsufficientData(stage.prefix().to_string()))
}
