//! Idempotent merge of extracted reviews into monthly raw partitions.
//!
//! Extraction windows overlap on purpose, so the same review id arrives
//! again and again across runs. Merging concatenates the stored partition
//! with the new rows, collapses by id (last-seen content wins, the row
//! keeps its first-seen position), then overwrites the partition.
//! Running the same extraction twice leaves the partition byte-identical.

use crate::domain::{MonthKey, RawReviewRow};
use crate::error::Result;
use crate::observability::metrics;
use crate::storage::partitions::{read_partition_or_empty, write_partition, StagePrefix};
use crate::storage::BlobStore;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

#[derive(Debug, Default)]
pub struct MergeSummary {
    /// Months whose partitions were rewritten, ascending.
    pub months: Vec<MonthKey>,
    pub rows_written: usize,
    pub duplicates_dropped: usize,
}

/// Bucket extracted rows by the month they were posted in. A single run
/// may span a month boundary and must fan out into multiple partitions.
pub fn group_by_month(rows: Vec<RawReviewRow>) -> BTreeMap<MonthKey, Vec<RawReviewRow>> {
    let mut groups: BTreeMap<MonthKey, Vec<RawReviewRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.month()).or_default().push(row);
    }
    groups
}

/// Concatenate and collapse by `review_id`. Returns the merged rows and
/// the number of collapsed duplicates.
pub fn merge_rows(
    existing: Vec<RawReviewRow>,
    incoming: Vec<RawReviewRow>,
) -> (Vec<RawReviewRow>, usize) {
    let mut merged: Vec<RawReviewRow> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    let mut duplicates = 0usize;

    for row in existing.into_iter().chain(incoming) {
        match index_by_id.get(&row.review_id) {
            Some(&i) => {
                duplicates += 1;
                merged[i] = row;
            }
            None => {
                index_by_id.insert(row.review_id.clone(), merged.len());
                merged.push(row);
            }
        }
    }
    (merged, duplicates)
}

/// Merge freshly extracted rows into their monthly raw partitions,
/// overwriting each touched partition with the merged result.
pub async fn merge_into_store(
    store: &dyn BlobStore,
    rows: Vec<RawReviewRow>,
) -> Result<MergeSummary> {
    let mut summary = MergeSummary::default();
    if rows.is_empty() {
        info!("No reviews extracted in this window, nothing to merge");
        return Ok(summary);
    }

    for (month, incoming) in group_by_month(rows) {
        let existing: Vec<RawReviewRow> =
            read_partition_or_empty(store, StagePrefix::Raw, month).await?;
        let had_prior = !existing.is_empty();
        let (merged, duplicates) = merge_rows(existing, incoming);

        write_partition(store, StagePrefix::Raw, month, &merged).await?;
        if had_prior {
            info!(
                "Merged into existing partition {}: {} rows ({} duplicates collapsed)",
                month,
                merged.len(),
                duplicates
            );
        } else {
            info!("Created partition {}: {} rows", month, merged.len());
        }

        summary.rows_written += merged.len();
        summary.duplicates_dropped += duplicates;
        summary.months.push(month);
    }

    metrics::merge::rows_written(summary.rows_written as u64);
    metrics::merge::duplicates_dropped(summary.duplicates_dropped as u64);
    metrics::merge::partitions_touched(summary.months.len() as u64);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::partitions::read_partition;
    use crate::storage::InMemoryBlobStore;
    use chrono::DateTime;

    fn review(id: &str, posted_at: &str, content: &str) -> RawReviewRow {
        RawReviewRow {
            review_id: id.to_string(),
            posted_at: DateTime::parse_from_rfc3339(posted_at).unwrap(),
            rating: 3,
            content: content.to_string(),
            app_version: None,
        }
    }

    #[test]
    fn test_dedup_keeps_one_row_per_id() {
        let existing = vec![
            review("a", "2025-06-01T10:00:00-06:00", "old"),
            review("b", "2025-06-02T10:00:00-06:00", "keep"),
        ];
        let incoming = vec![
            review("a", "2025-06-01T10:00:00-06:00", "new"),
            review("c", "2025-06-03T10:00:00-06:00", "fresh"),
        ];

        let (merged, duplicates) = merge_rows(existing, incoming);
        assert_eq!(duplicates, 1);
        let ids: Vec<&str> = merged.iter().map(|r| r.review_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        // Last-seen content at first-seen position
        assert_eq!(merged[0].content, "new");
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let store = InMemoryBlobStore::new();
        let batch = vec![
            review("a", "2025-06-01T10:00:00-06:00", "uno"),
            review("b", "2025-06-02T10:00:00-06:00", "dos"),
            review("c", "2025-06-03T10:00:00-06:00", "tres"),
        ];

        merge_into_store(&store, batch.clone()).await.unwrap();
        let first: Vec<u8> = store
            .get("raw/playstore/2025_06/reviews_2025_06.csv")
            .await
            .unwrap();

        merge_into_store(&store, batch).await.unwrap();
        let second: Vec<u8> = store
            .get("raw/playstore/2025_06/reviews_2025_06.csv")
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_merge_fans_out_across_month_boundary() {
        let store = InMemoryBlobStore::new();
        let batch = vec![
            review("jun", "2025-06-30T23:00:00-06:00", "junio"),
            review("jul", "2025-07-01T01:00:00-06:00", "julio"),
        ];

        let summary = merge_into_store(&store, batch).await.unwrap();
        assert_eq!(
            summary.months,
            vec![MonthKey::new(2025, 6), MonthKey::new(2025, 7)]
        );

        let june: Vec<RawReviewRow> = read_partition(&store, StagePrefix::Raw, MonthKey::new(2025, 6))
            .await
            .unwrap();
        let july: Vec<RawReviewRow> = read_partition(&store, StagePrefix::Raw, MonthKey::new(2025, 7))
            .await
            .unwrap();
        assert_eq!(june.len(), 1);
        assert_eq!(july.len(), 1);
        assert_eq!(june[0].review_id, "jun");
        assert_eq!(july[0].review_id, "jul");
    }

    #[tokio::test]
    async fn test_overlapping_runs_union_by_id() {
        let store = InMemoryBlobStore::new();
        let first_run = vec![
            review("a", "2025-06-01T10:00:00-06:00", "a"),
            review("b", "2025-06-02T10:00:00-06:00", "b"),
            review("c", "2025-06-03T10:00:00-06:00", "c"),
        ];
        let second_run = vec![
            review("b", "2025-06-02T10:00:00-06:00", "b"),
            review("c", "2025-06-03T10:00:00-06:00", "c"),
            review("d", "2025-06-04T10:00:00-06:00", "d"),
        ];

        merge_into_store(&store, first_run).await.unwrap();
        let summary = merge_into_store(&store, second_run).await.unwrap();
        assert_eq!(summary.duplicates_dropped, 2);

        let rows: Vec<RawReviewRow> = read_partition(&store, StagePrefix::Raw, MonthKey::new(2025, 6))
            .await
            .unwrap();
        assert_eq!(rows.len(), 4);
    }
}
