//! Topic enrichment over the selected sentiment partition.
//!
//! Documents too short to classify never reach a model: they go straight
//! to the reserved id -1 under the fixed "comentario_corto" label. The
//! rest is split by polarity and fitted by separate models, because
//! positive and negative reviews cluster around different themes and
//! mixing them dilutes both. A model's own -1 bucket is relabeled
//! "outlier": could-not-cluster and too-short must stay distinguishable
//! downstream.

use crate::config::TopicsConfig;
use crate::domain::{MonthKey, SentimentLabel, SentimentRow, TopicInfo, TopicRow};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::clean::{normalize_for_topics, strip_domain_stop_words};
use crate::storage::partitions::{write_partition, StagePrefix};
use crate::storage::BlobStore;
use std::collections::HashMap;
use tracing::info;

/// Reserved id for rows no model classified, for either reason.
pub const UNCLASSIFIED_TOPIC_ID: i32 = -1;
/// Label for documents below the token threshold.
pub const SHORT_DOC_LABEL: &str = "comentario_corto";
/// Label for documents a model could not cluster.
pub const OUTLIER_LABEL: &str = "outlier";

/// Per-document output of a fitted topic model.
#[derive(Debug, Clone)]
pub struct TopicAssignment {
    pub topic_id: i32,
    pub confidence: f64,
}

/// Opaque topic model: fit on a document batch, return one assignment
/// per document plus a summary table of the discovered topics.
pub trait TopicModel: Send {
    fn fit_transform(&mut self, documents: &[String]) -> Result<Vec<TopicAssignment>>;
    fn topic_info(&self) -> Vec<TopicInfo>;
}

/// Builds a fresh model per polarity; distinct topic budgets for POS and
/// NEG content.
pub trait TopicModelFactory: Send + Sync {
    fn create(&self, polarity: SentimentLabel, max_topics: usize) -> Box<dyn TopicModel>;
}

/// Deterministic co-occurrence model standing in for the trained topic
/// model. Topics are seeded by the terms with the highest document
/// frequency; each document joins the strongest seed it contains, and a
/// document containing none is an outlier.
pub struct SeedTermTopicModel {
    max_topics: usize,
    topics: Vec<TopicInfo>,
}

impl SeedTermTopicModel {
    pub fn new(max_topics: usize) -> Self {
        Self {
            max_topics,
            topics: Vec::new(),
        }
    }

    fn seed_terms(&self, docs: &[Vec<&str>]) -> Vec<String> {
        let mut document_frequency: HashMap<&str, usize> = HashMap::new();
        for tokens in docs {
            let mut seen: Vec<&str> = tokens.clone();
            seen.sort_unstable();
            seen.dedup();
            for token in seen {
                *document_frequency.entry(token).or_insert(0) += 1;
            }
        }

        // A term appearing in a single document is not a cluster
        let mut candidates: Vec<(&str, usize)> = document_frequency
            .into_iter()
            .filter(|(_, df)| *df >= 2)
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        candidates
            .into_iter()
            .take(self.max_topics)
            .map(|(term, _)| term.to_string())
            .collect()
    }

    fn label_for(topic_id: i32, seed: &str, member_docs: &[&Vec<&str>]) -> String {
        let mut co_occurrence: HashMap<&str, usize> = HashMap::new();
        for tokens in member_docs {
            for token in tokens.iter().filter(|t| **t != seed) {
                *co_occurrence.entry(*token).or_insert(0) += 1;
            }
        }
        let mut terms: Vec<(&str, usize)> = co_occurrence.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let mut label = format!("{}_{}", topic_id, seed);
        for (term, _) in terms.into_iter().take(2) {
            label.push('_');
            label.push_str(term);
        }
        label
    }
}

impl TopicModel for SeedTermTopicModel {
    fn fit_transform(&mut self, documents: &[String]) -> Result<Vec<TopicAssignment>> {
        let docs: Vec<Vec<&str>> = documents
            .iter()
            .map(|d| d.split_whitespace().collect())
            .collect();
        let seeds = self.seed_terms(&docs);

        let mut assignments = Vec::with_capacity(docs.len());
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); seeds.len()];
        let mut outliers = 0usize;

        for (doc_idx, tokens) in docs.iter().enumerate() {
            let assigned = seeds
                .iter()
                .position(|seed| tokens.iter().any(|t| *t == seed.as_str()));
            match assigned {
                Some(topic_idx) => {
                    let seed = seeds[topic_idx].as_str();
                    let occurrences = tokens.iter().filter(|t| **t == seed).count();
                    let confidence = if tokens.is_empty() {
                        0.0
                    } else {
                        occurrences as f64 / tokens.len() as f64
                    };
                    members[topic_idx].push(doc_idx);
                    assignments.push(TopicAssignment {
                        topic_id: topic_idx as i32,
                        confidence,
                    });
                }
                None => {
                    outliers += 1;
                    assignments.push(TopicAssignment {
                        topic_id: UNCLASSIFIED_TOPIC_ID,
                        confidence: 0.0,
                    });
                }
            }
        }

        let mut topics = Vec::new();
        if outliers > 0 {
            topics.push(TopicInfo {
                topic_id: UNCLASSIFIED_TOPIC_ID,
                label: OUTLIER_LABEL.to_string(),
                frequency: outliers,
            });
        }
        for (topic_idx, seed) in seeds.iter().enumerate() {
            let member_docs: Vec<&Vec<&str>> =
                members[topic_idx].iter().map(|&i| &docs[i]).collect();
            topics.push(TopicInfo {
                topic_id: topic_idx as i32,
                label: Self::label_for(topic_idx as i32, seed, &member_docs),
                frequency: member_docs.len(),
            });
        }
        self.topics = topics;

        Ok(assignments)
    }

    fn topic_info(&self) -> Vec<TopicInfo> {
        self.topics.clone()
    }
}

/// Default factory producing the co-occurrence model.
pub struct SeedTermFactory;

impl TopicModelFactory for SeedTermFactory {
    fn create(&self, _polarity: SentimentLabel, max_topics: usize) -> Box<dyn TopicModel> {
        Box::new(SeedTermTopicModel::new(max_topics))
    }
}

#[derive(Debug)]
pub struct TopicStageReport {
    pub month: MonthKey,
    pub total: usize,
    pub short_docs: usize,
    pub pos_docs: usize,
    pub neg_docs: usize,
    pub outliers: usize,
}

fn classify_branch(
    month: MonthKey,
    polarity: SentimentLabel,
    branch: Vec<(SentimentRow, String)>,
    model: &mut dyn TopicModel,
) -> Result<(Vec<TopicRow>, usize)> {
    if branch.is_empty() {
        info!("No {} reviews above the token threshold for {}", polarity, month);
        return Ok((Vec::new(), 0));
    }

    let documents: Vec<String> = branch
        .iter()
        .map(|(_, text)| strip_domain_stop_words(text))
        .collect();
    let assignments = model.fit_transform(&documents).map_err(|e| {
        PipelineError::Classifier {
            stage: format!("topics/{}", polarity),
            message: format!("partition {}: {}", month, e),
        }
    })?;

    let labels: HashMap<i32, String> = model
        .topic_info()
        .into_iter()
        .map(|t| (t.topic_id, t.label))
        .collect();

    let mut rows = Vec::with_capacity(branch.len());
    let mut outliers = 0usize;
    for ((row, _), assignment) in branch.into_iter().zip(assignments) {
        let label = if assignment.topic_id == UNCLASSIFIED_TOPIC_ID {
            outliers += 1;
            OUTLIER_LABEL.to_string()
        } else {
            labels
                .get(&assignment.topic_id)
                .cloned()
                .unwrap_or_else(|| assignment.topic_id.to_string())
        };
        rows.push(TopicRow::from_sentiment(
            row,
            assignment.topic_id,
            label,
            assignment.confidence,
        ));
    }
    Ok((rows, outliers))
}

/// Run topic enrichment over one sentiment partition and persist the
/// topics partition. The partition is written whole or not at all.
pub async fn topics_for_month(
    store: &dyn BlobStore,
    month: MonthKey,
    rows: Vec<SentimentRow>,
    config: &TopicsConfig,
    factory: &dyn TopicModelFactory,
) -> Result<TopicStageReport> {
    let total = rows.len();
    let mut short_rows: Vec<TopicRow> = Vec::new();
    let mut pos_branch: Vec<(SentimentRow, String)> = Vec::new();
    let mut neg_branch: Vec<(SentimentRow, String)> = Vec::new();

    for row in rows {
        let topic_text = normalize_for_topics(&row.content_clean);
        let token_count = topic_text.split_whitespace().count();
        if token_count < config.min_tokens {
            short_rows.push(TopicRow::from_sentiment(
                row,
                UNCLASSIFIED_TOPIC_ID,
                SHORT_DOC_LABEL.to_string(),
                0.0,
            ));
        } else {
            match row.sentiment_label {
                SentimentLabel::Pos => pos_branch.push((row, topic_text)),
                SentimentLabel::Neg => neg_branch.push((row, topic_text)),
            }
        }
    }

    info!(
        "Month {}: {} total, {} pos, {} neg, {} short",
        month,
        total,
        pos_branch.len(),
        neg_branch.len(),
        short_rows.len()
    );

    let pos_docs = pos_branch.len();
    let neg_docs = neg_branch.len();
    let short_docs = short_rows.len();

    let mut pos_model = factory.create(SentimentLabel::Pos, config.pos_topics);
    let (pos_rows, pos_outliers) =
        classify_branch(month, SentimentLabel::Pos, pos_branch, pos_model.as_mut())?;

    let mut neg_model = factory.create(SentimentLabel::Neg, config.neg_topics);
    let (neg_rows, neg_outliers) =
        classify_branch(month, SentimentLabel::Neg, neg_branch, neg_model.as_mut())?;

    let mut all_rows = short_rows;
    all_rows.extend(pos_rows);
    all_rows.extend(neg_rows);
    write_partition(store, StagePrefix::Topics, month, &all_rows).await?;

    let outliers = pos_outliers + neg_outliers;
    metrics::topics::docs_short(short_docs as u64);
    metrics::topics::docs_classified((pos_docs + neg_docs) as u64);
    metrics::topics::outliers(outliers as u64);
    info!(
        "Topics written for {}: {} rows ({} outliers)",
        month, total, outliers
    );

    Ok(TopicStageReport {
        month,
        total,
        short_docs,
        pos_docs,
        neg_docs,
        outliers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::partitions::read_partition;
    use crate::storage::InMemoryBlobStore;
    use chrono::DateTime;
    use std::sync::{Arc, Mutex};

    fn sentiment_row(id: &str, content_clean: &str, label: SentimentLabel) -> SentimentRow {
        let posted = DateTime::parse_from_rfc3339("2025-06-10T08:00:00-06:00").unwrap();
        SentimentRow {
            review_id: id.to_string(),
            posted_at: posted,
            rating: 3,
            content: content_clean.to_string(),
            app_version: None,
            review_date: posted.date_naive(),
            review_time: posted.time(),
            content_clean: content_clean.to_string(),
            sentiment_label: label,
            confidence: 0.9,
        }
    }

    /// Factory that records every batch handed to a model and assigns
    /// everything to the outlier bucket.
    struct RecordingFactory {
        batches: Arc<Mutex<Vec<(SentimentLabel, usize, Vec<String>)>>>,
    }

    impl RecordingFactory {
        fn new() -> Self {
            Self {
                batches: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    struct RecordingModel {
        polarity: SentimentLabel,
        max_topics: usize,
        batches: Arc<Mutex<Vec<(SentimentLabel, usize, Vec<String>)>>>,
    }

    impl TopicModel for RecordingModel {
        fn fit_transform(&mut self, documents: &[String]) -> Result<Vec<TopicAssignment>> {
            self.batches.lock().unwrap().push((
                self.polarity,
                self.max_topics,
                documents.to_vec(),
            ));
            Ok(documents
                .iter()
                .map(|_| TopicAssignment {
                    topic_id: UNCLASSIFIED_TOPIC_ID,
                    confidence: 0.0,
                })
                .collect())
        }

        fn topic_info(&self) -> Vec<TopicInfo> {
            Vec::new()
        }
    }

    impl TopicModelFactory for RecordingFactory {
        fn create(&self, polarity: SentimentLabel, max_topics: usize) -> Box<dyn TopicModel> {
            Box::new(RecordingModel {
                polarity,
                max_topics,
                batches: Arc::clone(&self.batches),
            })
        }
    }

    fn config() -> TopicsConfig {
        TopicsConfig::default()
    }

    #[tokio::test]
    async fn test_short_documents_never_reach_a_model() {
        let store = InMemoryBlobStore::new();
        let factory = RecordingFactory::new();
        let rows = vec![
            sentiment_row("short", "muy corto", SentimentLabel::Pos),
            sentiment_row(
                "long",
                "cobro duplicado sin aviso alguno",
                SentimentLabel::Neg,
            ),
        ];

        let report = topics_for_month(&store, MonthKey::new(2025, 6), rows, &config(), &factory)
            .await
            .unwrap();
        assert_eq!(report.short_docs, 1);

        let batches = factory.batches.lock().unwrap();
        let all_docs: Vec<&String> = batches.iter().flat_map(|(_, _, docs)| docs).collect();
        assert_eq!(all_docs.len(), 1);
        assert!(all_docs[0].contains("cobro"));

        let persisted: Vec<TopicRow> =
            read_partition(&store, StagePrefix::Topics, MonthKey::new(2025, 6))
                .await
                .unwrap();
        let short = persisted.iter().find(|r| r.review_id == "short").unwrap();
        assert_eq!(short.topic_id, UNCLASSIFIED_TOPIC_ID);
        assert_eq!(short.topic_label, SHORT_DOC_LABEL);
    }

    #[tokio::test]
    async fn test_branches_split_by_sentiment_with_distinct_budgets() {
        let store = InMemoryBlobStore::new();
        let factory = RecordingFactory::new();
        let rows = vec![
            sentiment_row("p1", "tarjeta digital muy practica", SentimentLabel::Pos),
            sentiment_row("n1", "cobro duplicado sin aviso", SentimentLabel::Neg),
            sentiment_row("n2", "transferencia rechazada sin motivo", SentimentLabel::Neg),
        ];

        topics_for_month(&store, MonthKey::new(2025, 6), rows, &config(), &factory)
            .await
            .unwrap();

        let batches = factory.batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        let (pos_polarity, pos_budget, pos_docs) = &batches[0];
        let (neg_polarity, neg_budget, neg_docs) = &batches[1];
        assert_eq!(*pos_polarity, SentimentLabel::Pos);
        assert_eq!(*pos_budget, 20);
        assert_eq!(pos_docs.len(), 1);
        assert_eq!(*neg_polarity, SentimentLabel::Neg);
        assert_eq!(*neg_budget, 30);
        assert_eq!(neg_docs.len(), 2);
    }

    #[tokio::test]
    async fn test_model_outliers_get_outlier_label_not_short_label() {
        let store = InMemoryBlobStore::new();
        let factory = RecordingFactory::new();
        let rows = vec![sentiment_row(
            "n1",
            "cobro duplicado sin aviso alguno",
            SentimentLabel::Neg,
        )];

        topics_for_month(&store, MonthKey::new(2025, 6), rows, &config(), &factory)
            .await
            .unwrap();

        let persisted: Vec<TopicRow> =
            read_partition(&store, StagePrefix::Topics, MonthKey::new(2025, 6))
                .await
                .unwrap();
        assert_eq!(persisted[0].topic_id, UNCLASSIFIED_TOPIC_ID);
        assert_eq!(persisted[0].topic_label, OUTLIER_LABEL);
        assert_ne!(persisted[0].topic_label, SHORT_DOC_LABEL);
    }

    #[test]
    fn test_seed_model_is_deterministic() {
        let docs: Vec<String> = [
            "transferencia rechazada error",
            "transferencia tarda demasiado",
            "token error al entrar",
            "token no llega",
            "tema sin relacion alguna",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut model_a = SeedTermTopicModel::new(10);
        let mut model_b = SeedTermTopicModel::new(10);
        let a = model_a.fit_transform(&docs).unwrap();
        let b = model_b.fit_transform(&docs).unwrap();

        let ids_a: Vec<i32> = a.iter().map(|x| x.topic_id).collect();
        let ids_b: Vec<i32> = b.iter().map(|x| x.topic_id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_seed_model_clusters_shared_terms_and_flags_outliers() {
        let docs: Vec<String> = [
            "transferencia rechazada siempre",
            "transferencia tarda demasiado",
            "token error al entrar",
            "token no llega",
            "tema sin relacion alguna",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut model = SeedTermTopicModel::new(10);
        let assignments = model.fit_transform(&docs).unwrap();

        // The two transferencia docs share a topic, the two token docs share one
        assert_eq!(assignments[0].topic_id, assignments[1].topic_id);
        assert_eq!(assignments[2].topic_id, assignments[3].topic_id);
        assert_ne!(assignments[0].topic_id, assignments[2].topic_id);
        // The unrelated doc is an outlier
        assert_eq!(assignments[4].topic_id, UNCLASSIFIED_TOPIC_ID);

        let info = model.topic_info();
        let outlier = info.iter().find(|t| t.topic_id == -1).unwrap();
        assert_eq!(outlier.label, OUTLIER_LABEL);
        assert_eq!(outlier.frequency, 1);
    }
}
