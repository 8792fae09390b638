//! Sentiment enrichment: every cleaned row gets a polarity label and a
//! confidence score. The model is opaque behind `SentimentClassifier` so
//! pipeline correctness can be tested with deterministic stubs.

use crate::domain::{CleanRow, MonthKey, SentimentLabel, SentimentRow};
use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::storage::partitions::{read_partition, write_partition, StagePrefix};
use crate::storage::BlobStore;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use tracing::info;

/// Opaque binary sentiment model: a label and a confidence in [0, 1]
/// for any normalized document.
pub trait SentimentClassifier: Send + Sync {
    fn predict(&self, text: &str) -> Result<SentimentLabel>;
    fn predict_confidence(&self, text: &str) -> Result<f64>;
}

static POSITIVE_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "excelente", "buena", "bueno", "buenisima", "encanta", "gusta", "facil", "rapida",
        "rapido", "util", "practica", "practico", "comoda", "comodo", "segura", "confiable",
        "recomiendo", "mejor", "perfecta", "perfecto", "agil", "eficiente", "sencilla",
        "sencillo", "genial", "gracias",
    ]
    .into_iter()
    .collect()
});

static NEGATIVE_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "mala", "malo", "pesima", "pesimo", "falla", "fallas", "fallando", "error", "errores",
        "lenta", "lento", "problema", "problemas", "bloquea", "bloqueada", "cierra", "peor",
        "terrible", "horrible", "inservible", "fraude", "robo", "cobra", "cobran", "tarda",
        "imposible", "nunca", "corrijan", "urge", "molesto", "molesta",
    ]
    .into_iter()
    .collect()
});

/// Deterministic lexicon-based classifier standing in for the trained
/// model. Label follows the dominant polarity of the matched terms; a
/// text with no evidence (or a tie) reads as positive at confidence 0.5.
pub struct LexiconSentiment;

impl LexiconSentiment {
    pub fn new() -> Self {
        Self
    }

    fn hits(&self, text: &str) -> (usize, usize) {
        let mut pos = 0;
        let mut neg = 0;
        for token in text.split_whitespace() {
            if POSITIVE_TERMS.contains(token) {
                pos += 1;
            }
            if NEGATIVE_TERMS.contains(token) {
                neg += 1;
            }
        }
        (pos, neg)
    }
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentClassifier for LexiconSentiment {
    fn predict(&self, text: &str) -> Result<SentimentLabel> {
        let (pos, neg) = self.hits(text);
        if neg > pos {
            Ok(SentimentLabel::Neg)
        } else {
            Ok(SentimentLabel::Pos)
        }
    }

    fn predict_confidence(&self, text: &str) -> Result<f64> {
        let (pos, neg) = self.hits(text);
        let total = pos + neg;
        if total == 0 {
            return Ok(0.5);
        }
        let margin = pos.abs_diff(neg) as f64 / total as f64;
        Ok(0.5 + 0.5 * margin)
    }
}

/// Score every row of a clean partition. No row is dropped.
pub fn apply_sentiment(
    rows: Vec<CleanRow>,
    classifier: &dyn SentimentClassifier,
    month: MonthKey,
) -> Result<Vec<SentimentRow>> {
    let mut scored = Vec::with_capacity(rows.len());
    for row in rows {
        let label = classifier
            .predict(&row.content_clean)
            .map_err(|e| stage_error(month, e))?;
        let confidence = classifier
            .predict_confidence(&row.content_clean)
            .map_err(|e| stage_error(month, e))?;
        metrics::sentiment::confidence(confidence);
        scored.push(SentimentRow::from_clean(row, label, confidence));
    }
    Ok(scored)
}

fn stage_error(month: MonthKey, cause: PipelineError) -> PipelineError {
    PipelineError::Classifier {
        stage: "sentiment".to_string(),
        message: format!("partition {}: {}", month, cause),
    }
}

/// Enrich one clean monthly partition with sentiment predictions. The
/// partition is written whole or not at all.
pub async fn sentiment_month(
    store: &dyn BlobStore,
    month: MonthKey,
    classifier: &dyn SentimentClassifier,
) -> Result<usize> {
    let clean: Vec<CleanRow> = read_partition(store, StagePrefix::Clean, month).await?;
    let scored = apply_sentiment(clean, classifier, month)?;
    let total = scored.len();

    write_partition(store, StagePrefix::Sentiment, month, &scored).await?;
    metrics::sentiment::rows_scored(total as u64);
    info!("Applied sentiment to partition {}: {} rows", month, total);
    Ok(total)
}

/// Enrich every partition the current run touched.
pub async fn sentiment_months(
    store: &dyn BlobStore,
    months: &[MonthKey],
    classifier: &dyn SentimentClassifier,
) -> Result<usize> {
    let mut total = 0;
    for &month in months {
        total += sentiment_month(store, month, classifier).await?;
    }
    Ok(total)
}
