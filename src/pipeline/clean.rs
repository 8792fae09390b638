//! Deterministic text normalization and the cleaning stage.
//!
//! Two distinct vocabularies are removed at different points: the general
//! Spanish stop-word list strips *language* noise while cleaning, and the
//! domain list strips *app/brand* noise that would otherwise dominate
//! topic clusters. The lists are intentionally independent.

use crate::domain::{CleanRow, MonthKey, RawReviewRow};
use crate::error::Result;
use crate::observability::metrics;
use crate::storage::partitions::{read_partition, write_partition, StagePrefix};
use crate::storage::BlobStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// General Spanish stop-word list used during cleaning.
static SPANISH_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "algo", "alguna", "algunas", "alguno", "algunos", "ante", "antes", "aqui", "asi",
        "aunque", "cada", "como", "con", "contra", "cual", "cuando", "del", "desde", "donde",
        "dos", "durante", "ella", "ellas", "ellos", "entonces", "entre", "era", "eran", "ese",
        "eso", "esos", "esta", "estaba", "estamos", "estan", "estar", "este", "esto", "estos",
        "estoy", "fue", "fueron", "hace", "hacen", "hacer", "hasta", "hay", "las", "les",
        "los", "mas", "menos", "mia", "mientras", "mis", "mucho", "muy", "nada", "nos",
        "nosotros", "nuestra", "nuestro", "otra", "otras", "otro", "otros", "para", "pero",
        "poco", "por", "porque", "pues", "que", "quien", "sea", "ser", "sido", "sin", "sobre",
        "solo", "son", "soy", "sus", "tal", "tambien", "tanto", "tengo", "tiene", "tienen",
        "toda", "todas", "todo", "todos", "tras", "tus", "una", "unas", "uno", "unos",
        "usted", "vez", "yo",
    ]
    .into_iter()
    .collect()
});

/// Known typos in review text, corrected whole-word before topic modeling.
static TYPO_CORRECTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("execelente", "excelente"),
        ("exlecente", "excelente"),
        ("vien", "bien"),
        ("trasferencia", "transferencia"),
        ("tranferencia", "transferencia"),
        ("ultma", "ultima"),
        ("abrlr", "abrir"),
        ("seevicio", "servicio"),
        ("cervicio", "servicio"),
        ("servio", "servicio"),
        ("bue", "buen"),
    ]
    .into_iter()
    .collect()
});

static TYPO_RE: Lazy<Regex> = Lazy::new(|| {
    let alternation = TYPO_CORRECTIONS
        .keys()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({})\b", alternation)).unwrap()
});

/// Praise/filler vocabulary that carries no theme, removed before topic
/// modeling regardless of polarity.
static EXTRA_TOPIC_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "good", "very", "perfect", "super", "thanks", "thank", "like", "cool", "awesome",
        "excellent", "genial", "chido", "chevere", "gracias", "nice", "yeah", "great", "you",
        "that", "doy", "fantastico", "fantastica", "increible", "feliz", "felices", "mejor",
        "recomendable", "recomendada", "recomendado", "perfecto", "general", "facil", "usar",
        "apps", "eee", "love", "ohh",
    ]
    .into_iter()
    .collect()
});

/// App/brand vocabulary that would dominate every cluster, kept separate
/// from the language stop-word list used during cleaning.
static DOMAIN_TOPIC_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "aplicacion", "app", "banco", "bancaria", "banca", "interfaz", "usuario", "usuarios",
        "login", "sesion", "transferencias", "pago", "pagos", "funciona", "funcionar",
        "servicios", "bien", "excelente", "bueno", "buena", "mal", "mala", "malisimo",
        "malo", "util", "provechoso", "favorable", "seguridad", "seguro", "dinero",
        "movimientos", "sirve", "regular", "saca",
    ]
    .into_iter()
    .collect()
});

static PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]+").unwrap());
static TOPIC_PUNCTUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9 ]+").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip the accent from one character, NFKD-style, for the repertoire
/// that actually occurs in the feed.
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        _ => c,
    }
}

/// Normalize raw review text: lowercase, strip accents, drop punctuation,
/// remove Spanish stop-words and tokens of length ≤ 2, rejoin with single
/// spaces. Pure and deterministic; empty input yields an empty string.
pub fn normalize(raw_text: &str) -> String {
    let lowered: String = raw_text.to_lowercase().chars().map(fold_accent).collect();
    let stripped = PUNCTUATION_RE.replace_all(&lowered, " ");
    stripped
        .split_whitespace()
        .filter(|token| !SPANISH_STOP_WORDS.contains(token) && token.chars().count() > 2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Topic-modeling variant: correct the fixed typo table (whole-word,
/// case-insensitive) and re-normalize punctuation. Runs over already
/// cleaned text.
pub fn normalize_for_topics(content_clean: &str) -> String {
    let lowered = content_clean.to_lowercase();
    let corrected = TYPO_RE.replace_all(&lowered, |caps: &regex::Captures| {
        TYPO_CORRECTIONS[caps[1].to_lowercase().as_str()].to_string()
    });
    let stripped = TOPIC_PUNCTUATION_RE.replace_all(&corrected, " ");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Remove the extended domain stop-word set from a topic document.
pub fn strip_domain_stop_words(text: &str) -> String {
    text.split_whitespace()
        .filter(|token| {
            !EXTRA_TOPIC_STOP_WORDS.contains(token) && !DOMAIN_TOPIC_STOP_WORDS.contains(token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Clean one raw monthly partition into the clean stage: normalized text
/// plus the date/time split, columns appended to the raw schema.
pub async fn clean_month(store: &dyn BlobStore, month: MonthKey) -> Result<usize> {
    let raw: Vec<RawReviewRow> = read_partition(store, StagePrefix::Raw, month).await?;
    let total = raw.len();

    let mut empty_documents = 0u64;
    let rows: Vec<CleanRow> = raw
        .into_iter()
        .map(|r| {
            let content_clean = normalize(&r.content);
            if content_clean.is_empty() {
                empty_documents += 1;
            }
            CleanRow::from_raw(r, content_clean)
        })
        .collect();

    write_partition(store, StagePrefix::Clean, month, &rows).await?;
    metrics::clean::rows_processed(total as u64);
    metrics::clean::empty_documents(empty_documents);
    info!("Cleaned partition {}: {} rows", month, total);
    Ok(total)
}

/// Clean every partition the current run extracted into.
pub async fn clean_months(store: &dyn BlobStore, months: &[MonthKey]) -> Result<usize> {
    let mut total = 0;
    for &month in months {
        total += clean_month(store, month).await?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn test_normalize_is_deterministic() {
        let text = "¡La aplicación es EXCELENTE, muy útil para transferencias!";
        assert_eq!(normalize(text), normalize(text));
    }

    #[test]
    fn test_normalize_empty_input_yields_empty_string() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_normalize_strips_accents_punctuation_and_stop_words() {
        let out = normalize("¡La aplicación NO funcionó después de la actualización!");
        assert_eq!(out, "aplicacion funciono despues actualizacion");
    }

    #[test]
    fn test_normalize_drops_short_tokens() {
        // "ok" and "no" are ≤ 2 chars and must not survive
        let out = normalize("ok no sirve");
        assert_eq!(out, "sirve");
    }

    #[test]
    fn test_typo_correction_is_whole_word_and_case_insensitive() {
        let out = normalize_for_topics("Execelente seevicio de TRANFERENCIA");
        assert_eq!(out, "excelente servicio de transferencia");
        // A typo embedded in a longer word is left alone
        assert_eq!(normalize_for_topics("vienvenida"), "vienvenida");
    }

    #[test]
    fn test_domain_stop_words_are_independent_of_language_list() {
        // "aplicacion" survives general cleaning but not the domain pass
        let cleaned = normalize("la aplicación falla");
        assert!(cleaned.contains("aplicacion"));
        let doc = strip_domain_stop_words(&cleaned);
        assert_eq!(doc, "falla");
        // The general language list does not leak into the domain pass
        assert!(!SPANISH_STOP_WORDS.contains("aplicacion"));
    }

    #[tokio::test]
    async fn test_clean_month_appends_columns() {
        use crate::storage::partitions::{read_partition, write_partition};
        use crate::storage::InMemoryBlobStore;

        let store = InMemoryBlobStore::new();
        let month = MonthKey::new(2025, 6);
        let raw = vec![RawReviewRow {
            review_id: "r1".to_string(),
            posted_at: DateTime::parse_from_rfc3339("2025-06-15T09:10:11-06:00").unwrap(),
            rating: 2,
            content: "No puedo abrir la aplicación".to_string(),
            app_version: Some("5.1.0".to_string()),
        }];
        write_partition(&store, StagePrefix::Raw, month, &raw)
            .await
            .unwrap();

        let cleaned = clean_month(&store, month).await.unwrap();
        assert_eq!(cleaned, 1);

        let rows: Vec<CleanRow> = read_partition(&store, StagePrefix::Clean, month)
            .await
            .unwrap();
        assert_eq!(rows[0].review_id, "r1");
        assert_eq!(rows[0].content, "No puedo abrir la aplicación");
        assert_eq!(rows[0].content_clean, "puedo abrir aplicacion");
        assert_eq!(rows[0].review_date.to_string(), "2025-06-15");
        assert_eq!(rows[0].review_time.to_string(), "09:10:11");
    }
}
