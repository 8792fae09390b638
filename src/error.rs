use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV codec failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Review source fetch failed: {0}")]
    SourceFetch(String),

    #[error("No stored partition at key: {0}")]
    MissingPartition(String),

    #[error("Storage fault: {0}")]
    Storage(String),

    #[error("Classifier failed in {stage} stage: {message}")]
    Classifier { stage: String, message: String },

    #[error("No partitions available under prefix: {0}")]
    InsufficientData(String),
}

impl PipelineError {
    /// Missing-key reads are expected during merge; everything else
    /// under the storage umbrella is fatal.
    pub fn is_missing_partition(&self) -> bool {
        matches!(self, PipelineError::MissingPartition(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
