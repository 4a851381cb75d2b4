use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaseLensError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("API rate limit exceeded, retry after {retry_after:?} seconds")]
    ApiRateLimit { retry_after: Option<u64> },

    #[error("API authentication error: {0}")]
    ApiAuth(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Pixel data decode failure: {0}")]
    DecodeFailure(String),

    #[error("Anonymization violation in case {case_id}: {reason}")]
    AnonymizationViolation { case_id: String, reason: String },

    #[error("Collection '{collection}' unavailable: {reason}")]
    CollectionUnavailable { collection: String, reason: String },

    #[error("Identity collision: case {case_id} derived from both '{first}' and '{second}'")]
    IdentityCollision {
        case_id: String,
        first: String,
        second: String,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM rate limit exceeded, retry after {retry_after:?} seconds")]
    LlmRateLimit { retry_after: Option<u64> },

    #[error("Reasoning unavailable: {0}")]
    ReasoningUnavailable(String),

    #[error("Reasoning timed out after {timeout_secs} seconds")]
    ReasoningTimeout { timeout_secs: u64 },
}

impl CaseLensError {
    /// Whether the failure may be absorbed by degrading functionality.
    ///
    /// Anonymization and identity failures are never recoverable: they abort
    /// the write that produced them.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CaseLensError::DecodeFailure(_)
            | CaseLensError::CollectionUnavailable { .. }
            | CaseLensError::ReasoningUnavailable(_)
            | CaseLensError::ReasoningTimeout { .. }
            | CaseLensError::LlmRateLimit { .. }
            | CaseLensError::Llm(_) => true,
            CaseLensError::AnonymizationViolation { .. }
            | CaseLensError::IdentityCollision { .. } => false,
            _ => false,
        }
    }

    pub fn collection_unavailable(collection: &str, reason: impl Into<String>) -> Self {
        CaseLensError::CollectionUnavailable {
            collection: collection.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CaseLensError>;
