use serde::Deserialize;
use std::env;
use std::path::PathBuf;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub embeddings: EmbeddingsConfig,
    pub store: StoreConfig,
    pub indexing: IndexingConfig,
    pub retrieval: RetrievalConfig,
    pub sampling: SamplingConfig,
    pub reasoning: Option<ReasoningConfig>,
}

/// Filesystem layout of the built dataset and the studies under review.
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub raw_root: PathBuf,
    pub dataset_dir: PathBuf,
    pub guidelines_dir: PathBuf,
    pub current_dir: PathBuf,
}

impl DataConfig {
    pub fn documents_path(&self) -> PathBuf {
        self.dataset_dir.join("documents.jsonl")
    }

    pub fn labels_path(&self) -> PathBuf {
        self.dataset_dir.join("labels.csv")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dataset_dir.join("images")
    }

    pub fn current_frames_dir(&self) -> PathBuf {
        self.current_dir.join("frames")
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            raw_root: root.join("raw_data"),
            dataset_dir: root.join("dataset_built"),
            guidelines_dir: root.join("guidelines_txt"),
            current_dir: root.join("current"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            batch_size: 64,
            api_key: None,
            base_url: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `:memory:` keeps both collections in process; anything else is a libsql url.
    pub url: String,
    pub auth_token: Option<String>,
}

impl StoreConfig {
    pub fn is_in_memory(&self) -> bool {
        self.url == ":memory:"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub frames_per_case: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            frames_per_case: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    pub top_k_cases: usize,
    pub top_k_guidelines: usize,
    pub vote_top_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k_cases: 5,
            top_k_guidelines: 4,
            vote_top_n: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    pub query_frames: usize,
}

/// Vision-capable reasoning model configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_output_tokens: u32,
    pub frames_per_similar_case: usize,
    pub max_query_frames: usize,
    pub max_similar_frames: usize,
}

impl ReasoningConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            base_url: None,
            timeout_secs: 120,
            max_retries: 2,
            max_output_tokens: 900,
            frames_per_similar_case: 3,
            max_query_frames: 12,
            max_similar_frames: 12,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_root: PathBuf = env::var("CASELENS_DATA_DIR")
            .unwrap_or_else(|_| "data".to_string())
            .into();

        Self {
            data: DataConfig::from_root(data_root),
            embeddings: EmbeddingsConfig {
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "all-MiniLM-L6-v2".to_string()),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 384),
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 64),
                api_key: env::var("EMBEDDING_API_KEY").ok(),
                base_url: env::var("EMBEDDING_BASE_URL").ok(),
                timeout_secs: parse_env_or("EMBEDDING_TIMEOUT", 30),
                max_retries: parse_env_or("EMBEDDING_MAX_RETRIES", 3),
            },
            store: StoreConfig {
                url: env::var("VECTOR_STORE_URL").unwrap_or_else(|_| ":memory:".to_string()),
                auth_token: env::var("VECTOR_STORE_AUTH_TOKEN").ok(),
            },
            indexing: IndexingConfig {
                chunk_size: parse_env_or("CHUNK_SIZE", 800),
                chunk_overlap: parse_env_or("CHUNK_OVERLAP", 150),
                frames_per_case: parse_env_or("FRAMES_PER_CASE", 5),
            },
            retrieval: RetrievalConfig {
                top_k_cases: parse_env_or("TOPK_CASES", 5),
                top_k_guidelines: parse_env_or("TOPK_GUIDELINES", 4),
                vote_top_n: parse_env_or("VOTE_TOP_N", 3),
            },
            sampling: SamplingConfig {
                query_frames: parse_env_or("QUERY_FRAMES", 12),
            },
            reasoning: env::var("REASONING_MODEL").ok().map(|model| {
                let defaults = ReasoningConfig::new(model);
                ReasoningConfig {
                    api_key: env::var("REASONING_API_KEY")
                        .ok()
                        .or_else(|| env::var("OPENAI_API_KEY").ok()),
                    base_url: env::var("REASONING_BASE_URL").ok(),
                    timeout_secs: parse_env_or("REASONING_TIMEOUT", defaults.timeout_secs),
                    max_retries: parse_env_or("REASONING_MAX_RETRIES", defaults.max_retries),
                    max_output_tokens: parse_env_opt("REASONING_MAX_OUTPUT_TOKENS")
                        .unwrap_or(defaults.max_output_tokens),
                    frames_per_similar_case: parse_env_or(
                        "FRAMES_PER_SIMILAR_CASE",
                        defaults.frames_per_similar_case,
                    ),
                    max_query_frames: parse_env_or("MAX_QUERY_FRAMES", defaults.max_query_frames),
                    max_similar_frames: parse_env_or(
                        "MAX_SIMILAR_FRAMES",
                        defaults.max_similar_frames,
                    ),
                    ..defaults
                }
            }),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Rejects combinations the indexer cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.indexing.chunk_size == 0 {
            return Err(crate::error::CaseLensError::Validation(
                "CHUNK_SIZE must be greater than zero".to_string(),
            ));
        }
        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            return Err(crate::error::CaseLensError::Validation(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.indexing.chunk_overlap, self.indexing.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(crate::error::CaseLensError::Validation(
                "EMBEDDING_DIMENSIONS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Known embedding providers that use OpenAI-compatible APIs
const KNOWN_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio", "local"];

/// Known reasoning providers that use OpenAI-compatible APIs
pub const KNOWN_LLM_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Parse a model name into (provider, model) tuple.
pub fn parse_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}

/// Parse an LLM model name into (provider, model) tuple.
pub fn parse_llm_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_LLM_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_indexing_defaults() {
        std::env::remove_var("CHUNK_SIZE");
        std::env::remove_var("CHUNK_OVERLAP");
        let config = Config::default();
        assert_eq!(config.indexing.chunk_size, 800);
        assert_eq!(config.indexing.chunk_overlap, 150);
        assert_eq!(config.indexing.frames_per_case, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_reasoning_disabled_without_model() {
        std::env::remove_var("REASONING_MODEL");
        let config = Config::default();
        assert!(config.reasoning.is_none());
    }

    #[test]
    #[serial]
    fn test_reasoning_config_from_env() {
        std::env::set_var("REASONING_MODEL", "openai/gpt-4o");
        std::env::set_var("REASONING_TIMEOUT", "15");
        std::env::set_var("MAX_QUERY_FRAMES", "6");

        let config = Config::default();
        let reasoning = config.reasoning.expect("reasoning should be configured");
        assert_eq!(reasoning.model, "openai/gpt-4o");
        assert_eq!(reasoning.timeout_secs, 15);
        assert_eq!(reasoning.max_query_frames, 6);
        assert_eq!(reasoning.max_output_tokens, 900);

        std::env::remove_var("REASONING_MODEL");
        std::env::remove_var("REASONING_TIMEOUT");
        std::env::remove_var("MAX_QUERY_FRAMES");
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_falls_back() {
        std::env::set_var("TOPK_CASES", "many");
        let config = Config::default();
        assert_eq!(config.retrieval.top_k_cases, 5);
        std::env::remove_var("TOPK_CASES");
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_window() {
        let mut config = Config::default();
        config.indexing.chunk_size = 100;
        config.indexing.chunk_overlap = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_layout() {
        let data = DataConfig::from_root("/srv/data");
        assert_eq!(
            data.documents_path(),
            PathBuf::from("/srv/data/dataset_built/documents.jsonl")
        );
        assert_eq!(data.images_dir(), PathBuf::from("/srv/data/dataset_built/images"));
        assert_eq!(
            data.current_frames_dir(),
            PathBuf::from("/srv/data/current/frames")
        );
    }

    #[test]
    fn test_parse_provider_model() {
        assert_eq!(parse_provider_model("openai/text-embedding-3-small"), ("openai", "text-embedding-3-small"));
        assert_eq!(parse_provider_model("all-MiniLM-L6-v2"), ("local", "all-MiniLM-L6-v2"));
        assert_eq!(
            parse_provider_model("sentence-transformers/all-MiniLM-L6-v2"),
            ("local", "sentence-transformers/all-MiniLM-L6-v2")
        );
        assert_eq!(parse_llm_provider_model("ollama/llava"), ("ollama", "llava"));
    }
}
