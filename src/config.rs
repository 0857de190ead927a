use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for the analysis timeout and deadline settings (one day).
pub const MAX_ANALYSIS_SECS: u64 = 86_400;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the caution server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Backend holding submitted document text.
    pub cache_provider: CacheProvider,
    /// Base URL of the Redis REST endpoint (required for [`CacheProvider::Rest`]).
    pub cache_rest_url: Option<String>,
    /// Bearer token for the Redis REST endpoint.
    pub cache_rest_token: Option<String>,
    /// Lifetime of cached document text.
    pub cache_ttl_secs: u64,
    /// SQLite path for persisted analysis results (`:memory:` allowed).
    pub result_database_path: String,
    /// Language-model backend used for chunk analysis and summaries.
    pub llm_provider: LlmProvider,
    /// API key for hosted language-model providers.
    pub llm_api_key: Option<String>,
    /// Optional base URL override for the language-model provider.
    pub llm_base_url: Option<String>,
    /// Model used for per-chunk analysis.
    pub analysis_model: String,
    /// Model used for the final summary.
    pub summary_model: String,
    /// Upper bound (in characters) for analysis chunks.
    pub chunk_max_chars: usize,
    /// Maximum number of chunk analyses in flight at once.
    pub analysis_concurrency: usize,
    /// Timeout applied to a single chunk analysis call.
    pub analysis_call_timeout_secs: u64,
    /// Deadline for the whole fan-out, measured from dispatch.
    pub analysis_deadline_secs: u64,
    /// Persist sentinel summaries; when off, a later request reruns the analysis.
    pub persist_sentinel_results: bool,
    /// Route analysis text through the Qdrant context store first.
    pub vector_context_enabled: bool,
    /// Base URL of the Qdrant instance.
    pub qdrant_url: Option<String>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used by the vector context path.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the local Ollama runtime.
    pub ollama_url: Option<String>,
    /// Chunk size (characters) used when storing context vectors.
    pub vector_chunk_chars: usize,
    /// Overlap (characters) between neighbouring context chunks.
    pub vector_chunk_overlap: usize,
    /// Append-mode log file; when unset logs rotate daily under `logs/`.
    pub log_file: Option<String>,
}

/// Supported storage backends for submitted document text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheProvider {
    /// Process-local map with expiry; contents vanish on restart.
    Memory,
    /// Redis reached through its REST interface.
    Rest,
}

/// Supported language-model backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    /// Groq's OpenAI-compatible chat completions API.
    Groq,
    /// OpenAI chat completions API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Supported embedding backends for the vector context path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Deterministic byte-hash embeddings computed in process.
    Hash,
    /// Local Ollama runtime.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            server_port: parse_optional("SERVER_PORT")?,
            cache_provider: parse_or("CACHE_PROVIDER", CacheProvider::Memory)?,
            cache_rest_url: load_env_optional("CACHE_REST_URL"),
            cache_rest_token: load_env_optional("CACHE_REST_TOKEN"),
            cache_ttl_secs: parse_or("CACHE_TTL_SECS", 86_400)?,
            result_database_path: load_env_optional("RESULT_DATABASE_PATH")
                .unwrap_or_else(|| "caution.db".to_string()),
            llm_provider: parse_or("LLM_PROVIDER", LlmProvider::Groq)?,
            llm_api_key: load_env_optional("LLM_API_KEY"),
            llm_base_url: load_env_optional("LLM_BASE_URL"),
            analysis_model: load_env_optional("ANALYSIS_MODEL")
                .unwrap_or_else(|| "llama-3.3-70b-versatile".to_string()),
            summary_model: load_env_optional("SUMMARY_MODEL")
                .unwrap_or_else(|| "llama3-8b-8192".to_string()),
            chunk_max_chars: parse_or("CHUNK_MAX_CHARS", 15_000)?,
            analysis_concurrency: parse_or("ANALYSIS_CONCURRENCY", 4)?,
            analysis_call_timeout_secs: parse_or("ANALYSIS_CALL_TIMEOUT_SECS", 60)?,
            analysis_deadline_secs: parse_or("ANALYSIS_DEADLINE_SECS", 300)?,
            persist_sentinel_results: parse_flag("PERSIST_SENTINEL_RESULTS", true)?,
            vector_context_enabled: parse_flag("VECTOR_CONTEXT_ENABLED", false)?,
            qdrant_url: load_env_optional("QDRANT_URL"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: parse_or("EMBEDDING_PROVIDER", EmbeddingProvider::Hash)?,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "nomic-embed-text".to_string()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 768)?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            vector_chunk_chars: parse_or("VECTOR_CHUNK_CHARS", 1000)?,
            vector_chunk_overlap: parse_or("VECTOR_CHUNK_OVERLAP", 200)?,
            log_file: load_env_optional("CAUTION_LOG_FILE"),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements that cannot be expressed per variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_provider == CacheProvider::Rest {
            if self.cache_rest_url.is_none() {
                return Err(ConfigError::MissingVariable("CACHE_REST_URL".into()));
            }
            if self.cache_rest_token.is_none() {
                return Err(ConfigError::MissingVariable("CACHE_REST_TOKEN".into()));
            }
        }
        if matches!(self.llm_provider, LlmProvider::Groq | LlmProvider::OpenAI)
            && self.llm_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("LLM_API_KEY".into()));
        }
        if self.chunk_max_chars == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_MAX_CHARS".into()));
        }
        if self.analysis_concurrency == 0 {
            return Err(ConfigError::InvalidValue("ANALYSIS_CONCURRENCY".into()));
        }
        if !(1..=MAX_ANALYSIS_SECS).contains(&self.analysis_call_timeout_secs) {
            return Err(ConfigError::InvalidValue("ANALYSIS_CALL_TIMEOUT_SECS".into()));
        }
        if !(1..=MAX_ANALYSIS_SECS).contains(&self.analysis_deadline_secs) {
            return Err(ConfigError::InvalidValue("ANALYSIS_DEADLINE_SECS".into()));
        }
        if self.vector_context_enabled {
            if self.qdrant_url.is_none() {
                return Err(ConfigError::MissingVariable("QDRANT_URL".into()));
            }
            if self.embedding_dimension == 0 {
                return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
            }
            if self.vector_chunk_chars == 0 {
                return Err(ConfigError::InvalidValue("VECTOR_CHUNK_CHARS".into()));
            }
        }
        Ok(())
    }

    /// Cached document lifetime as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Timeout for a single chunk analysis call.
    pub fn analysis_call_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_call_timeout_secs)
    }

    /// Overall deadline for one fan-out.
    pub fn analysis_deadline(&self) -> Duration {
        Duration::from_secs(self.analysis_deadline_secs)
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    match load_env_optional(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
    }
}

impl FromStr for CacheProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "rest" | "redis" => Ok(Self::Rest),
            _ => Err(()),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hash" => Ok(Self::Hash),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        server_port: None,
        cache_provider: CacheProvider::Memory,
        cache_rest_url: None,
        cache_rest_token: None,
        cache_ttl_secs: 86_400,
        result_database_path: ":memory:".into(),
        llm_provider: LlmProvider::Ollama,
        llm_api_key: None,
        llm_base_url: None,
        analysis_model: "analysis-model".into(),
        summary_model: "summary-model".into(),
        chunk_max_chars: 15_000,
        analysis_concurrency: 4,
        analysis_call_timeout_secs: 60,
        analysis_deadline_secs: 300,
        persist_sentinel_results: true,
        vector_context_enabled: false,
        qdrant_url: None,
        qdrant_api_key: None,
        embedding_provider: EmbeddingProvider::Hash,
        embedding_model: "nomic-embed-text".into(),
        embedding_dimension: 8,
        ollama_url: None,
        vector_chunk_chars: 1000,
        vector_chunk_overlap: 200,
        log_file: None,
    }
}
