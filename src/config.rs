use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::cache::DEFAULT_CACHE_TTL;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::types::ExtractionStrategy;

/// Application-level constants
pub const APP_NAME: &str = "SubmittalCheck";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-document upload ceiling, enforced before the pipeline runs.
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub const DEFAULT_LLM_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

const ENV_LLM_URL: &str = "SUBMITTAL_CHECK_LLM_URL";
const ENV_MODEL: &str = "SUBMITTAL_CHECK_MODEL";
const ENV_API_KEY: &str = "SUBMITTAL_CHECK_API_KEY";
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_BIND: &str = "SUBMITTAL_CHECK_BIND";
const ENV_CACHE_DIR: &str = "SUBMITTAL_CHECK_CACHE_DIR";
const ENV_LLM_TIMEOUT: &str = "SUBMITTAL_CHECK_LLM_TIMEOUT_SECS";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,submittal_check_lib=debug,hyper=warn,reqwest=warn"
}

/// Get the application data directory.
/// ~/SubmittalCheck/ when a home directory exists, the temp dir otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default location of the requirement cache.
pub fn cache_dir() -> PathBuf {
    app_data_dir().join("cache")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid bind address {value:?}: {reason}")]
    InvalidBind { value: String, reason: String },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

// ═══════════════════════════════════════════════════════════
// Pipeline tuning
// ═══════════════════════════════════════════════════════════

/// Tuning for one compliance run. Shared read-only by all runs.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Extracted text shorter than this (trimmed, in characters) is treated as unreadable.
    pub min_input_chars: usize,
    /// Specs longer than this are chunked.
    pub chunk_threshold: usize,
    /// Window size for chunked extraction.
    pub chunk_size: usize,
    /// Above this many characters, a merged verbatim list falls back to bullet distillation.
    pub merge_char_limit: usize,
    /// Bullet count requested by the distill call.
    pub distill_target: usize,
    /// Submittal text beyond this many characters is cut from compare prompts.
    pub max_submittal_chars: usize,
    /// Requirements per compare call.
    pub batch_size: usize,
    /// Model calls in flight within one run.
    pub max_concurrency: usize,
    pub strategy: ExtractionStrategy,
    pub cache_ttl: Duration,
    /// Ask the model for a narrative summary; otherwise use the count line.
    pub summarize: bool,
    pub extraction_temperature: f32,
    pub compare_temperature: f32,
    pub summary_temperature: f32,
    pub bullet_max_tokens: Option<u32>,
    pub summary_max_tokens: Option<u32>,
    /// Timeout attached to every model call.
    pub llm_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_input_chars: 100,
            chunk_threshold: 15_000,
            chunk_size: 12_000,
            merge_char_limit: 24_000,
            distill_target: 8,
            max_submittal_chars: 48_000,
            batch_size: 3,
            max_concurrency: 2,
            strategy: ExtractionStrategy::VerbatimMerge,
            cache_ttl: DEFAULT_CACHE_TTL,
            summarize: true,
            extraction_temperature: 0.0,
            compare_temperature: 0.0,
            summary_temperature: 0.3,
            bullet_max_tokens: Some(500),
            summary_max_tokens: Some(200),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Service configuration
// ═══════════════════════════════════════════════════════════

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub llm_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub bind_addr: SocketAddr,
    pub cache_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidBind {
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let mut pipeline = PipelineConfig::default();
        if let Some(raw) = get(ENV_LLM_TIMEOUT) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidNumber {
                    key: ENV_LLM_TIMEOUT,
                    value: raw.clone(),
                })?;
            pipeline.llm_timeout = Duration::from_secs(secs);
        }

        Ok(Self {
            llm_url: get(ENV_LLM_URL).unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
            model: get(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: get(ENV_API_KEY).or_else(|| get(ENV_OPENAI_API_KEY)),
            bind_addr,
            cache_dir: get(ENV_CACHE_DIR).map(PathBuf::from).unwrap_or_else(cache_dir),
            pipeline,
        })
    }
}
