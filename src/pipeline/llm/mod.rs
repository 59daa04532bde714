pub mod client;
pub mod mock;
pub mod types;

pub use client::*;
pub use mock::*;
pub use types::*;

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("LLM service is not reachable at {0}")]
    Connection(String),

    #[error("LLM service rate limit hit")]
    RateLimited { retry_after: Option<Duration> },

    #[error("LLM request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("LLM service returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed LLM service response: {0}")]
    MalformedResponse(String),

    #[error("Model output could not be parsed: {0}")]
    MalformedOutput(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: Box<LlmError> },
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
