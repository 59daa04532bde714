use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::types::{CompletionRequest, LlmClient};
use super::LlmError;
use crate::config::ServiceConfig;

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Works against the hosted OpenAI API and local servers that expose the same
/// surface (Ollama, vLLM, llama.cpp server).
pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl OpenAiClient {
    /// Build a client. Must not be called from inside an async runtime.
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
            timeout,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, LlmError> {
        Self::new(
            &config.llm_url,
            &config.model,
            config.api_key.clone(),
            config.pipeline.llm_timeout,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Request body for `/chat/completions`
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response body from `/chat/completions`
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient for OpenAiClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(self.endpoint()).json(&body).timeout(timeout);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(timeout)
            } else if e.is_connect() {
                LlmError::Connection(self.base_url.clone())
            } else {
                LlmError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(LlmError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(upstream_error(status, body));
        }

        let parsed: ChatResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(timeout)
            } else {
                LlmError::MalformedResponse(e.to_string())
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::MalformedResponse("response carried no choices".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Non-2xx without a 429 status. Some gateways report throttling only in the body.
fn upstream_error(status: StatusCode, body: String) -> LlmError {
    if body.contains("rate_limit") {
        LlmError::RateLimited { retry_after: None }
    } else {
        LlmError::Upstream {
            status: status.as_u16(),
            body,
        }
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
