use std::time::Duration;

use super::LlmError;

/// What a model call is for. Each pipeline call site has exactly one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallIntent {
    /// Return a JSON array of verbatim requirement strings.
    ExtractVerbatim,
    /// Summarize one chunk of a specification into bullets.
    ExtractBullets,
    /// Distill concatenated chunk bullets into a short list.
    Distill,
    /// Judge one batch of requirements against the submittal.
    CompareBatch,
    /// Narrative summary of the verdicts.
    Summarize,
}

impl CallIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractVerbatim => "extract_verbatim",
            Self::ExtractBullets => "extract_bullets",
            Self::Distill => "distill",
            Self::CompareBatch => "compare_batch",
            Self::Summarize => "summarize",
        }
    }
}

/// A single system + user prompt completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub intent: CallIntent,
    pub system: &'a str,
    pub prompt: &'a str,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(intent: CallIntent, system: &'a str, prompt: &'a str) -> Self {
        Self {
            intent,
            system,
            prompt,
            temperature: 0.0,
            max_tokens: None,
            timeout: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// LLM completion service abstraction (allows mocking).
///
/// Implementations are called concurrently from several pipeline runs and
/// from the bounded fan-out inside a run.
pub trait LlmClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_options() {
        let request = CompletionRequest::new(CallIntent::Summarize, "sys", "user")
            .temperature(0.3)
            .max_tokens(Some(200))
            .timeout(Duration::from_secs(30));
        assert_eq!(request.intent, CallIntent::Summarize);
        assert!((request.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, Some(200));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn client_trait_is_object_safe() {
        fn _assert(_: &dyn LlmClient) {}
    }
}
