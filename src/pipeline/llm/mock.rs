use std::collections::VecDeque;
use std::sync::Mutex;

use super::types::{CallIntent, CompletionRequest, LlmClient};
use super::LlmError;

type Responder = Box<dyn Fn(&CompletionRequest<'_>) -> Result<String, LlmError> + Send + Sync>;

/// One recorded call against a mock client.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub intent: CallIntent,
    pub prompt: String,
}

/// Mock LLM client for testing. Answers from a closure, a script, or a fixed string,
/// and records every call it receives.
pub struct MockLlmClient {
    responder: Responder,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLlmClient {
    /// Always answer with `response`.
    pub fn new(response: &str) -> Self {
        let response = response.to_string();
        Self::from_fn(move |_| Ok(response.clone()))
    }

    /// Answer each call through `f`, which sees the full request.
    pub fn from_fn(
        f: impl Fn(&CompletionRequest<'_>) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(f),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer calls in order from `script`; the last entry repeats once the script runs out.
    pub fn scripted(script: Vec<Result<String, LlmError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(script));
        Self::from_fn(move |_| {
            let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
            match queue.len() {
                0 => Err(LlmError::MalformedResponse("mock script is empty".into())),
                1 => queue[0].clone(),
                _ => queue
                    .pop_front()
                    .unwrap_or_else(|| Err(LlmError::MalformedResponse("mock script is empty".into()))),
            }
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn calls_for(&self, intent: CallIntent) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.intent == intent)
            .count()
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                intent: request.intent,
                prompt: request.prompt.to_string(),
            });
        (self.responder)(request)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
