//! Bounded exponential backoff around model calls.
//!
//! The only retry mechanism in the pipeline. Rate-limit errors back off
//! `base_delay * 2^(attempt-1)` up to `max_attempts` total attempts. Timeouts
//! get the same backoff on a smaller budget. Every other error is returned
//! immediately. A server `Retry-After` hint can lengthen a delay, up to
//! `max_retry_after`. `run_parsed` adds a re-ask budget for outputs the parser rejects.

use std::time::Duration;

use serde::Serialize;

use super::llm::LlmError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Total attempts allowed for rate-limited calls.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each attempt after.
    pub base_delay: Duration,
    /// Total attempts allowed when the call times out.
    pub timeout_attempts: u32,
    /// Total calls allowed when the output fails to parse.
    pub malformed_attempts: u32,
    /// Ceiling on a server `Retry-After` hint.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            timeout_attempts: 2,
            malformed_attempts: 2,
            max_retry_after: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    /// Delay after failed attempt `attempt` (counted from 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `call`, retrying rate limits and timeouts per this policy.
    pub fn run<T>(
        &self,
        label: &str,
        mut call: impl FnMut() -> Result<T, LlmError>,
    ) -> Result<T, LlmError> {
        let max_attempts = self.max_attempts.max(1);
        let timeout_attempts = self.timeout_attempts.max(1).min(max_attempts);
        let mut timeouts = 0;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match call() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let (budget_left, hint) = match &err {
                LlmError::RateLimited { retry_after } => (attempt < max_attempts, *retry_after),
                LlmError::Timeout(_) => {
                    timeouts += 1;
                    (timeouts < timeout_attempts && attempt < max_attempts, None)
                }
                _ => return Err(err),
            };

            if !budget_left {
                tracing::warn!(label, attempts = attempt, error = %err, "Retry budget exhausted");
                return Err(LlmError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let hint = hint.map(|h| h.min(self.max_retry_after));
            let delay = self.backoff(attempt).max(hint.unwrap_or_default());
            tracing::warn!(
                label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "LLM call failed, backing off"
            );
            std::thread::sleep(delay);
        }
    }

    /// Like [`run`](Self::run), then parse the output; an unparseable output
    /// triggers a fresh call, up to `malformed_attempts` calls in total.
    pub fn run_parsed<T>(
        &self,
        label: &str,
        mut call: impl FnMut() -> Result<String, LlmError>,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<T, LlmError> {
        let attempts = self.malformed_attempts.max(1);
        for attempt in 1..=attempts {
            let raw = self.run(label, &mut call)?;
            if let Some(value) = parse(&raw) {
                return Ok(value);
            }
            tracing::warn!(
                label,
                attempt,
                response_len = raw.len(),
                "LLM output not parseable"
            );
        }
        Err(LlmError::MalformedOutput(format!(
            "{label}: no parseable output after {attempts} attempts"
        )))
    }
}

/// Retry `call` on rate-limit errors with exponential backoff.
pub fn with_retry<T>(
    max_attempts: u32,
    base_delay: Duration,
    call: impl FnMut() -> Result<T, LlmError>,
) -> Result<T, LlmError> {
    RetryPolicy::new(max_attempts, base_delay).run("with_retry", call)
}
