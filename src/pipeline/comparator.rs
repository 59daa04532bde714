//! Compliance comparison: requirements × submittal → one verdict per requirement.
//!
//! Requirements are split into fixed-size batches, one model call each. A batch
//! whose call or parse fails is filled with synthesized non-compliant verdicts,
//! so the output always has exactly one verdict per input requirement, in order.

use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use super::llm::{CallIntent, CompletionRequest, LlmClient, LlmError};
use super::parallel::map_ordered;
use super::parser::parse_array_lenient;
use super::prompt::{build_compare_prompt, COMPARE_SYSTEM_PROMPT};
use super::types::{ComplianceVerdict, Requirement, VerdictOrigin};
use crate::config::PipelineConfig;

/// A verdict as the model phrases it. Field names and value types vary.
/// The model's echo of the requirement is ignored; alignment is positional.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default, deserialize_with = "lenient_text")]
    provided: String,
    #[serde(
        default,
        alias = "compliance",
        alias = "is_compliant",
        deserialize_with = "lenient_bool"
    )]
    compliant: bool,
    #[serde(default, alias = "comments", deserialize_with = "lenient_text")]
    comment: String,
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "yes" | "y" | "compliant" | "complies"
        ),
        serde_json::Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}

pub struct ComplianceComparator {
    llm: Arc<dyn LlmClient>,
    config: PipelineConfig,
}

impl ComplianceComparator {
    pub fn new(llm: Arc<dyn LlmClient>, config: PipelineConfig) -> Self {
        Self { llm, config }
    }

    /// Judge every requirement. Never fails; never drops a requirement.
    pub fn compare(
        &self,
        requirements: &[Requirement],
        submittal_text: &str,
    ) -> Vec<ComplianceVerdict> {
        let submittal = truncate_chars(submittal_text, self.config.max_submittal_chars);
        if submittal.len() < submittal_text.len() {
            tracing::warn!(
                limit = self.config.max_submittal_chars,
                "Submittal text truncated for comparison prompts"
            );
        }

        let batches: Vec<&[Requirement]> =
            requirements.chunks(self.config.batch_size.max(1)).collect();
        let total = batches.len();
        tracing::info!(
            requirements = requirements.len(),
            batches = total,
            "Comparing requirements"
        );

        map_ordered(&batches, self.config.max_concurrency, |index, batch| {
            self.compare_batch(index + 1, total, batch, submittal)
        })
        .into_iter()
        .flatten()
        .collect()
    }

    fn compare_batch(
        &self,
        number: usize,
        total: usize,
        batch: &[Requirement],
        submittal: &str,
    ) -> Vec<ComplianceVerdict> {
        let prompt = build_compare_prompt(batch, submittal);
        let request =
            CompletionRequest::new(CallIntent::CompareBatch, COMPARE_SYSTEM_PROMPT, &prompt)
                .temperature(self.config.compare_temperature)
                .timeout(self.config.llm_timeout);

        let parsed = self.config.retry.run_parsed(
            "compare_batch",
            || self.llm.complete(&request),
            |raw| parse_array_lenient::<RawVerdict>(raw).filter(|v| !v.is_empty()),
        );

        match parsed {
            Ok(raw) => align_verdicts(batch, raw),
            Err(e) => {
                tracing::warn!(batch = number, total, error = %e, "Comparison batch failed");
                batch
                    .iter()
                    .map(|r| ComplianceVerdict::synthesized(r, failure_comment(&e)))
                    .collect()
            }
        }
    }
}

/// Pair model verdicts with the batch by position. The requirement text always
/// comes from the input; uncovered requirements get a synthesized verdict.
fn align_verdicts(batch: &[Requirement], raw: Vec<RawVerdict>) -> Vec<ComplianceVerdict> {
    if raw.len() != batch.len() {
        tracing::debug!(
            expected = batch.len(),
            received = raw.len(),
            "Verdict count does not match batch size"
        );
    }
    let mut raw = raw.into_iter();
    batch
        .iter()
        .map(|requirement| match raw.next() {
            Some(v) => ComplianceVerdict {
                requirement: requirement.text.clone(),
                provided: v.provided.trim().to_string(),
                compliant: v.compliant,
                comment: v.comment.trim().to_string(),
                origin: VerdictOrigin::Model,
            },
            None => ComplianceVerdict::synthesized(
                requirement,
                "Not evaluated: the model response did not cover this requirement.",
            ),
        })
        .collect()
}

fn failure_comment(err: &LlmError) -> String {
    match err {
        LlmError::MalformedOutput(_) => {
            "Not evaluated: the model response could not be parsed.".to_string()
        }
        LlmError::RetryExhausted { attempts, last } => {
            format!("Not evaluated: gave up after {attempts} attempts ({last}).")
        }
        other => format!("Not evaluated: model call failed ({other})."),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
