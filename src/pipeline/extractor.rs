//! Requirement extraction: specification text → ordered requirement list.
//!
//! cache lookup → (single call | chunk fan-out → merge) → cache store
//!
//! Large specs default to verbatim extraction per chunk with an ordered merge.
//! When the merged list is itself too large to carry into comparison, the
//! bullet strategy (summarize each chunk, then distill) takes over.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;

use super::cache::{fingerprint, RequirementCache};
use super::chunker::chunk_text;
use super::llm::{CallIntent, CompletionRequest, LlmClient, LlmError};
use super::parallel::map_ordered;
use super::parser::parse_array_lenient;
use super::prompt::{
    build_bullet_prompt, build_distill_prompt, build_extraction_prompt, BULLET_SYSTEM_PROMPT,
    EXTRACTION_SYSTEM_PROMPT,
};
use super::types::{ExtractionStrategy, Requirement};
use super::PipelineError;
use crate::config::PipelineConfig;

/// Leading bullet or list numbering, e.g. `- `, `* `, `• `, `3. `, `12) `.
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•‣▪]|\d{1,3}[.)])\s+").unwrap());

/// Outcome of one extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub requirements: Vec<Requirement>,
    pub fingerprint: String,
    pub cache_hit: bool,
    /// `None` when the spec fit in a single call or came from cache.
    pub strategy: Option<ExtractionStrategy>,
}

/// A requirement as the model may phrase it: a bare string or a small object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRequirement {
    Text(String),
    Object {
        #[serde(alias = "text", alias = "statement")]
        requirement: String,
    },
}

impl RawRequirement {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Object { requirement: text } => text,
        }
    }
}

pub struct RequirementExtractor {
    llm: Arc<dyn LlmClient>,
    cache: Arc<dyn RequirementCache>,
    config: PipelineConfig,
}

impl RequirementExtractor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        cache: Arc<dyn RequirementCache>,
        config: PipelineConfig,
    ) -> Self {
        Self { llm, cache, config }
    }

    /// Extract the ordered requirement list for `spec_text`.
    pub fn extract(&self, spec_text: &str) -> Result<Extraction, PipelineError> {
        let fingerprint = fingerprint(spec_text);

        if let Some(requirements) = self.cache.lookup(&fingerprint).filter(|r| !r.is_empty()) {
            tracing::info!(
                fingerprint = %fingerprint,
                count = requirements.len(),
                "Requirement cache hit"
            );
            return Ok(Extraction {
                requirements,
                fingerprint,
                cache_hit: true,
                strategy: None,
            });
        }

        let char_count = spec_text.chars().count();
        let (requirements, strategy) = if char_count <= self.config.chunk_threshold {
            (self.extract_single(spec_text)?, None)
        } else {
            let chunks = chunk_text(spec_text, self.config.chunk_size);
            tracing::info!(
                chars = char_count,
                chunks = chunks.len(),
                strategy = self.config.strategy.as_str(),
                "Specification exceeds single-call threshold, chunking"
            );
            let (reqs, used) = self.extract_chunked(&chunks)?;
            (reqs, Some(used))
        };

        if requirements.is_empty() {
            return Err(PipelineError::ExtractionFailed(
                "model returned no requirements".into(),
            ));
        }

        self.cache.store(&fingerprint, &requirements);
        tracing::info!(
            fingerprint = %fingerprint,
            count = requirements.len(),
            "Requirements extracted"
        );

        Ok(Extraction {
            requirements,
            fingerprint,
            cache_hit: false,
            strategy,
        })
    }

    fn extract_single(&self, spec_text: &str) -> Result<Vec<Requirement>, PipelineError> {
        let prompt = build_extraction_prompt(spec_text, None);
        self.request_requirements(&prompt, "extract")
            .map_err(PipelineError::from_extraction)
    }

    fn extract_chunked(
        &self,
        chunks: &[&str],
    ) -> Result<(Vec<Requirement>, ExtractionStrategy), PipelineError> {
        match self.config.strategy {
            ExtractionStrategy::BulletDistill => Ok((
                self.extract_bullet_distill(chunks)?,
                ExtractionStrategy::BulletDistill,
            )),
            ExtractionStrategy::VerbatimMerge => {
                let merged = self.extract_verbatim_merge(chunks)?;
                let merged_chars: usize = merged.iter().map(|r| r.text.chars().count()).sum();
                if merged_chars > self.config.merge_char_limit {
                    tracing::info!(
                        merged = merged.len(),
                        merged_chars,
                        limit = self.config.merge_char_limit,
                        "Merged requirement list too large, falling back to bullet distillation"
                    );
                    return Ok((
                        self.extract_bullet_distill(chunks)?,
                        ExtractionStrategy::BulletDistill,
                    ));
                }
                Ok((merged, ExtractionStrategy::VerbatimMerge))
            }
        }
    }

    /// Verbatim extraction per chunk, merged in chunk order. A chunk whose output
    /// never parses contributes nothing; any other call failure ends extraction.
    fn extract_verbatim_merge(&self, chunks: &[&str]) -> Result<Vec<Requirement>, PipelineError> {
        let total = chunks.len();
        let per_chunk = map_ordered(chunks, self.config.max_concurrency, |index, chunk| {
            let prompt = build_extraction_prompt(chunk, Some((index + 1, total)));
            match self.request_requirements(&prompt, "extract_chunk") {
                Ok(reqs) => Ok(reqs),
                Err(LlmError::MalformedOutput(reason)) => {
                    tracing::warn!(
                        chunk = index + 1,
                        total,
                        %reason,
                        "Chunk yielded no parseable requirements"
                    );
                    Ok(Vec::new())
                }
                Err(e) => Err(e),
            }
        });

        let mut lists = Vec::with_capacity(total);
        for result in per_chunk {
            lists.push(result.map_err(PipelineError::from_extraction)?);
        }
        Ok(merge_requirement_lists(lists))
    }

    /// Bullet summary per chunk, concatenated in order, then one distill call.
    fn extract_bullet_distill(&self, chunks: &[&str]) -> Result<Vec<Requirement>, PipelineError> {
        let summaries = map_ordered(chunks, self.config.max_concurrency, |index, chunk| {
            let prompt = build_bullet_prompt(chunk, index + 1);
            let request =
                CompletionRequest::new(CallIntent::ExtractBullets, BULLET_SYSTEM_PROMPT, &prompt)
                    .temperature(self.config.extraction_temperature)
                    .max_tokens(self.config.bullet_max_tokens)
                    .timeout(self.config.llm_timeout);
            self.config
                .retry
                .run("bullet_chunk", || self.llm.complete(&request))
        });

        let mut bullets = Vec::with_capacity(summaries.len());
        for summary in summaries {
            bullets.push(summary.map_err(PipelineError::from_extraction)?);
        }
        let merged = bullets.join("\n");

        let prompt = build_distill_prompt(&merged, self.config.distill_target);
        let request = CompletionRequest::new(CallIntent::Distill, BULLET_SYSTEM_PROMPT, &prompt)
            .temperature(self.config.extraction_temperature)
            .max_tokens(self.config.bullet_max_tokens)
            .timeout(self.config.llm_timeout);
        let distilled = self
            .config
            .retry
            .run_parsed("distill", || self.llm.complete(&request), |raw| {
                let reqs = parse_bullets(raw);
                (!reqs.is_empty()).then_some(reqs)
            })
            .map_err(PipelineError::from_extraction)?;
        Ok(dedupe(distilled))
    }

    fn request_requirements(
        &self,
        prompt: &str,
        label: &str,
    ) -> Result<Vec<Requirement>, LlmError> {
        let request =
            CompletionRequest::new(CallIntent::ExtractVerbatim, EXTRACTION_SYSTEM_PROMPT, prompt)
                .temperature(self.config.extraction_temperature)
                .timeout(self.config.llm_timeout);
        self.config
            .retry
            .run_parsed(label, || self.llm.complete(&request), parse_requirements)
    }
}

/// Decode a JSON array of requirements. `None` if no array could be recovered
/// or the array held no usable requirement.
pub fn parse_requirements(raw: &str) -> Option<Vec<Requirement>> {
    let items: Vec<RawRequirement> = parse_array_lenient(raw)?;
    let requirements: Vec<Requirement> = items
        .into_iter()
        .filter_map(|item| normalize_requirement(&item.into_text()))
        .map(Requirement::new)
        .collect();
    (!requirements.is_empty()).then_some(requirements)
}

/// Requirements from a bulleted or numbered list. Unmarked lines are used only
/// when no line carries a marker.
pub fn parse_bullets(raw: &str) -> Vec<Requirement> {
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    let marked: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| LIST_MARKER.is_match(l))
        .collect();
    let source = if marked.is_empty() { lines } else { marked };
    source
        .into_iter()
        .filter_map(normalize_requirement)
        .map(Requirement::new)
        .collect()
}

/// Trim, drop list markers and wrapping quotes. Empty results are discarded.
fn normalize_requirement(text: &str) -> Option<String> {
    let stripped = LIST_MARKER.replace(text.trim(), "");
    let cleaned = stripped.trim().trim_matches('"').trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Concatenate per-chunk lists in order and drop repeats.
pub fn merge_requirement_lists(lists: Vec<Vec<Requirement>>) -> Vec<Requirement> {
    dedupe(lists.into_iter().flatten().collect())
}

/// Drop case-insensitive repeats, keeping the first occurrence.
fn dedupe(requirements: Vec<Requirement>) -> Vec<Requirement> {
    let mut seen = HashSet::new();
    requirements
        .into_iter()
        .filter(|r| seen.insert(r.text.to_lowercase()))
        .collect()
}
