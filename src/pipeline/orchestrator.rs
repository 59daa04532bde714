//! End-to-end compliance run.
//!
//! Ingest → Extract → Compare → Summarize → Done. Any fatal stage error moves
//! the run to Error and is folded into a `Failure` report; `run` never fails.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::cache::RequirementCache;
use super::comparator::ComplianceComparator;
use super::extractor::RequirementExtractor;
use super::llm::{CallIntent, CompletionRequest, LlmClient};
use super::parser::split_narrative_and_table;
use super::prompt::{build_summary_prompt, SUMMARY_SYSTEM_PROMPT};
use super::text::TextExtractor;
use super::types::{ComplianceVerdict, Report, Stage};
use super::PipelineError;
use crate::config::PipelineConfig;

pub struct CompliancePipeline {
    llm: Arc<dyn LlmClient>,
    extractor: RequirementExtractor,
    comparator: ComplianceComparator,
    config: PipelineConfig,
}

impl CompliancePipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        cache: Arc<dyn RequirementCache>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor: RequirementExtractor::new(llm.clone(), cache, config.clone()),
            comparator: ComplianceComparator::new(llm.clone(), config.clone()),
            llm,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Review already-extracted document text.
    pub fn run(&self, spec_text: &str, submittal_text: &str) -> Report {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("compliance_run", %run_id, model = self.llm.model_name());
        let _guard = span.enter();
        let started = Instant::now();

        match self.execute(run_id, spec_text, submittal_text) {
            Ok(report) => {
                tracing::info!(
                    stage = Stage::Done.as_str(),
                    status = ?report.status,
                    verdicts = report.total,
                    compliant = report.compliant_count,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Compliance run finished"
                );
                report
            }
            Err(e) => {
                tracing::warn!(
                    stage = Stage::Error.as_str(),
                    reason = e.reason().as_str(),
                    error = %e,
                    "Compliance run failed"
                );
                Report::failure(run_id, e.reason(), e.to_string())
            }
        }
    }

    /// Review raw uploaded documents, reading their text through `text`.
    /// Unreadable documents end the run with `InvalidInput`.
    pub fn run_documents(
        &self,
        text: &dyn TextExtractor,
        spec_bytes: &[u8],
        submittal_bytes: &[u8],
    ) -> Report {
        let read = |label: &str, bytes: &[u8]| {
            text.extract_text(bytes).map_err(|e| {
                tracing::warn!(
                    stage = Stage::Ingest.as_str(),
                    document = label,
                    error = %e,
                    "Document text extraction failed"
                );
                PipelineError::InvalidInput(format!("{label} document could not be read: {e}"))
            })
        };

        let texts = read("Specification", spec_bytes)
            .and_then(|spec| read("Submittal", submittal_bytes).map(|sub| (spec, sub)));
        match texts {
            Ok((spec, submittal)) => self.run(&spec, &submittal),
            Err(e) => Report::failure(Uuid::new_v4(), e.reason(), e.to_string()),
        }
    }

    fn execute(
        &self,
        run_id: Uuid,
        spec_text: &str,
        submittal_text: &str,
    ) -> Result<Report, PipelineError> {
        tracing::info!(
            stage = Stage::Ingest.as_str(),
            spec_chars = spec_text.chars().count(),
            submittal_chars = submittal_text.chars().count(),
            "Validating input"
        );
        validate_input("Specification", spec_text, self.config.min_input_chars)?;
        validate_input("Submittal", submittal_text, self.config.min_input_chars)?;

        tracing::info!(stage = Stage::Extract.as_str(), "Extracting requirements");
        let extraction = self.extractor.extract(spec_text)?;

        tracing::info!(
            stage = Stage::Compare.as_str(),
            requirements = extraction.requirements.len(),
            "Comparing submittal"
        );
        let verdicts = self.comparator.compare(&extraction.requirements, submittal_text);

        tracing::info!(stage = Stage::Summarize.as_str(), "Summarizing");
        let summary = self.summarize(&verdicts);

        Ok(Report::completed(
            run_id,
            verdicts,
            summary,
            extraction.cache_hit,
            extraction.strategy,
        ))
    }

    /// Narrative summary from the model, or the count line when disabled or failed.
    fn summarize(&self, verdicts: &[ComplianceVerdict]) -> String {
        let tally = count_summary(verdicts);
        if !self.config.summarize || verdicts.is_empty() {
            return tally;
        }

        let gaps: Vec<&str> = verdicts
            .iter()
            .filter(|v| !v.compliant)
            .map(|v| v.requirement.as_str())
            .collect();
        let prompt = build_summary_prompt(&tally, &gaps);
        let request = CompletionRequest::new(CallIntent::Summarize, SUMMARY_SYSTEM_PROMPT, &prompt)
            .temperature(self.config.summary_temperature)
            .max_tokens(self.config.summary_max_tokens)
            .timeout(self.config.llm_timeout);

        match self.config.retry.run("summarize", || self.llm.complete(&request)) {
            Ok(raw) => {
                let (narrative, _) = split_narrative_and_table(&raw);
                if narrative.is_empty() {
                    tracing::warn!("Summary response had no narrative, using count");
                    tally
                } else {
                    narrative
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summary call failed, using count");
                tally
            }
        }
    }
}

fn validate_input(label: &str, text: &str, min_chars: usize) -> Result<(), PipelineError> {
    let chars = text.trim().chars().count();
    if chars <= min_chars {
        return Err(PipelineError::InvalidInput(format!(
            "{label} text is too short ({chars} characters, must exceed {min_chars}); \
             the document may be empty or unreadable"
        )));
    }
    Ok(())
}

/// "N of M requirements compliant." with a note for verdicts that were never evaluated.
pub fn count_summary(verdicts: &[ComplianceVerdict]) -> String {
    let compliant = verdicts.iter().filter(|v| v.compliant).count();
    let mut line = format!("{compliant} of {} requirements compliant.", verdicts.len());
    let synthesized = verdicts.iter().filter(|v| v.is_synthesized()).count();
    if synthesized > 0 {
        line.push_str(&format!(" {synthesized} could not be evaluated."));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cache::MemoryRequirementCache;
    use crate::pipeline::llm::{LlmError, MockLlmClient};
    use crate::pipeline::retry::RetryPolicy;
    use crate::pipeline::text::PlainTextExtractor;
    use crate::pipeline::types::{FailureReason, ReportStatus, Requirement};
    use std::time::Duration;

    const EXTRACTED: &str = r#"["Concrete shall be 4000 psi.","Rebar shall be Grade 60."]"#;
    const VERDICTS: &str = r#"[
        {"requirement":"a","provided":"4000 psi mix","compliant":true,"comment":"Matches."},
        {"requirement":"b","provided":"Grade 40","compliant":false,"comment":"Lower grade."}
    ]"#;

    fn config() -> PipelineConfig {
        PipelineConfig {
            max_concurrency: 1,
            retry: RetryPolicy::new(2, Duration::from_millis(1)),
            ..PipelineConfig::default()
        }
    }

    fn routed(summary: Result<&'static str, LlmError>) -> MockLlmClient {
        MockLlmClient::from_fn(move |req| match req.intent {
            CallIntent::ExtractVerbatim => Ok(EXTRACTED.to_string()),
            CallIntent::CompareBatch => Ok(VERDICTS.to_string()),
            CallIntent::Summarize => summary.clone().map(str::to_string),
            _ => Err(LlmError::MalformedResponse("unexpected intent".into())),
        })
    }

    fn pipeline(llm: Arc<MockLlmClient>, config: PipelineConfig) -> CompliancePipeline {
        CompliancePipeline::new(llm, Arc::new(MemoryRequirementCache::default()), config)
    }

    fn long(text: &str) -> String {
        text.repeat(200 / text.len() + 1)
    }

    #[test]
    fn successful_run_uses_model_summary() {
        let llm = Arc::new(routed(Ok("One requirement falls short on rebar grade.")));
        let report = pipeline(llm.clone(), config()).run(&long("Spec. "), &long("Sub. "));
        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.total, 2);
        assert_eq!(report.compliant_count, 1);
        assert_eq!(report.summary, "One requirement falls short on rebar grade.");
        assert_eq!(llm.calls_for(CallIntent::Summarize), 1);
    }

    #[test]
    fn summary_table_is_stripped() {
        let llm = Arc::new(routed(Ok("Mostly compliant.\n| a | b |\n|---|---|\n| 1 | 2 |")));
        let report = pipeline(llm, config()).run(&long("Spec. "), &long("Sub. "));
        assert_eq!(report.summary, "Mostly compliant.");
    }

    #[test]
    fn summary_failure_falls_back_to_count() {
        let llm = Arc::new(routed(Err(LlmError::Upstream {
            status: 503,
            body: "busy".into(),
        })));
        let report = pipeline(llm, config()).run(&long("Spec. "), &long("Sub. "));
        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.summary, "1 of 2 requirements compliant.");
    }

    #[test]
    fn summarize_disabled_skips_call() {
        let llm = Arc::new(routed(Ok("unused")));
        let cfg = PipelineConfig {
            summarize: false,
            ..config()
        };
        let report = pipeline(llm.clone(), cfg).run(&long("Spec. "), &long("Sub. "));
        assert_eq!(report.summary, "1 of 2 requirements compliant.");
        assert_eq!(llm.calls_for(CallIntent::Summarize), 0);
    }

    #[test]
    fn short_submittal_is_invalid_input() {
        let llm = Arc::new(routed(Ok("unused")));
        let report = pipeline(llm.clone(), config()).run(&long("Spec. "), "tiny");
        assert_eq!(report.status, ReportStatus::Failure);
        assert_eq!(report.failure, Some(FailureReason::InvalidInput));
        assert!(report.summary.contains("Submittal"));
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn whitespace_does_not_count_toward_minimum() {
        let llm = Arc::new(routed(Ok("unused")));
        let padded = format!("{}short{}", " ".repeat(200), "\n".repeat(200));
        let report = pipeline(llm, config()).run(&padded, &long("Sub. "));
        assert_eq!(report.failure, Some(FailureReason::InvalidInput));
    }

    #[test]
    fn input_must_exceed_minimum() {
        let llm = Arc::new(routed(Ok("Summary.")));
        let pipeline = pipeline(llm, config());
        let at_minimum = "s".repeat(100);
        let above_minimum = "s".repeat(101);

        let report = pipeline.run(&at_minimum, &long("Sub. "));
        assert_eq!(report.failure, Some(FailureReason::InvalidInput));
        let report = pipeline.run(&above_minimum, &long("Sub. "));
        assert_eq!(report.status, ReportStatus::Success);
    }

    #[test]
    fn concurrent_runs_share_one_pipeline() {
        let llm = Arc::new(routed(Ok("Summary.")));
        let pipeline = Arc::new(pipeline(llm.clone(), config()));
        let spec = long("Spec. ");
        let submittal = long("Sub. ");

        let reports: Vec<Report> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let pipeline = pipeline.clone();
                    let (spec, submittal) = (&spec, &submittal);
                    s.spawn(move || pipeline.run(spec, submittal))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_ne!(reports[0].run_id, reports[1].run_id);
        for report in &reports {
            assert_eq!(report.status, ReportStatus::Success);
            assert_eq!(report.total, 2);
            assert_eq!(report.verdicts[0].requirement, "Concrete shall be 4000 psi.");
            assert_eq!(report.verdicts[1].requirement, "Rebar shall be Grade 60.");
        }
        assert_eq!(llm.calls_for(CallIntent::CompareBatch), 2);
    }

    #[test]
    fn unreadable_document_is_invalid_input() {
        let llm = Arc::new(routed(Ok("unused")));
        let report = pipeline(llm.clone(), config()).run_documents(
            &PlainTextExtractor,
            &[0xff, 0xfe, 0x00, 0x9f],
            long("Sub. ").as_bytes(),
        );
        assert_eq!(report.status, ReportStatus::Failure);
        assert_eq!(report.failure, Some(FailureReason::InvalidInput));
        assert!(report.verdicts.is_empty());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn documents_run_through_pipeline() {
        let llm = Arc::new(routed(Ok("Summary.")));
        let report = pipeline(llm, config()).run_documents(
            &PlainTextExtractor,
            long("Spec. ").as_bytes(),
            long("Sub. ").as_bytes(),
        );
        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.total, 2);
    }

    #[test]
    fn count_summary_notes_unevaluated() {
        let verdicts = vec![
            ComplianceVerdict::synthesized(&Requirement::new("a"), "failed"),
            ComplianceVerdict::synthesized(&Requirement::new("b"), "failed"),
        ];
        assert_eq!(
            count_summary(&verdicts),
            "0 of 2 requirements compliant. 2 could not be evaluated."
        );
    }
}
