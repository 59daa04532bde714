use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single enforceable statement extracted from a specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirement {
    pub text: String,
}

impl Requirement {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<&str> for Requirement {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOrigin {
    /// Judged by the model.
    Model,
    /// Built locally because the batch call or its parse failed.
    Synthesized,
}

/// Compliance judgment for one requirement against the submittal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub requirement: String,
    pub provided: String,
    pub compliant: bool,
    pub comment: String,
    pub origin: VerdictOrigin,
}

impl ComplianceVerdict {
    /// Non-compliant placeholder for a requirement the model never judged.
    pub fn synthesized(requirement: &Requirement, comment: impl Into<String>) -> Self {
        Self {
            requirement: requirement.text.clone(),
            provided: String::new(),
            compliant: false,
            comment: comment.into(),
            origin: VerdictOrigin::Synthesized,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        self.origin == VerdictOrigin::Synthesized
    }
}

/// How requirements are pulled out of a specification too large for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Extract verbatim requirement strings per chunk and merge the lists.
    #[default]
    VerbatimMerge,
    /// Summarize each chunk into bullets, then distill the bullets.
    BulletDistill,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VerbatimMerge => "verbatim_merge",
            Self::BulletDistill => "bullet_distill",
        }
    }
}

/// Pipeline stages, in execution order. `Error` is reachable from any stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Extract,
    Compare,
    Summarize,
    Done,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Extract => "extract",
            Self::Compare => "compare",
            Self::Summarize => "summarize",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    PartialFailure,
    Failure,
}

/// Why a run ended in `ReportStatus::Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidInput,
    ExtractionFailed,
    RetryExhausted,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ExtractionFailed => "extraction_failed",
            Self::RetryExhausted => "retry_exhausted",
        }
    }
}

/// End-to-end result of one compliance run. Owned by that run only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub summary: String,
    pub verdicts: Vec<ComplianceVerdict>,
    pub failure: Option<FailureReason>,
    pub compliant_count: usize,
    pub total: usize,
    pub cache_hit: bool,
    pub strategy: Option<ExtractionStrategy>,
}

impl Report {
    /// Terminal failure report. Carries no verdicts.
    pub fn failure(run_id: Uuid, reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            run_id,
            generated_at: Utc::now(),
            status: ReportStatus::Failure,
            summary: message.into(),
            verdicts: Vec::new(),
            failure: Some(reason),
            compliant_count: 0,
            total: 0,
            cache_hit: false,
            strategy: None,
        }
    }

    /// Completed report; status degrades to `PartialFailure` when any verdict was synthesized.
    pub fn completed(
        run_id: Uuid,
        verdicts: Vec<ComplianceVerdict>,
        summary: String,
        cache_hit: bool,
        strategy: Option<ExtractionStrategy>,
    ) -> Self {
        let status = if verdicts.iter().any(ComplianceVerdict::is_synthesized) {
            ReportStatus::PartialFailure
        } else {
            ReportStatus::Success
        };
        Self {
            run_id,
            generated_at: Utc::now(),
            status,
            summary,
            compliant_count: verdicts.iter().filter(|v| v.compliant).count(),
            total: verdicts.len(),
            verdicts,
            failure: None,
            cache_hit,
            strategy,
        }
    }
}
