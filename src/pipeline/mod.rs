pub mod cache;
pub mod chunker;
pub mod comparator;
pub mod extractor;
pub mod llm;
pub mod orchestrator;
pub mod parallel;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod text;
pub mod types;

pub use cache::{fingerprint, FileRequirementCache, MemoryRequirementCache, RequirementCache};
pub use chunker::chunk_text;
pub use comparator::ComplianceComparator;
pub use extractor::{Extraction, RequirementExtractor};
pub use orchestrator::CompliancePipeline;
pub use parser::{extract_json_array, split_narrative_and_table};
pub use retry::{with_retry, RetryPolicy};
pub use types::*;

use thiserror::Error;

use llm::LlmError;

/// Errors that end a pipeline run. Per-batch and summary failures never
/// surface here; they are recovered inside the report.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Requirement extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("LLM calls exhausted the retry budget: {0}")]
    RetryExhausted(String),
}

impl PipelineError {
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::InvalidInput(_) => FailureReason::InvalidInput,
            Self::ExtractionFailed(_) => FailureReason::ExtractionFailed,
            Self::RetryExhausted(_) => FailureReason::RetryExhausted,
        }
    }

    /// Map a model-call failure during extraction onto the run taxonomy.
    pub fn from_extraction(err: LlmError) -> Self {
        match err {
            LlmError::RetryExhausted { .. } => Self::RetryExhausted(err.to_string()),
            other => Self::ExtractionFailed(other.to_string()),
        }
    }
}
