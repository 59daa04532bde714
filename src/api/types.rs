//! Shared state for the review routes.

use std::sync::Arc;

use crate::config::MAX_UPLOAD_BYTES;
use crate::pipeline::text::{DocumentTextExtractor, TextExtractor};
use crate::pipeline::CompliancePipeline;

/// Multipart framing allowance on top of the two file payloads.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CompliancePipeline>,
    pub text: Arc<dyn TextExtractor>,
    /// Per-file upload ceiling.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// PDF or plain-text uploads, 100 MiB per file.
    pub fn new(pipeline: Arc<CompliancePipeline>) -> Self {
        Self {
            pipeline,
            text: Arc::new(DocumentTextExtractor),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Request body ceiling: both files plus framing.
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes
            .saturating_mul(2)
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}
