//! Content-addressed cache of extracted requirement lists.
//!
//! Keyed by a SHA-256 fingerprint of the normalized specification text, so two
//! uploads with the same text share an entry regardless of the source file.
//! Entries older than the TTL are treated as absent and are overwritten by the
//! next successful extraction. Persistence failures are logged, never raised.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::types::Requirement;

/// Default entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

/// A persisted requirement list for one fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub requirements: Vec<Requirement>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(fingerprint: &str, requirements: &[Requirement]) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            requirements: requirements.to_vec(),
            created_at: Utc::now(),
        }
    }

    /// True while `now - created_at < ttl`. Entries stamped in the future count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match now.signed_duration_since(self.created_at).to_std() {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }
}

/// Requirement cache shared by all pipeline runs in the process.
pub trait RequirementCache: Send + Sync {
    /// Cached list for `fingerprint` if present and not expired.
    fn lookup(&self, fingerprint: &str) -> Option<Vec<Requirement>>;

    /// Write or overwrite the entry for `fingerprint`, stamped now.
    fn store(&self, fingerprint: &str, requirements: &[Requirement]);
}

/// Collapse whitespace runs and trim, so layout differences from text extraction
/// do not change the fingerprint.
pub fn normalize_spec_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 of the normalized text, URL-safe base64 without padding.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(normalize_spec_text(text).as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

fn is_valid_fingerprint(fingerprint: &str) -> bool {
    !fingerprint.is_empty()
        && fingerprint
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ═══════════════════════════════════════════════════════════
// Filesystem cache
// ═══════════════════════════════════════════════════════════

/// One JSON file per fingerprint. Writes go to a temp file in the same
/// directory and are renamed into place, so a racing writer never leaves a
/// torn entry; the last rename wins.
pub struct FileRequirementCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileRequirementCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &str) -> Result<PathBuf, CacheError> {
        if !is_valid_fingerprint(fingerprint) {
            return Err(CacheError::InvalidFingerprint(fingerprint.to_string()));
        }
        Ok(self.dir.join(format!("{fingerprint}.json")))
    }

    fn read_entry(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.entry_path(fingerprint)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn write_entry(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(&entry.fingerprint)?;
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, entry)?;
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }
}

impl RequirementCache for FileRequirementCache {
    fn lookup(&self, fingerprint: &str) -> Option<Vec<Requirement>> {
        match self.read_entry(fingerprint) {
            Ok(Some(entry)) if entry.is_fresh(Utc::now(), self.ttl) => Some(entry.requirements),
            Ok(Some(_)) => {
                tracing::debug!(fingerprint, "Cache entry expired");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(fingerprint, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    fn store(&self, fingerprint: &str, requirements: &[Requirement]) {
        let entry = CacheEntry::new(fingerprint, requirements);
        if let Err(e) = self.write_entry(&entry) {
            tracing::warn!(fingerprint, error = %e, "Cache write failed, continuing without cache");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// In-memory cache
// ═══════════════════════════════════════════════════════════

/// Process-local cache. Used when no cache directory is configured, and in tests.
pub struct MemoryRequirementCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl MemoryRequirementCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Insert a pre-built entry (keeps its timestamp).
    pub fn insert_entry(&self, entry: CacheEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(entry.fingerprint.clone(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRequirementCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl RequirementCache for MemoryRequirementCache {
    fn lookup(&self, fingerprint: &str) -> Option<Vec<Requirement>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(fingerprint)
            .filter(|entry| entry.is_fresh(Utc::now(), self.ttl))
            .map(|entry| entry.requirements.clone())
    }

    fn store(&self, fingerprint: &str, requirements: &[Requirement]) {
        self.insert_entry(CacheEntry::new(fingerprint, requirements));
    }
}
