//! Error types for the pdf2search library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the run cannot proceed at all (missing
//!   endpoint configuration, unreadable metadata store, corrupt PDF, an index
//!   that never became writable). Returned as `Err(PipelineError)` from the
//!   top-level entry points.
//!
//! * [`RecordError`] — **Non-fatal**: a single image record failed (its file
//!   vanished, the index rejected one write, one caption call exhausted its
//!   retries) but every other record is fine. Recorded in
//!   [`crate::ingest::IngestReport`] so callers can audit partial success
//!   rather than losing the whole run to one bad record.
//!
//! Two outcomes deliberately do NOT appear here:
//!
//! * A missing embedding is not an error. The Embedding Adapter returns
//!   `Option<Vec<f32>>` and `None` means "index this document without a
//!   vector" — it stays reachable by field filters, just not by k-NN.
//! * A failed or malformed query response is not an error either: the query
//!   path logs and returns empty hits, never a crash (best-effort read path).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2search library.
///
/// Per-record failures use [`RecordError`] and are collected in
/// [`crate::ingest::IngestReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// A required configuration value (endpoint, index name, …) is unset.
    #[error("Missing configuration: '{field}' must be set before the pipeline can run")]
    MissingConfig { field: &'static str },

    /// The search mode string is not one of the two recognised modes.
    #[error("Unknown search mode '{value}' (expected \"imagesearch\" or \"contentsearch\")")]
    InvalidMode { value: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Metadata store errors ─────────────────────────────────────────────
    /// The metadata store file could not be read or parsed.
    #[error("Failed to read metadata store '{path}': {detail}")]
    MetadataStore { path: PathBuf, detail: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt or unreadable: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium returned an error while rasterising a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The captioning provider is not initialised (missing API key etc.).
    #[error("Caption provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not write extracted images or the metadata store file.
    #[error("Failed to write extraction output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Index errors ──────────────────────────────────────────────────────
    /// The index never accepted a write: the settling interval elapsed and
    /// the bounded post-creation retry also failed before any document was
    /// indexed. Access-policy propagation on a freshly created index is
    /// asynchronous; writes issued too early fail or are silently dropped.
    #[error("Search index not writable after settling: {detail}")]
    IndexUnavailable { detail: String },

    /// The search engine rejected or failed a request outside the
    /// per-record write path (e.g. the readiness probe errored hard).
    #[error("Search index request failed: {detail}")]
    IndexRequest { detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image record.
///
/// Collected in [`crate::ingest::IngestReport`] when a record fails.
/// The overall run continues past any number of these.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// The image file named by the record could not be read.
    #[error("Record '{path}': image unreadable: {detail}")]
    ImageUnreadable { path: String, detail: String },

    /// The index rejected this record's write. The identifier is part of
    /// the message so the gap in the index is auditable from logs alone.
    #[error("Record '{path}': index write rejected: {detail}")]
    WriteRejected { path: String, detail: String },

    /// Captioning failed after all retries during extraction.
    #[error("Record '{path}': caption failed after {retries} retries: {detail}")]
    CaptionFailed {
        path: String,
        retries: u8,
        detail: String,
    },
}

impl RecordError {
    /// The `image_path` of the record this error belongs to.
    pub fn image_path(&self) -> &str {
        match self {
            RecordError::ImageUnreadable { path, .. }
            | RecordError::WriteRejected { path, .. }
            | RecordError::CaptionFailed { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_display() {
        let e = PipelineError::MissingConfig { field: "endpoint" };
        assert!(e.to_string().contains("endpoint"));
    }

    #[test]
    fn invalid_mode_display() {
        let e = PipelineError::InvalidMode {
            value: "hybridsearch".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("hybridsearch"));
        assert!(msg.contains("imagesearch"));
    }

    #[test]
    fn write_rejected_names_the_record() {
        let e = RecordError::WriteRejected {
            path: "images/page_3.png".into(),
            detail: "HTTP 403".into(),
        };
        assert!(e.to_string().contains("page_3.png"));
        assert_eq!(e.image_path(), "images/page_3.png");
    }

    #[test]
    fn image_unreadable_display() {
        let e = RecordError::ImageUnreadable {
            path: "images/missing.png".into(),
            detail: "No such file".into(),
        };
        assert!(e.to_string().contains("missing.png"));
    }
}
