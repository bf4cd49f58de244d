//! Error types for the grobid2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Grobid2MdError`] is **fatal**: the conversion cannot proceed at all
//!   (missing PDF, GROBID down, TEI that is not well-formed XML). Returned as
//!   `Err(Grobid2MdError)` from the top-level `convert*` / `run_pipeline`
//!   functions.
//!
//! * [`TaskError`] is **non-fatal**: a single LLM task (summary, citation
//!   analysis, query, node summary) failed after all retries. Stored in
//!   [`crate::output::RagResults`] so the rest of the run is kept.
//!
//! Missing TEI fields are not errors at all: they resolve to empty strings
//! and empty collections inside [`crate::paper::Paper`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the grobid2md library.
#[derive(Debug, Error)]
pub enum Grobid2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input exists but could not be read (a directory, an I/O fault).
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── GROBID errors ─────────────────────────────────────────────────────
    /// The GROBID health check failed.
    #[error(
        "GROBID is not running at {url}\n\
Start it with: docker run --rm -p 8070:8070 lfoppiano/grobid:0.8.1"
    )]
    GrobidUnavailable { url: String },

    /// The request to GROBID could not be sent or its body not read.
    #[error("GROBID request to '{url}' failed: {reason}")]
    GrobidRequestFailed { url: String, reason: String },

    /// GROBID did not answer within the configured timeout.
    #[error("GROBID timed out after {secs}s at '{url}'\nIncrease --grobid-timeout.")]
    GrobidTimeout { url: String, secs: u64 },

    /// GROBID answered with a non-200 status.
    #[error("GROBID returned status {status}: {body}")]
    GrobidStatus { status: u16, body: String },

    // ── TEI errors ────────────────────────────────────────────────────────
    /// The TEI document is not well-formed XML. Retrying will not help.
    #[error("Malformed TEI input at byte {position}: {detail}")]
    MalformedInput { position: u64, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write one of the result files.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A result could not be encoded as JSON.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single LLM task.
///
/// The pipeline records it and carries on with an empty answer for that task.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum TaskError {
    /// LLM call failed after retries.
    #[error("{task}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        task: String,
        retries: u32,
        detail: String,
    },

    /// LLM call timed out on its last attempt.
    #[error("{task}: LLM call timed out after {secs}s")]
    Timeout { task: String, secs: u64 },
}

impl TaskError {
    /// Name of the task that failed.
    pub fn task(&self) -> &str {
        match self {
            TaskError::LlmFailed { task, .. } | TaskError::Timeout { task, .. } => task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_input_display() {
        let e = Grobid2MdError::MalformedInput {
            position: 42,
            detail: "unclosed element <div>".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("byte 42"), "got: {msg}");
        assert!(msg.contains("<div>"));
    }

    #[test]
    fn grobid_unavailable_mentions_docker_hint() {
        let e = Grobid2MdError::GrobidUnavailable {
            url: "http://localhost:8070".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("http://localhost:8070"));
        assert!(msg.contains("lfoppiano/grobid"));
    }

    #[test]
    fn grobid_status_display() {
        let e = Grobid2MdError::GrobidStatus {
            status: 503,
            body: "busy".into(),
        };
        assert_eq!(e.to_string(), "GROBID returned status 503: busy");
    }

    #[test]
    fn task_error_display_and_name() {
        let e = TaskError::LlmFailed {
            task: "summary".into(),
            retries: 4,
            detail: "connection refused".into(),
        };
        assert!(e.to_string().contains("4 retries"));
        assert_eq!(e.task(), "summary");

        let t = TaskError::Timeout {
            task: "query".into(),
            secs: 30,
        };
        assert!(t.to_string().contains("30s"));
        assert_eq!(t.task(), "query");
    }
}
