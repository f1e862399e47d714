//! Error types for the docpipe library.
//!
//! A single fatal error enum covers the whole pipeline. A chunk-level failure
//! deliberately aborts the entire document parse: a Markdown document with
//! silently missing pages is worse than a hard failure, so there is no
//! partial-result error channel. The only automatic recovery anywhere in the
//! crate is the one-shot strategy fallback in [`crate::parse`], and that only
//! applies when the caller asked for automatic strategy selection.

use crate::config::{ParserKind, StaticFramework};
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docpipe library.
#[derive(Debug, Error)]
pub enum DocPipeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// File extension is not in the supported set.
    #[error("unsupported file type '{extension}' for '{path}'\nSupported: pdf, png, jpg, jpeg, tiff, bmp, gif, webp, txt, md, html, htm")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("download timed out after {secs}s for '{url}'\nIncrease download_timeout_secs.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Split errors ──────────────────────────────────────────────────────
    /// Page-range splitting failed on a malformed source.
    #[error("failed to split '{path}' into page chunks: {detail}")]
    SplitFailed { path: PathBuf, detail: String },

    /// A page selection referenced pages the document does not have.
    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The static extraction backend failed on a chunk.
    #[error("static extraction ({framework}) failed for '{path}': {detail}")]
    StaticBackend {
        framework: StaticFramework,
        path: PathBuf,
        detail: String,
    },

    /// The LLM backend failed on a chunk (network, auth, quota, bad response).
    #[error("LLM call failed for chunk starting at page {start_page}: {detail}")]
    LlmBackend { start_page: usize, detail: String },

    /// Chunk pages could not be rasterised for the vision request.
    #[error("rasterisation failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// No LLM provider could be resolved (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Cost errors ───────────────────────────────────────────────────────
    /// The rate table was requested but is malformed or unreadable.
    #[error("invalid API cost mapping: {detail}")]
    CostMapping { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DocPipeError {
    /// Whether this error came from a parsing backend (as opposed to input
    /// resolution or configuration). Used by logging in the fallback path to
    /// distinguish "the strategy failed" from "the call was malformed".
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            DocPipeError::StaticBackend { .. }
                | DocPipeError::LlmBackend { .. }
                | DocPipeError::RenderFailed { .. }
        )
    }

    /// The parser family that produced this error, if any.
    pub fn backend_kind(&self) -> Option<ParserKind> {
        match self {
            DocPipeError::StaticBackend { .. } => Some(ParserKind::Static),
            DocPipeError::LlmBackend { .. } | DocPipeError::RenderFailed { .. } => {
                Some(ParserKind::Llm)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = DocPipeError::UnsupportedFormat {
            path: PathBuf::from("report.xlsx"),
            extension: ".xlsx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".xlsx"), "got: {msg}");
        assert!(msg.contains("report.xlsx"));
    }

    #[test]
    fn split_failed_display() {
        let e = DocPipeError::SplitFailed {
            path: PathBuf::from("broken.pdf"),
            detail: "xref table corrupt".into(),
        };
        assert!(e.to_string().contains("broken.pdf"));
        assert!(e.to_string().contains("xref table corrupt"));
    }

    #[test]
    fn backend_kind_classification() {
        let stat = DocPipeError::StaticBackend {
            framework: StaticFramework::Pdfium,
            path: PathBuf::from("x.pdf"),
            detail: "no text".into(),
        };
        assert_eq!(stat.backend_kind(), Some(ParserKind::Static));
        assert!(stat.is_backend_error());

        let llm = DocPipeError::LlmBackend {
            start_page: 5,
            detail: "HTTP 429".into(),
        };
        assert_eq!(llm.backend_kind(), Some(ParserKind::Llm));

        let cfg = DocPipeError::InvalidConfig("bad".into());
        assert_eq!(cfg.backend_kind(), None);
        assert!(!cfg.is_backend_error());
    }
}
