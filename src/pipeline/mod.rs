//! Pipeline stages between the top-level call and the backends.
//!
//! Each submodule implements one transformation step, so stages stay
//! independently testable and a backend can be swapped without touching its
//! neighbours.
//!
//! ```text
//! input ──▶ split ──▶ backend ─┬─▶ static_parse  (pdfium / pdf-extract)
//! (path/URL) (chunks)          └─▶ render ─▶ encode ─▶ llm ─▶ postprocess
//! ```
//!
//! 1. [`input`]  — canonicalise the user-supplied path or URL, validate the
//!    format before anything else runs
//! 2. [`split`]  — materialise page-range chunks in scratch storage
//! 3. [`backend`] — the `ChunkParser` seam the dispatcher fans out over
//! 4. [`static_parse`] — deterministic extraction, no network
//! 5. [`render`] / [`encode`] — rasterise and base64-wrap chunk pages for
//!    the multimodal request body (pdfium work in `spawn_blocking`)
//! 6. [`llm`]    — the vision call; the only stage with network I/O
//! 7. [`postprocess`] — deterministic cleanup of model quirks

pub mod backend;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
pub mod split;
pub mod static_parse;
