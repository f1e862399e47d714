//! # docpipe
//!
//! Parse documents (PDF, images, HTML, plain text, URLs) into structured
//! Markdown, choosing between fast static extraction and vision-LLM
//! transcription per document.
//!
//! ## Why this crate?
//!
//! Static text extraction (pdfium, pdf-extract) is fast and free, but fails
//! on scanned pages, multi-column layouts, and tables. Vision models read
//! pages the way a human would, but cost tokens and time. This crate routes
//! each document to the right strategy, falls back to the other one when the
//! routed choice fails, and parallelises large documents across page chunks
//! while keeping the output in page order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input (path or URL)
//!  │
//!  ├─ 1. Resolve   local file, download, or remote web page
//!  ├─ 2. Route     AUTO → static or LLM, via text-density sampling
//!  ├─ 3. Split     PDF → sub-PDF chunks of N pages each
//!  ├─ 4. Dispatch  chunk groups across workers, ordered reassembly
//!  │      ├─ static  pdfium / pdf-extract text extraction
//!  │      └─ llm     rasterise → base64 → vision chat completion
//!  ├─ 5. Assemble  segments + <page-break> markers → one document
//!  ├─ 6. Price     token usage → dollars, from a model rate table
//!  └─ 7. Expand    recursively parse linked URLs up to a depth
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docpipe::{parse, ParseConfig, Strategy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Auto routing: text-heavy PDFs go static, scans go to the LLM.
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ParseConfig::builder()
//!         .strategy(Strategy::Auto)
//!         .build()?;
//!     let result = parse("document.pdf", &config).await?;
//!     println!("{}", result.raw);
//!     eprintln!(
//!         "{} segments via {}, {} tokens",
//!         result.segments.len(),
//!         result.strategy_used,
//!         result.token_usage.total
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docpipe` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docpipe = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod cost;
pub mod dispatch;
pub mod error;
pub mod expand;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod prompts;
pub mod router;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CostMapping, PageSelection, ParseConfig, ParseConfigBuilder, ParserKind, RouterPriority,
    StaticFramework, Strategy,
};
pub use error::DocPipeError;
pub use expand::LinkFetcher;
pub use output::{ParseResult, Segment, TokenCost, TokenUsage};
pub use parse::{parse, parse_sync, parse_to_file};
pub use prompts::PAGE_BREAK_MARKER;
