//! Result types: segments, token accounting, and the assembled document.
//!
//! Every counter here is a plain value folded by the dispatcher after all
//! workers return. No shared mutable counters cross a worker boundary; the
//! worker's return value is the only channel for usage data, which makes the
//! aggregation commutative and trivially race-free.

use crate::config::ParserKind;
use serde::{Deserialize, Serialize};

/// One page's (or one logical unit's) parsed output.
///
/// `page` is 1-based and globally numbered: chunk-local indices have already
/// had the chunk's `start_page` offset applied by the time a segment exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Source document name (or page title for remote HTML sources).
    pub title: String,
    /// 1-based global page number.
    pub page: usize,
    /// Markdown content of the page.
    pub content: String,
}

/// Token counters for the LLM strategy, summed across chunks.
///
/// All fields stay zero for purely static parses. `llm_page_count` counts
/// pages that went through a vision call and drives the per-page image
/// surcharge in [`crate::cost::price`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    pub input: u64,
    /// Completion tokens produced.
    pub output: u64,
    /// Number of pages processed by the LLM backend.
    pub llm_page_count: usize,
    /// `input + output`.
    pub total: u64,
}

impl TokenUsage {
    /// Fold another chunk's counters into this one, keeping `total` exact.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.llm_page_count += other.llm_page_count;
        self.total = self.input + self.output;
    }
}

/// Monetary cost derived from [`TokenUsage`] and a rate table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenCost {
    /// Cost of prompt tokens (USD).
    pub input: f64,
    /// Flat per-page image surcharge (USD).
    #[serde(rename = "input-image")]
    pub input_image: f64,
    /// Cost of completion tokens (USD).
    pub output: f64,
    /// `input + input_image + output`.
    pub total: f64,
}

/// The aggregate result of parsing one source document.
///
/// Invariants, maintained by the dispatcher merge:
/// * `raw` is the `\n\n`-joined concatenation of chunk raws in chunk order;
/// * `segments` is the concatenation of per-chunk segment lists in chunk
///   order, so page numbers increase monotonically with source order;
/// * `token_usage` is the sum over all chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    /// Full concatenated markdown.
    pub raw: String,
    /// Ordered per-page output.
    pub segments: Vec<Segment>,
    /// Source document name.
    pub title: String,
    /// Original URL, when the source was remote.
    pub url: Option<String>,
    /// Title of the parent document, when produced via recursive expansion.
    pub parent_title: Option<String>,
    /// Results of recursively parsed linked documents (depth-bounded).
    pub recursive_docs: Vec<ParseResult>,
    /// Aggregated token counters.
    pub token_usage: TokenUsage,
    /// Monetary cost, present only when a rate table was supplied and the
    /// model had an entry in it.
    pub token_cost: Option<TokenCost>,
    /// Which parser family actually produced this result.
    pub strategy_used: ParserKind,
}

impl ParseResult {
    /// Total number of documents in the recursion tree, this one included.
    pub fn document_count(&self) -> usize {
        1 + self
            .recursive_docs
            .iter()
            .map(ParseResult::document_count)
            .sum::<usize>()
    }

    /// Depth of the recursion tree rooted at this result (1 = no children).
    pub fn tree_depth(&self) -> usize {
        1 + self
            .recursive_docs
            .iter()
            .map(ParseResult::tree_depth)
            .max()
            .unwrap_or(0)
    }
}
