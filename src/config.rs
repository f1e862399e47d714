//! Configuration types for document parsing.
//!
//! All behaviour is controlled through [`ParseConfig`], built via its
//! [`ParseConfigBuilder`]. Every option is an explicit, named field with a
//! documented default; there is no open-ended option bag, so an unrecognised
//! option is a compile error at the caller rather than a silently ignored
//! key at runtime.

use crate::error::DocPipeError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Parsing strategy requested by the caller.
///
/// `Auto` exists only at the API surface: the router resolves it to a
/// concrete [`ParserKind`] before any strategy-specific code runs, and a
/// routed call gains exactly one fallback attempt with the other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Let the router pick between static and LLM parsing (default).
    #[default]
    Auto,
    /// Deterministic text extraction only.
    Static,
    /// Vision-LLM parsing only.
    Llm,
}

/// A concrete parser family. This is the tag used everywhere below the
/// router; `Auto` is unrepresentable here by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParserKind {
    Static,
    Llm,
}

impl ParserKind {
    /// The other family, used by the one-shot fallback.
    pub fn other(self) -> ParserKind {
        match self {
            ParserKind::Static => ParserKind::Llm,
            ParserKind::Llm => ParserKind::Static,
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserKind::Static => write!(f, "static"),
            ParserKind::Llm => write!(f, "llm"),
        }
    }
}

/// Tie-break preference for the router when both strategies could work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RouterPriority {
    /// Prefer the faster path: static extraction whenever the document has
    /// any meaningful extractable text (default).
    #[default]
    Speed,
    /// Prefer the cheaper path: static extraction unless it yields too
    /// little text to be trustworthy, then escalate to the LLM.
    Cost,
    /// Always use the LLM.
    Accuracy,
}

/// Which deterministic extraction library backs the static strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StaticFramework {
    /// Layout-aware per-page text via pdfium (default).
    #[default]
    Pdfium,
    /// The `pdf-extract` crate; pages delimited by form feeds.
    PdfExtract,
}

impl fmt::Display for StaticFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticFramework::Pdfium => write!(f, "pdfium"),
            StaticFramework::PdfExtract => write!(f, "pdf-extract"),
        }
    }
}

/// Restricts parsing to a sub-range of the document's pages, applied before
/// splitting. All variants are 1-indexed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Parse all pages (default).
    #[default]
    All,
    /// A single page.
    Single(usize),
    /// A contiguous inclusive range.
    Range(usize, usize),
    /// Specific pages (deduplicated, sorted).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Where the API rate table comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CostMapping {
    /// Inline per-model rates.
    Inline(crate::cost::RateTable),
    /// Path to a JSON file mapping model names to rates.
    File(PathBuf),
}

/// Configuration for a document parse.
///
/// Built via [`ParseConfig::builder()`] or [`ParseConfig::default()`].
///
/// # Example
/// ```rust
/// use docpipe::{ParseConfig, Strategy};
///
/// let config = ParseConfig::builder()
///     .strategy(Strategy::Llm)
///     .pages_per_split(8)
///     .max_workers(2)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ParseConfig {
    /// Parsing strategy. Default: [`Strategy::Auto`].
    pub strategy: Strategy,

    /// Target chunk size in pages. Default: 4.
    ///
    /// Smaller chunks parallelise better and keep single LLM responses short;
    /// larger chunks amortise per-call prompt overhead. The last chunk may be
    /// shorter than this target.
    pub pages_per_split: usize,

    /// Upper bound on parallel workers. Default: 4.
    ///
    /// Chunks are divided into at most this many contiguous groups, one
    /// worker task per group. With `max_workers = 1` everything runs inline
    /// in the calling task, which keeps error stacks simple for small
    /// documents and avoids pool overhead.
    pub max_workers: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses the
    /// provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic"). If None along with
    /// `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    /// Useful in tests or when the caller needs custom middleware.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Deterministic extraction library for the static strategy.
    /// Default: [`StaticFramework::Pdfium`].
    pub static_framework: StaticFramework,

    /// Router tie-break when `strategy = Auto`. Default: [`RouterPriority::Speed`].
    pub router_priority: RouterPriority,

    /// Force conversion to PDF before splitting (currently meaningful for
    /// image sources). Default: false.
    pub as_pdf: bool,

    /// Restrict parsing to these pages before splitting. Default: all.
    pub page_nums: PageSelection,

    /// Recursion bound for link-following. Default: 1 (no recursion).
    ///
    /// With `depth = d`, linked documents are parsed down to `d - 1` further
    /// levels. There is no visited-set: cyclic links terminate only through
    /// this bound.
    pub depth: usize,

    /// Per-model rate table for cost reporting. Default: None (no cost
    /// block on results).
    pub api_cost_mapping: Option<CostMapping>,

    /// Sampling temperature for LLM calls. Default: 0.1.
    ///
    /// Near-zero keeps the model faithful to what is on the page, which is
    /// what transcription wants.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per chunk. Default: 4096.
    pub max_tokens: usize,

    /// Maximum rendered image dimension in pixels when rasterising pages
    /// for vision calls. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            pages_per_split: 4,
            max_workers: 4,
            model: None,
            provider_name: None,
            provider: None,
            static_framework: StaticFramework::default(),
            router_priority: RouterPriority::default(),
            as_pdf: false,
            page_nums: PageSelection::default(),
            depth: 1,
            api_cost_mapping: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_rendered_pixels: 2000,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ParseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseConfig")
            .field("strategy", &self.strategy)
            .field("pages_per_split", &self.pages_per_split)
            .field("max_workers", &self.max_workers)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("static_framework", &self.static_framework)
            .field("router_priority", &self.router_priority)
            .field("as_pdf", &self.as_pdf)
            .field("page_nums", &self.page_nums)
            .field("depth", &self.depth)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ParseConfig {
    /// Create a new builder for `ParseConfig`.
    pub fn builder() -> ParseConfigBuilder {
        ParseConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ParseConfig`].
#[derive(Debug)]
pub struct ParseConfigBuilder {
    config: ParseConfig,
}

impl ParseConfigBuilder {
    pub fn strategy(mut self, s: Strategy) -> Self {
        self.config.strategy = s;
        self
    }

    pub fn pages_per_split(mut self, n: usize) -> Self {
        self.config.pages_per_split = n;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn static_framework(mut self, fw: StaticFramework) -> Self {
        self.config.static_framework = fw;
        self
    }

    pub fn router_priority(mut self, p: RouterPriority) -> Self {
        self.config.router_priority = p;
        self
    }

    pub fn as_pdf(mut self, v: bool) -> Self {
        self.config.as_pdf = v;
        self
    }

    pub fn page_nums(mut self, selection: PageSelection) -> Self {
        self.config.page_nums = selection;
        self
    }

    pub fn depth(mut self, d: usize) -> Self {
        self.config.depth = d;
        self
    }

    pub fn api_cost_mapping(mut self, mapping: CostMapping) -> Self {
        self.config.api_cost_mapping = Some(mapping);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ParseConfig, DocPipeError> {
        let c = &self.config;
        if c.pages_per_split == 0 {
            return Err(DocPipeError::InvalidConfig(
                "pages_per_split must be ≥ 1".into(),
            ));
        }
        if c.max_workers == 0 {
            return Err(DocPipeError::InvalidConfig("max_workers must be ≥ 1".into()));
        }
        if c.depth == 0 {
            return Err(DocPipeError::InvalidConfig("depth must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_zero_workers() {
        let err = ParseConfig::builder().max_workers(0).build().unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn builder_rejects_zero_pages_per_split() {
        assert!(ParseConfig::builder().pages_per_split(0).build().is_err());
    }

    #[test]
    fn builder_rejects_zero_depth() {
        assert!(ParseConfig::builder().depth(0).build().is_err());
    }

    #[test]
    fn parser_kind_other_flips() {
        assert_eq!(ParserKind::Static.other(), ParserKind::Llm);
        assert_eq!(ParserKind::Llm.other(), ParserKind::Static);
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }
}
