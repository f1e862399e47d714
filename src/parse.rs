//! Top-level parse entry points and the one-shot strategy fallback.
//!
//! ## Call flow
//!
//! ```text
//! parse ─▶ resolve input ─▶ router (AUTO only) ─▶ attempt
//!                                                   │ error + routed
//!                                                   ▼
//!                                             attempt (other strategy)
//! attempt = scratch dir ─▶ as_pdf / page_nums ─▶ split ─▶ dispatch ─▶ merge
//! then: cost pricing ─▶ recursive expansion
//! ```
//!
//! The fallback is bounded by construction: it fires only when the call was
//! routed (the caller asked for AUTO), and the retry clears the routed flag,
//! so a second failure propagates unconditionally. An explicitly requested
//! strategy never falls back — the caller said what they wanted.

use crate::config::{ParseConfig, ParserKind, Strategy};
use crate::cost;
use crate::dispatch;
use crate::error::DocPipeError;
use crate::expand::{self, LinkFetcher};
use crate::output::{ParseResult, Segment, TokenUsage};
use crate::pipeline::backend::ChunkParser;
use crate::pipeline::input::{self, ResolvedInput, SourceKind};
use crate::pipeline::llm::{resolve_provider, LlmChunkParser};
use crate::pipeline::split::{self, Chunk};
use crate::pipeline::static_parse::{self, StaticChunkParser};
use crate::pipeline::postprocess;
use futures::future::BoxFuture;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Parse a document or URL into structured Markdown.
///
/// This is the primary entry point for the library. The source may be a
/// local file path or an HTTP/HTTPS URL; supported file types are PDF,
/// raster images, plain text/Markdown, and HTML. URLs that do not name a
/// supported file are fetched and parsed as web pages.
///
/// # Errors
/// Any failure aborts the whole call: there is no partial result with
/// silently missing pages. The only automatic recovery is a single retry
/// with the other strategy when `strategy = Auto` routed the first attempt.
pub async fn parse(input: impl AsRef<str>, config: &ParseConfig) -> Result<ParseResult, DocPipeError> {
    parse_recursive(input.as_ref().to_string(), config.clone(), config.depth, None).await
}

/// Parse a document and write its assembled markdown to a file.
///
/// Uses an atomic write (temp file + rename) to prevent partial output.
pub async fn parse_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ParseConfig,
) -> Result<ParseResult, DocPipeError> {
    let result = parse(input, config).await?;
    let path = output_path.as_ref();

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DocPipeError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let mut contents = result.raw.clone();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &contents)
        .await
        .map_err(|e| DocPipeError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| DocPipeError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(result)
}

/// Synchronous wrapper around [`parse`]. Creates a temporary Tokio runtime.
pub fn parse_sync(input: impl AsRef<str>, config: &ParseConfig) -> Result<ParseResult, DocPipeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocPipeError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(parse(input, config))
}

// ── Recursion plumbing ───────────────────────────────────────────────────

/// Boxed recursive entry point: the expander re-enters here for linked
/// documents with a decremented depth.
fn parse_recursive(
    input: String,
    config: ParseConfig,
    depth: usize,
    parent_title: Option<String>,
) -> BoxFuture<'static, Result<ParseResult, DocPipeError>> {
    Box::pin(async move {
        let mut result = parse_one(&input, &config, parent_title).await?;

        if depth > 1 {
            let fetcher = RecursiveFetcher {
                config: config.clone(),
            };
            expand::expand(&mut result, depth, &fetcher).await?;
        }

        Ok(result)
    })
}

struct RecursiveFetcher {
    config: ParseConfig,
}

#[async_trait::async_trait]
impl LinkFetcher for RecursiveFetcher {
    async fn fetch(
        &self,
        url: &str,
        depth: usize,
        parent_title: &str,
    ) -> Result<ParseResult, DocPipeError> {
        parse_recursive(
            url.to_string(),
            self.config.clone(),
            depth,
            Some(parent_title.to_string()),
        )
        .await
    }
}

// ── One document, fallback included ──────────────────────────────────────

async fn parse_one(
    input: &str,
    config: &ParseConfig,
    parent_title: Option<String>,
) -> Result<ParseResult, DocPipeError> {
    info!("Parsing: {input}");
    let resolved = input::resolve_input(input, config.download_timeout_secs).await?;

    // URLs without a file representation are read as web pages.
    if let ResolvedInput::RemoteHtml { url } = &resolved {
        let mut result = parse_remote_html(url, config).await?;
        result.parent_title = parent_title;
        return Ok(result);
    }

    let (path, kind, url) = match resolved {
        ResolvedInput::Local { ref path, kind } => (path.clone(), kind, None),
        ResolvedInput::Downloaded {
            ref path,
            kind,
            ref url,
            ..
        } => (path.clone(), kind, Some(url.clone())),
        ResolvedInput::RemoteHtml { .. } => unreachable!("handled above"),
    };
    // `resolved` stays alive until the end of this call so a downloaded
    // source's scratch directory is not cleaned up mid-parse.

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string());

    let (primary, routed) = resolve_strategy(&path, kind, config).await;

    let mut result = run_with_fallback(primary, routed, |parser_kind| {
        parse_attempt(path.clone(), kind, parser_kind, title.clone(), config)
    })
    .await?;

    result.url = url;
    result.parent_title = parent_title;

    if let Some(ref mapping) = config.api_cost_mapping {
        let table = cost::load_rate_table(mapping)?;
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        result.token_cost = cost::price(&result.token_usage, &table, model);
    }

    Ok(result)
}

/// Resolve the caller's strategy to a concrete parser kind, marking routed
/// calls so the fallback knows it may retry.
async fn resolve_strategy(
    path: &Path,
    kind: SourceKind,
    config: &ParseConfig,
) -> (ParserKind, bool) {
    // The vision path cannot ingest textual formats; honour the intent as
    // far as possible rather than failing.
    if config.strategy == Strategy::Llm && matches!(kind, SourceKind::Text | SourceKind::Html) {
        warn!("LLM strategy does not support {kind:?} sources; using static parsing");
        return (ParserKind::Static, false);
    }

    match config.strategy {
        Strategy::Static => (ParserKind::Static, false),
        Strategy::Llm => (ParserKind::Llm, false),
        Strategy::Auto => {
            let decided = crate::router::decide(path, kind, config.router_priority).await;
            debug!("Auto-routed to {decided}");
            (decided, true)
        }
    }
}

/// Run one full-document attempt, retrying exactly once with the other
/// strategy when the first routed attempt fails.
pub(crate) async fn run_with_fallback<F, Fut>(
    primary: ParserKind,
    routed: bool,
    attempt: F,
) -> Result<ParseResult, DocPipeError>
where
    F: Fn(ParserKind) -> Fut,
    Fut: Future<Output = Result<ParseResult, DocPipeError>>,
{
    match attempt(primary).await {
        Ok(result) => Ok(result),
        Err(e) if routed => {
            let fallback = primary.other();
            warn!("{primary} parsing failed ({e}); retrying with {fallback}");
            // The retry is not routed; its failure propagates unconditionally.
            attempt(fallback).await
        }
        Err(e) => Err(e),
    }
}

/// One full parse attempt under a concrete strategy: scratch dir, optional
/// PDF conversion and page selection, split, dispatch, merge.
async fn parse_attempt(
    mut path: PathBuf,
    mut kind: SourceKind,
    parser_kind: ParserKind,
    title: String,
    config: &ParseConfig,
) -> Result<ParseResult, DocPipeError> {
    // Scratch storage for chunk files; dropped (and deleted) on every exit
    // path once the dispatch below has finished.
    let scratch = tempfile::TempDir::new()
        .map_err(|e| DocPipeError::Internal(format!("scratch dir: {e}")))?;

    if config.as_pdf && kind == SourceKind::Image {
        debug!("Converting image to PDF before splitting");
        path = split::image_to_pdf(&path, &scratch.path().join("converted.pdf")).await?;
        kind = SourceKind::Pdf;
    }

    let chunks = if kind.is_paginated() {
        let pdf_path = match config.page_nums {
            crate::config::PageSelection::All => path.clone(),
            ref selection => {
                split::extract_page_selection(
                    &path,
                    &scratch.path().join("selected.pdf"),
                    selection,
                )
                .await?
            }
        };
        split::split_pdf(&pdf_path, scratch.path(), config.pages_per_split).await?
    } else {
        vec![Chunk::whole(path.clone())]
    };
    let chunk_count = chunks.len();

    let parser: Arc<dyn ChunkParser> = match parser_kind {
        ParserKind::Static => Arc::new(StaticChunkParser::new(
            title.clone(),
            config.static_framework,
        )),
        ParserKind::Llm => {
            let provider = resolve_provider(config)?;
            Arc::new(LlmChunkParser::new(provider, title.clone(), config))
        }
    };

    let merged = dispatch::dispatch(chunks, parser, config.max_workers).await?;
    info!(
        "Parsed '{title}' via {parser_kind}: {} segments from {} chunk(s), {} tokens",
        merged.segments.len(),
        chunk_count,
        merged.usage.total
    );

    Ok(ParseResult {
        raw: merged.raw,
        segments: merged.segments,
        title,
        url: None,
        parent_title: None,
        recursive_docs: Vec::new(),
        token_usage: merged.usage,
        token_cost: None,
        strategy_used: parser_kind,
    })
}

/// Fetch and statically parse a remote web page into a single segment.
async fn parse_remote_html(url: &str, config: &ParseConfig) -> Result<ParseResult, DocPipeError> {
    let html = input::fetch_html(url, config.download_timeout_secs).await?;
    let title = static_parse::html_title(&html).unwrap_or_else(|| url.to_string());
    let content = postprocess::clean_text(&static_parse::strip_html_tags(&html));

    let segments = if content.is_empty() {
        Vec::new()
    } else {
        vec![Segment {
            title: title.clone(),
            page: 1,
            content: content.clone(),
        }]
    };

    Ok(ParseResult {
        raw: content,
        segments,
        title,
        url: Some(url.to_string()),
        parent_title: None,
        recursive_docs: Vec::new(),
        token_usage: TokenUsage::default(),
        token_cost: None,
        strategy_used: ParserKind::Static,
    })
}
