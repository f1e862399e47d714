//! Integration tests for the docpipe pipeline.
//!
//! Everything here runs offline: LLM backends are replaced with mock
//! [`ChunkParser`] implementations and link fetching with a mock
//! [`LinkFetcher`], so these tests exercise the dispatcher's ordering
//! guarantees, the segment pipeline, and recursion bounds without an API key
//! or network access.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use docpipe::dispatch::dispatch;
use docpipe::expand::{discover_urls, expand, LinkFetcher};
use docpipe::pipeline::backend::{ChunkOutput, ChunkParser};
use docpipe::pipeline::split::Chunk;
use docpipe::{
    parse, parse_to_file, CostMapping, DocPipeError, PageSelection, ParseConfig, ParseResult,
    ParserKind, Segment, StaticFramework, Strategy, TokenUsage,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn make_chunks(n: usize, pages_each: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| Chunk {
            index: i,
            path: PathBuf::from(format!("chunk_{i}.pdf")),
            start_page: i * pages_each + 1,
            end_page: (i + 1) * pages_each,
        })
        .collect()
}

/// Mock backend that sleeps longer for earlier chunks, so later chunks finish
/// first when run concurrently. Output order must not change.
struct ReverseDelayParser {
    n_chunks: usize,
}

#[async_trait]
impl ChunkParser for ReverseDelayParser {
    async fn parse_chunk(&self, chunk: &Chunk) -> Result<ChunkOutput, DocPipeError> {
        let delay = (self.n_chunks - chunk.index) as u64 * 10;
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let segments: Vec<Segment> = (chunk.start_page..=chunk.end_page)
            .map(|page| Segment {
                title: "mock".into(),
                page,
                content: format!("page {page}"),
            })
            .collect();
        Ok(ChunkOutput {
            raw: format!("chunk {}", chunk.index),
            segments,
            usage: TokenUsage {
                input: 100,
                output: 10,
                llm_page_count: chunk.end_page - chunk.start_page + 1,
                total: 110,
            },
        })
    }
}

/// Mock backend that fails on one specific chunk.
struct FailingParser {
    fail_index: usize,
}

#[async_trait]
impl ChunkParser for FailingParser {
    async fn parse_chunk(&self, chunk: &Chunk) -> Result<ChunkOutput, DocPipeError> {
        if chunk.index == self.fail_index {
            return Err(DocPipeError::LlmBackend {
                start_page: chunk.start_page,
                detail: "simulated quota exhaustion".into(),
            });
        }
        Ok(ChunkOutput {
            raw: format!("chunk {}", chunk.index),
            ..ChunkOutput::default()
        })
    }
}

// ── Dispatcher ordering and aggregation ──────────────────────────────────────

#[tokio::test]
async fn merged_output_is_in_chunk_order_despite_reverse_completion() {
    let chunks = make_chunks(10, 4);
    let parser = std::sync::Arc::new(ReverseDelayParser { n_chunks: 10 });

    for workers in [1, 3, 4, 10, 32] {
        let merged = dispatch(chunks.clone(), parser.clone(), workers)
            .await
            .unwrap();

        let expected_raw: Vec<String> = (0..10).map(|i| format!("chunk {i}")).collect();
        assert_eq!(
            merged.raw,
            expected_raw.join("\n\n"),
            "raw out of order with {workers} workers"
        );

        let pages: Vec<usize> = merged.segments.iter().map(|s| s.page).collect();
        let expected_pages: Vec<usize> = (1..=40).collect();
        assert_eq!(pages, expected_pages, "segments out of order with {workers} workers");
    }
}

#[tokio::test]
async fn ten_pages_in_fours_across_three_workers() {
    // 10 pages, 4 per split: chunks [1-4], [5-8], [9-10].
    let chunks = vec![
        Chunk {
            index: 0,
            path: PathBuf::from("split_0001_0004.pdf"),
            start_page: 1,
            end_page: 4,
        },
        Chunk {
            index: 1,
            path: PathBuf::from("split_0005_0008.pdf"),
            start_page: 5,
            end_page: 8,
        },
        Chunk {
            index: 2,
            path: PathBuf::from("split_0009_0010.pdf"),
            start_page: 9,
            end_page: 10,
        },
    ];
    let parser = std::sync::Arc::new(ReverseDelayParser { n_chunks: 3 });
    let merged = dispatch(chunks, parser, 3).await.unwrap();

    assert_eq!(merged.segments.len(), 10);
    let pages: Vec<usize> = merged.segments.iter().map(|s| s.page).collect();
    assert_eq!(pages, (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn usage_is_summed_across_all_chunks() {
    let chunks = make_chunks(5, 2);
    let parser = std::sync::Arc::new(ReverseDelayParser { n_chunks: 5 });
    let merged = dispatch(chunks, parser, 3).await.unwrap();

    assert_eq!(merged.usage.input, 500);
    assert_eq!(merged.usage.output, 50);
    assert_eq!(merged.usage.llm_page_count, 10);
    assert_eq!(merged.usage.total, 550);
}

#[tokio::test]
async fn chunk_failure_aborts_the_whole_dispatch() {
    let chunks = make_chunks(6, 1);
    let parser = std::sync::Arc::new(FailingParser { fail_index: 3 });
    let err = dispatch(chunks, parser, 4).await.unwrap_err();

    match err {
        DocPipeError::LlmBackend { start_page, .. } => assert_eq!(start_page, 4),
        other => panic!("expected LlmBackend error, got {other}"),
    }
}

// ── End-to-end parsing of textual sources (no pdfium, no network) ────────────

#[tokio::test]
async fn text_file_parses_to_single_segment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "First line.\n\nSecond paragraph.\n").unwrap();

    let config = ParseConfig::builder()
        .strategy(Strategy::Static)
        .build()
        .unwrap();
    let result = parse(path.to_str().unwrap(), &config).await.unwrap();

    assert_eq!(result.title, "notes.txt");
    assert_eq!(result.strategy_used, ParserKind::Static);
    assert_eq!(result.segments.len(), 1);
    assert_eq!(result.segments[0].page, 1);
    assert!(result.raw.contains("Second paragraph."));
    assert_eq!(result.token_usage.total, 0);
    assert!(result.recursive_docs.is_empty());
}

#[tokio::test]
async fn html_file_is_stripped_to_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.html");
    std::fs::write(
        &path,
        "<html><head><title>T</title><script>var x = 1;</script></head>\
         <body><h1>Heading</h1><p>Body &amp; soul</p></body></html>",
    )
    .unwrap();

    let config = ParseConfig::builder()
        .strategy(Strategy::Static)
        .build()
        .unwrap();
    let result = parse(path.to_str().unwrap(), &config).await.unwrap();

    assert!(result.raw.contains("Heading"));
    assert!(result.raw.contains("Body & soul"));
    assert!(!result.raw.contains("<h1>"));
    assert!(!result.raw.contains("var x"));
}

#[tokio::test]
async fn llm_strategy_on_text_downgrades_to_static() {
    // No API key is configured in the test environment; if the downgrade did
    // not happen this would fail with ProviderNotConfigured.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.md");
    std::fs::write(&path, "# Title\n\nContent.\n").unwrap();

    let config = ParseConfig::builder()
        .strategy(Strategy::Llm)
        .build()
        .unwrap();
    let result = parse(path.to_str().unwrap(), &config).await.unwrap();

    assert_eq!(result.strategy_used, ParserKind::Static);
    assert!(result.raw.contains("# Title"));
}

#[tokio::test]
async fn missing_file_is_reported() {
    let config = ParseConfig::default();
    let err = parse("/no/such/file.pdf", &config).await.unwrap_err();
    assert!(matches!(err, DocPipeError::FileNotFound { .. }));
}

#[tokio::test]
async fn unknown_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.xyz");
    std::fs::write(&path, "???").unwrap();

    let config = ParseConfig::default();
    let err = parse(path.to_str().unwrap(), &config).await.unwrap_err();
    match err {
        DocPipeError::UnsupportedFormat { extension, .. } => assert_eq!(extension, ".xyz"),
        other => panic!("expected UnsupportedFormat, got {other}"),
    }
}

#[tokio::test]
async fn parse_to_file_writes_the_raw_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.txt");
    std::fs::write(&input, "hello world\n").unwrap();
    let output = dir.path().join("out/doc.md");

    let config = ParseConfig::builder()
        .strategy(Strategy::Static)
        .build()
        .unwrap();
    let result = parse_to_file(input.to_str().unwrap(), &output, &config)
        .await
        .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written.trim_end(), result.raw);
    assert!(written.ends_with('\n'));
    assert!(written.contains("hello world"));
}

// ── Cost reporting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn static_parse_with_rate_table_reports_zero_cost() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "text").unwrap();

    let mut table = HashMap::new();
    table.insert(
        "gpt-4.1-nano".to_string(),
        docpipe::cost::ModelRate {
            input: 0.10,
            input_image: 0.001,
            output: 0.40,
        },
    );
    let config = ParseConfig::builder()
        .strategy(Strategy::Static)
        .api_cost_mapping(CostMapping::Inline(table))
        .build()
        .unwrap();

    let result = parse(path.to_str().unwrap(), &config).await.unwrap();
    let cost = result.token_cost.expect("rate table entry should price");
    assert_eq!(cost.total, 0.0);
}

#[tokio::test]
async fn unknown_model_in_rate_table_yields_no_cost_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "text").unwrap();

    let config = ParseConfig::builder()
        .strategy(Strategy::Static)
        .model("some-unlisted-model")
        .api_cost_mapping(CostMapping::Inline(HashMap::new()))
        .build()
        .unwrap();

    let result = parse(path.to_str().unwrap(), &config).await.unwrap();
    assert!(result.token_cost.is_none());
}

#[tokio::test]
async fn malformed_rate_table_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("a.txt");
    std::fs::write(&doc, "text").unwrap();
    let table = dir.path().join("rates.json");
    std::fs::write(&table, "{not json").unwrap();

    let config = ParseConfig::builder()
        .strategy(Strategy::Static)
        .api_cost_mapping(CostMapping::File(table))
        .build()
        .unwrap();

    let err = parse(doc.to_str().unwrap(), &config).await.unwrap_err();
    assert!(matches!(err, DocPipeError::CostMapping { .. }));
}

// ── Recursive link expansion ─────────────────────────────────────────────────

/// Mock fetcher whose every fetched document links onward, so only the depth
/// bound terminates the recursion.
struct SelfLinkingFetcher {
    fetches: AtomicUsize,
}

fn linked_result(title: &str, parent: &str) -> ParseResult {
    ParseResult {
        raw: "see https://example.com/next.txt".into(),
        segments: vec![Segment {
            title: title.into(),
            page: 1,
            content: "see https://example.com/next.txt".into(),
        }],
        title: title.into(),
        url: Some("https://example.com/next.txt".into()),
        parent_title: Some(parent.into()),
        recursive_docs: vec![],
        token_usage: TokenUsage::default(),
        token_cost: None,
        strategy_used: ParserKind::Static,
    }
}

#[async_trait]
impl LinkFetcher for SelfLinkingFetcher {
    async fn fetch(
        &self,
        _url: &str,
        depth: usize,
        parent_title: &str,
    ) -> Result<ParseResult, DocPipeError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut result = linked_result(&format!("doc-{n}"), parent_title);
        expand(&mut result, depth, self).await?;
        Ok(result)
    }
}

#[tokio::test]
async fn expansion_is_bounded_by_depth() {
    let fetcher = SelfLinkingFetcher {
        fetches: AtomicUsize::new(0),
    };
    let mut root = linked_result("root", "");
    root.parent_title = None;

    expand(&mut root, 3, &fetcher).await.unwrap();

    // depth 3: root + child + grandchild, no further.
    assert_eq!(root.tree_depth(), 3);
    assert_eq!(root.document_count(), 3);
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(
        root.recursive_docs[0].parent_title.as_deref(),
        Some("root")
    );
}

#[tokio::test]
async fn depth_one_never_fetches() {
    let fetcher = SelfLinkingFetcher {
        fetches: AtomicUsize::new(0),
    };
    let mut root = linked_result("root", "");
    expand(&mut root, 1, &fetcher).await.unwrap();

    assert!(root.recursive_docs.is_empty());
    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
}

#[test]
fn stripped_html_pages_keep_discoverable_links() {
    let html = r#"<body><p>See the <a href="https://example.com/next.pdf">appendix</a>.</p></body>"#;
    let text = docpipe::pipeline::static_parse::strip_html_tags(html);
    let urls = discover_urls(&text);
    assert_eq!(urls, vec!["https://example.com/next.pdf".to_string()]);
}

#[test]
fn url_discovery_handles_markdown_links_and_bare_urls() {
    let text = "see [report](https://example.com/report.pdf), also www.example.org/a. \
                and https://plain.example.net/x;";
    let urls = discover_urls(text);
    assert!(urls.contains(&"https://example.com/report.pdf".to_string()));
    assert!(urls.contains(&"https://www.example.org/a".to_string()));
    assert!(urls.contains(&"https://plain.example.net/x".to_string()));
}

// ── Page selection on non-PDF sources ────────────────────────────────────────

#[tokio::test]
async fn page_selection_is_ignored_for_non_paginated_sources() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "one page only").unwrap();

    let config = ParseConfig::builder()
        .strategy(Strategy::Static)
        .page_nums(PageSelection::Range(1, 3))
        .static_framework(StaticFramework::Pdfium)
        .build()
        .unwrap();

    let result = parse(path.to_str().unwrap(), &config).await.unwrap();
    assert_eq!(result.segments.len(), 1);
}
