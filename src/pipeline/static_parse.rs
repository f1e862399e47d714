//! Deterministic extraction backends (the static strategy).
//!
//! Two PDF frameworks are supported: layout-aware per-page text via pdfium,
//! and the `pdf-extract` crate, whose output delimits pages with form feeds.
//! Text, Markdown, and HTML sources are single-segment reads; HTML goes
//! through a conservative tag stripper rather than a full DOM — richer
//! HTML-to-markdown conversion is an external concern.
//!
//! Static parsing never touches the network and returns zero token usage.

use crate::config::StaticFramework;
use crate::error::DocPipeError;
use crate::output::{Segment, TokenUsage};
use crate::pipeline::backend::{segment_marked_text, ChunkOutput, ChunkParser};
use crate::pipeline::input::{self, SourceKind};
use crate::pipeline::postprocess;
use crate::pipeline::split::Chunk;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Chunk parser backed by deterministic text extraction.
pub struct StaticChunkParser {
    title: String,
    framework: StaticFramework,
}

impl StaticChunkParser {
    pub fn new(title: impl Into<String>, framework: StaticFramework) -> Self {
        Self {
            title: title.into(),
            framework,
        }
    }
}

#[async_trait::async_trait]
impl ChunkParser for StaticChunkParser {
    async fn parse_chunk(&self, chunk: &Chunk) -> Result<ChunkOutput, DocPipeError> {
        let kind = input::classify_or_reject(&chunk.path)?;
        debug!(
            "Static parse ({}) chunk {} ({:?})",
            self.framework, chunk.index, kind
        );

        match kind {
            SourceKind::Pdf => self.parse_pdf_chunk(chunk).await,
            SourceKind::Text => {
                let content = read_to_string(&chunk.path)?;
                Ok(single_segment_output(
                    &self.title,
                    chunk.start_page,
                    postprocess::clean_text(&content),
                ))
            }
            SourceKind::Html => {
                let html = read_to_string(&chunk.path)?;
                Ok(single_segment_output(
                    &self.title,
                    chunk.start_page,
                    postprocess::clean_text(&strip_html_tags(&html)),
                ))
            }
            SourceKind::Image => Err(DocPipeError::StaticBackend {
                framework: self.framework,
                path: chunk.path.clone(),
                detail: "images have no extractable text; use the LLM strategy".into(),
            }),
        }
    }
}

impl StaticChunkParser {
    async fn parse_pdf_chunk(&self, chunk: &Chunk) -> Result<ChunkOutput, DocPipeError> {
        match self.framework {
            StaticFramework::Pdfium => {
                let pages = extract_pdf_pages(&chunk.path, None).await?;
                let segments: Vec<Segment> = pages
                    .iter()
                    .map(|text| postprocess::clean_text(text))
                    .enumerate()
                    .filter(|(_, text)| !text.is_empty())
                    .map(|(local_index, content)| Segment {
                        title: self.title.clone(),
                        page: chunk.start_page + local_index,
                        content,
                    })
                    .collect();
                let raw = segments
                    .iter()
                    .map(|s| s.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                Ok(ChunkOutput {
                    raw,
                    segments,
                    usage: TokenUsage::default(),
                })
            }
            StaticFramework::PdfExtract => {
                let path = chunk.path.clone();
                let text = tokio::task::spawn_blocking(move || {
                    pdf_extract::extract_text(&path).map_err(|e| (path, e))
                })
                .await
                .map_err(|e| DocPipeError::Internal(format!("extraction task panicked: {e}")))?
                .map_err(|(path, e)| DocPipeError::StaticBackend {
                    framework: self.framework,
                    path,
                    detail: e.to_string(),
                })?;

                // pdf-extract separates pages with a form feed.
                let (raw, segments) = segment_marked_text(
                    &text,
                    "\u{000C}",
                    &self.title,
                    chunk.start_page,
                    postprocess::clean_text,
                );
                Ok(ChunkOutput {
                    raw,
                    segments,
                    usage: TokenUsage::default(),
                })
            }
        }
    }
}

/// Per-page text of a PDF via pdfium, in page order. `max_pages` truncates
/// the scan; the router uses this to sample text density cheaply.
pub async fn extract_pdf_pages(
    path: &Path,
    max_pages: Option<usize>,
) -> Result<Vec<String>, DocPipeError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let pdfium = Pdfium::default();
        let document =
            pdfium
                .load_pdf_from_file(&path, None)
                .map_err(|e| DocPipeError::StaticBackend {
                    framework: StaticFramework::Pdfium,
                    path: path.clone(),
                    detail: format!("{e:?}"),
                })?;

        let pages = document.pages();
        let limit = max_pages.unwrap_or(usize::MAX).min(pages.len() as usize);
        let mut texts = Vec::with_capacity(limit);
        for page in pages.iter().take(limit) {
            let text = page
                .text()
                .map(|t| t.all())
                .unwrap_or_default();
            texts.push(text);
        }
        Ok(texts)
    })
    .await
    .map_err(|e| DocPipeError::Internal(format!("extraction task panicked: {e}")))?
}

fn read_to_string(path: &Path) -> Result<String, DocPipeError> {
    std::fs::read_to_string(path).map_err(|e| DocPipeError::StaticBackend {
        framework: StaticFramework::Pdfium,
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}

fn single_segment_output(title: &str, start_page: usize, content: String) -> ChunkOutput {
    let segments = if content.is_empty() {
        vec![]
    } else {
        vec![Segment {
            title: title.to_string(),
            page: start_page,
            content: content.clone(),
        }]
    };
    ChunkOutput {
        raw: content,
        segments,
        usage: TokenUsage::default(),
    }
}

// ── HTML helpers ─────────────────────────────────────────────────────────

static RE_SCRIPT_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)>").unwrap());
static RE_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap()
});
static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[^>]*>|&(?:[a-z0-9]+|#[0-9]{1,6}|#x[0-9a-f]{1,6});").unwrap());
static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

/// Reduce an HTML document to its visible text. Anchor destinations are
/// rewritten to markdown links first, so recursive expansion can still
/// discover the page's outgoing URLs after the tags are gone.
pub fn strip_html_tags(html: &str) -> String {
    let without_blocks = RE_SCRIPT_STYLE.replace_all(html, " ");
    let with_links = RE_ANCHOR.replace_all(&without_blocks, |caps: &regex::Captures| {
        let href = caps[1].trim();
        let text = caps[2].trim();
        if href.starts_with('#') || href.starts_with("javascript:") {
            text.to_string()
        } else {
            format!("[{text}]({href})")
        }
    });
    // Common entities kept readable before the generic entity strip.
    let readable = with_links
        .replace("&amp;", "&")
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"");
    RE_TAG.replace_all(&readable, " ").to_string()
}

/// The `<title>` of an HTML page, when present and non-empty.
pub fn html_title(html: &str) -> Option<String> {
    RE_TITLE
        .captures(html)
        .map(|caps| caps[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn static_rejects_images() {
        let parser = StaticChunkParser::new("photo.png", StaticFramework::Pdfium);
        let chunk = Chunk::whole(PathBuf::from("photo.png"));
        let err = parser.parse_chunk(&chunk).await.unwrap_err();
        assert!(matches!(err, DocPipeError::StaticBackend { .. }));
    }

    #[tokio::test]
    async fn text_source_is_one_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "First line.\nSecond line.\n").unwrap();

        let parser = StaticChunkParser::new("notes.txt", StaticFramework::Pdfium);
        let out = parser.parse_chunk(&Chunk::whole(path)).await.unwrap();
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].page, 1);
        assert_eq!(out.raw, "First line.\nSecond line.");
        assert_eq!(out.usage, TokenUsage::default());
    }

    #[tokio::test]
    async fn html_source_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(
            &path,
            "<html><head><title>T</title><style>.x{}</style></head>\
             <body><h1>Heading</h1><p>Body &amp; more</p></body></html>",
        )
        .unwrap();

        let parser = StaticChunkParser::new("page.html", StaticFramework::Pdfium);
        let out = parser.parse_chunk(&Chunk::whole(path)).await.unwrap();
        assert_eq!(out.segments.len(), 1);
        assert!(out.raw.contains("Heading"));
        assert!(out.raw.contains("Body & more"));
        assert!(!out.raw.contains("<h1>"));
        assert!(!out.raw.contains(".x{}"));
    }

    #[test]
    fn anchors_keep_their_destinations() {
        let html = r##"<p>Read the <a href="https://example.com/report.pdf">full report</a>
            or jump to a <a href="#section-2">section</a>.</p>"##;
        let text = strip_html_tags(html);
        assert!(text.contains("[full report](https://example.com/report.pdf)"));
        // Fragment links carry no destination worth keeping.
        assert!(text.contains("section"));
        assert!(!text.contains("#section-2"));
    }

    #[test]
    fn title_extraction() {
        assert_eq!(
            html_title("<html><title> Hello </title></html>"),
            Some("Hello".to_string())
        );
        assert_eq!(html_title("<html></html>"), None);
    }
}
