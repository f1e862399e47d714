//! The chunk-parser seam: one trait, two backends.
//!
//! The dispatcher only ever sees `Arc<dyn ChunkParser>`; whether a chunk is
//! parsed by deterministic extraction or a vision LLM is decided above this
//! layer (by the router or by the caller's explicit strategy) and never
//! revisited per chunk. Tests drive the dispatcher and fallback controller
//! through mock implementations of this trait.

use crate::error::DocPipeError;
use crate::output::{Segment, TokenUsage};
use crate::pipeline::split::Chunk;

/// One chunk's parse output, before the dispatcher merges chunk outputs
/// into a document.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutput {
    /// The chunk's markdown, page contents joined with `\n\n`.
    pub raw: String,
    /// Per-page segments with globally numbered pages.
    pub segments: Vec<Segment>,
    /// Token counters for this chunk (zero for static parses).
    pub usage: TokenUsage,
}

/// A strategy backend that parses one chunk in isolation.
///
/// Implementations must not retry internally: retry is a whole-document
/// policy owned by [`crate::parse`], and a chunk failure is meant to abort
/// the dispatch promptly.
#[async_trait::async_trait]
pub trait ChunkParser: Send + Sync {
    async fn parse_chunk(&self, chunk: &Chunk) -> Result<ChunkOutput, DocPipeError>;
}

/// Split backend raw text on a page-break marker into globally numbered
/// segments.
///
/// Empty pieces are dropped, but numbering counts every piece: a blank page
/// mid-chunk leaves a gap instead of shifting the pages after it, so segment
/// pages always name the source page they came from. When the marker does
/// not occur at all, the whole text becomes a single segment at
/// `start_page` — the contract for LLM responses that ignored the
/// page-break instruction.
pub fn segment_marked_text(
    text: &str,
    marker: &str,
    title: &str,
    start_page: usize,
    clean: impl Fn(&str) -> String,
) -> (String, Vec<Segment>) {
    let segments: Vec<Segment> = text
        .split(marker)
        .map(|piece| clean(piece))
        .enumerate()
        .filter(|(_, piece)| !piece.is_empty())
        .map(|(local_index, content)| Segment {
            title: title.to_string(),
            page: start_page + local_index,
            content,
        })
        .collect();

    let raw = segments
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    (raw, segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::postprocess;

    #[test]
    fn marker_splits_into_offset_pages() {
        let (raw, segments) = segment_marked_text(
            "page five<page-break>page six<page-break>page seven",
            "<page-break>",
            "doc.pdf",
            5,
            postprocess::clean_text,
        );
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].page, 5);
        assert_eq!(segments[2].page, 7);
        assert_eq!(segments[2].content, "page seven");
        assert_eq!(raw, "page five\n\npage six\n\npage seven");
    }

    #[test]
    fn missing_marker_means_single_segment() {
        let (_, segments) = segment_marked_text(
            "the model forgot the marker",
            "<page-break>",
            "doc.pdf",
            9,
            postprocess::clean_text,
        );
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].page, 9);
    }

    #[test]
    fn blank_page_keeps_following_page_numbers() {
        // A blank middle page is dropped, not renumbered over: the third
        // piece stays page 3.
        let (_, segments) = segment_marked_text(
            "a<page-break>  \n <page-break>b",
            "<page-break>",
            "t",
            1,
            postprocess::clean_text,
        );
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].page, 1);
        assert_eq!(segments[1].page, 3);
        assert_eq!(segments[1].content, "b");
    }

    #[test]
    fn blank_page_gap_respects_chunk_offset() {
        let (_, segments) = segment_marked_text(
            "page five<page-break> <page-break>page seven",
            "<page-break>",
            "doc.pdf",
            5,
            postprocess::clean_text,
        );
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].page, 5);
        assert_eq!(segments[1].page, 7);
    }
}
