//! The router: resolve automatic strategy selection to a concrete parser.
//!
//! AUTO only exists above this layer. The router inspects the source once,
//! before any chunk is created, and everything downstream works with the
//! concrete [`ParserKind`] it returns. It never errors for a well-formed
//! supported source: a PDF whose text extraction fails is simply treated as
//! having no extractable text, which routes it to the LLM.
//!
//! The heuristic for PDFs is extractable-text density. Scanned or
//! image-heavy documents yield near-zero characters per page from static
//! extraction, and feeding their empty text forward would silently produce
//! an empty document; those go to the vision model. Text-native PDFs parse
//! faster and cheaper statically.

use crate::config::{ParserKind, RouterPriority};
use crate::pipeline::input::SourceKind;
use crate::pipeline::static_parse;
use std::path::Path;
use tracing::debug;

/// Pages sampled from the front of a PDF for the density estimate.
const SAMPLE_PAGES: usize = 4;

/// Minimum extractable chars per page for static parsing to be trusted
/// when the caller optimises for cost.
const COST_CHARS_PER_PAGE: usize = 200;

/// Lower bar when the caller optimises for speed: any meaningful text makes
/// static extraction worthwhile, because it avoids the network round-trip.
const SPEED_CHARS_PER_PAGE: usize = 50;

/// Pick a concrete strategy for a source of the given kind.
pub async fn decide(path: &Path, kind: SourceKind, priority: RouterPriority) -> ParserKind {
    let decision = match kind {
        // No extractable text; only the vision model can read these.
        SourceKind::Image => ParserKind::Llm,
        // Already textual; nothing for a vision model to add.
        SourceKind::Text | SourceKind::Html => ParserKind::Static,
        SourceKind::Pdf => decide_pdf(path, priority).await,
    };
    debug!(
        "Routed '{}' ({kind:?}, {priority:?}) → {decision}",
        path.display()
    );
    decision
}

async fn decide_pdf(path: &Path, priority: RouterPriority) -> ParserKind {
    let threshold = match priority {
        RouterPriority::Accuracy => return ParserKind::Llm,
        RouterPriority::Cost => COST_CHARS_PER_PAGE,
        RouterPriority::Speed => SPEED_CHARS_PER_PAGE,
    };

    // Extraction failure counts as zero text, not as an error.
    let pages = static_parse::extract_pdf_pages(path, Some(SAMPLE_PAGES))
        .await
        .unwrap_or_default();
    if pages.is_empty() {
        return ParserKind::Llm;
    }

    let chars: usize = pages
        .iter()
        .map(|p| p.chars().filter(|c| !c.is_whitespace()).count())
        .sum();
    let per_page = chars / pages.len();

    if per_page >= threshold {
        ParserKind::Static
    } else {
        ParserKind::Llm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn images_always_route_to_llm() {
        for priority in [
            RouterPriority::Speed,
            RouterPriority::Cost,
            RouterPriority::Accuracy,
        ] {
            let kind = decide(Path::new("scan.png"), SourceKind::Image, priority).await;
            assert_eq!(kind, ParserKind::Llm);
        }
    }

    #[tokio::test]
    async fn text_formats_route_to_static() {
        assert_eq!(
            decide(Path::new("notes.md"), SourceKind::Text, RouterPriority::Cost).await,
            ParserKind::Static
        );
        assert_eq!(
            decide(Path::new("page.html"), SourceKind::Html, RouterPriority::Speed).await,
            ParserKind::Static
        );
    }

    #[tokio::test]
    async fn accuracy_priority_skips_density_sampling() {
        // The path does not exist; Accuracy must decide without touching it.
        let kind = decide(
            &PathBuf::from("/nonexistent/doc.pdf"),
            SourceKind::Pdf,
            RouterPriority::Accuracy,
        )
        .await;
        assert_eq!(kind, ParserKind::Llm);
    }

    #[tokio::test]
    async fn unreadable_pdf_routes_to_llm_not_error() {
        let kind = decide(
            &PathBuf::from("/nonexistent/doc.pdf"),
            SourceKind::Pdf,
            RouterPriority::Cost,
        )
        .await;
        assert_eq!(kind, ParserKind::Llm);
    }
}
