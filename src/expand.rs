//! Recursive link expansion: parse documents linked from parsed content.
//!
//! Discovery is a conservative regex over `http(s)://` and bare `www.`
//! substrings in segment content; markdown-link wrapping is trimmed and
//! scheme-less matches are normalised to `https://`. Each discovered URL is
//! parsed through the top-level entry point with `depth - 1`, producing a
//! breadth-unbounded, depth-bounded tree.
//!
//! Termination is guaranteed only by the depth bound. There is no visited
//! set, so cyclic link structures re-parse the same documents once per
//! level within the bound.

use crate::error::DocPipeError;
use crate::output::ParseResult;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>"']+|www\.[^\s<>"']+(?:\.[^\s<>"']+)*"#).unwrap()
});

/// Parses one linked document. Implemented by the top-level parse entry
/// point in production and by mocks in tests.
#[async_trait::async_trait]
pub trait LinkFetcher: Sync {
    async fn fetch(
        &self,
        url: &str,
        depth: usize,
        parent_title: &str,
    ) -> Result<ParseResult, DocPipeError>;
}

/// Extract URL-like substrings from markdown content, normalised to have a
/// scheme.
pub fn discover_urls(content: &str) -> Vec<String> {
    RE_URL
        .find_iter(content)
        .map(|m| {
            let mut url = m.as_str();
            // Keep only the destination of a markdown link `[text](url`.
            if let Some(pos) = url.rfind("](") {
                url = &url[pos + 2..];
            }
            let url = url.trim_end_matches([')', '.', ',', ';']);
            if url.starts_with("http") {
                url.to_string()
            } else {
                format!("https://{url}")
            }
        })
        .collect()
}

/// Populate `recursive_docs` by parsing every URL found in the result's
/// segments. `depth <= 1` is a no-op; children are fetched with `depth - 1`.
pub async fn expand(
    result: &mut ParseResult,
    depth: usize,
    fetcher: &dyn LinkFetcher,
) -> Result<(), DocPipeError> {
    if depth <= 1 {
        return Ok(());
    }

    let mut recursive_docs = Vec::new();
    for segment in &result.segments {
        for url in discover_urls(&segment.content) {
            debug!("Following link from '{}' (depth {depth}): {url}", result.title);
            let child = fetcher.fetch(&url, depth - 1, &result.title).await?;
            recursive_docs.push(child);
        }
    }
    result.recursive_docs = recursive_docs;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_plain_and_bare_urls() {
        let urls = discover_urls(
            "See https://example.com/a.pdf and also www.example.org/page for details.",
        );
        assert_eq!(
            urls,
            vec![
                "https://example.com/a.pdf".to_string(),
                "https://www.example.org/page".to_string(),
            ]
        );
    }

    #[test]
    fn trims_markdown_link_wrapping() {
        let urls = discover_urls("[the report](https://example.com/report.pdf)");
        assert_eq!(urls, vec!["https://example.com/report.pdf".to_string()]);
    }

    #[test]
    fn trims_trailing_punctuation() {
        let urls = discover_urls("Read https://example.com/doc.");
        assert_eq!(urls, vec!["https://example.com/doc".to_string()]);
    }

    #[test]
    fn no_urls_no_matches() {
        assert!(discover_urls("plain text, no links here").is_empty());
    }
}
