//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! Format validation happens here, before the router or splitter ever see
//! the source: an unsupported extension fails the top-level call immediately
//! and is never retried. Downloads land in a `TempDir` that stays alive for
//! as long as the `ResolvedInput`, so cleanup is automatic on every exit
//! path including panics.

use crate::error::DocPipeError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Broad family of a source document, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Paginated PDF; the only kind the splitter will page-split.
    Pdf,
    /// Raster image (png, jpg, tiff, bmp, gif, webp).
    Image,
    /// Plain text or Markdown.
    Text,
    /// Local HTML file.
    Html,
}

impl SourceKind {
    /// Whether this source has page semantics the splitter can use.
    pub fn is_paginated(self) -> bool {
        matches!(self, SourceKind::Pdf)
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "bmp", "gif", "webp"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];
const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

/// The resolved input: a local file (possibly downloaded) or a remote HTML
/// page that has no file representation.
pub enum ResolvedInput {
    /// A local file, classified by extension.
    Local { path: PathBuf, kind: SourceKind },
    /// A URL pointing at a supported file, downloaded to scratch storage.
    /// The `TempDir` is kept alive to prevent cleanup until parsing is done.
    Downloaded {
        path: PathBuf,
        kind: SourceKind,
        url: String,
        _temp_dir: TempDir,
    },
    /// A URL that is not a supported file download; treated as a web page
    /// and fetched as HTML by the caller.
    RemoteHtml { url: String },
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Classify a path by extension. `None` means unsupported.
pub fn classify(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if ext == "pdf" {
        Some(SourceKind::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Image)
    } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Text)
    } else if HTML_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::Html)
    } else {
        None
    }
}

/// Classify a path, turning an unsupported extension into a typed error.
pub fn classify_or_reject(path: &Path) -> Result<SourceKind, DocPipeError> {
    classify(path).ok_or_else(|| DocPipeError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| "<none>".to_string()),
    })
}

/// Resolve the input string to a local file or a remote HTML page.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocPipeError> {
    if is_url(input) {
        resolve_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence, readability, extension,
/// and (for PDFs) the `%PDF` magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, DocPipeError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(DocPipeError::FileNotFound { path });
    }

    let kind = classify_or_reject(&path)?;

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if kind == SourceKind::Pdf {
                use std::io::Read;
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                    return Err(DocPipeError::SplitFailed {
                        path,
                        detail: format!("not a PDF (first bytes: {magic:?})"),
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocPipeError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(DocPipeError::FileNotFound { path });
        }
    }

    debug!("Resolved local source: {} ({kind:?})", path.display());
    Ok(ResolvedInput::Local { path, kind })
}

/// Resolve a URL: download when it names a supported file type, otherwise
/// hand it back as a remote HTML page.
///
/// URLs without a tell-tale extension get one HEAD request: servers often
/// hand out PDFs and images from extensionless paths, and the Content-Type
/// header is the only signal left.
async fn resolve_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocPipeError> {
    let mut filename = url_filename(url);
    let mut kind = filename.as_deref().and_then(|f| classify(Path::new(f)));

    if kind.is_none() {
        if let Some(ct) = head_content_type(url, timeout_secs).await {
            if let Some((k, ext)) = kind_for_content_type(&ct) {
                debug!("Classified {url} as {k:?} from Content-Type '{ct}'");
                kind = Some(k);
                filename = Some(format!("downloaded.{ext}"));
            }
        }
    }

    let Some(kind) = kind else {
        debug!("URL has no supported file extension or content type, treating as web page: {url}");
        return Ok(ResolvedInput::RemoteHtml {
            url: url.to_string(),
        });
    };

    info!("Downloading source from: {url}");
    let bytes = fetch_bytes(url, timeout_secs).await?;

    let temp_dir = TempDir::new().map_err(|e| DocPipeError::Internal(e.to_string()))?;
    let file_path = temp_dir
        .path()
        .join(filename.unwrap_or_else(|| "downloaded".to_string()));

    if kind == SourceKind::Pdf && bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        return Err(DocPipeError::DownloadFailed {
            url: url.to_string(),
            reason: format!("response is not a PDF (first bytes: {:?})", &bytes[..4]),
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DocPipeError::Internal(format!("failed to write temp file: {e}")))?;

    info!("Downloaded to: {}", file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        url: url.to_string(),
        _temp_dir: temp_dir,
    })
}

/// Fetch a URL body as bytes with a timeout.
pub async fn fetch_bytes(url: &str, timeout_secs: u64) -> Result<Vec<u8>, DocPipeError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocPipeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocPipeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocPipeError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocPipeError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| DocPipeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// Fetch a URL body as a UTF-8 string (lossy) for HTML parsing.
pub async fn fetch_html(url: &str, timeout_secs: u64) -> Result<String, DocPipeError> {
    let bytes = fetch_bytes(url, timeout_secs).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// The Content-Type of a URL, from a HEAD request. Any failure is a `None`:
/// the caller falls back to treating the URL as a web page.
async fn head_content_type(url: &str, timeout_secs: u64) -> Option<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .ok()?;
    let response = client.head(url).send().await.ok()?;
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)?
        .to_str()
        .ok()
        .map(str::to_string)
}

/// Map a Content-Type header to a source kind and a file extension for the
/// downloaded copy (backends classify chunks by extension).
fn kind_for_content_type(content_type: &str) -> Option<(SourceKind, &'static str)> {
    let ct = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match ct.as_str() {
        "application/pdf" => Some((SourceKind::Pdf, "pdf")),
        "text/plain" => Some((SourceKind::Text, "txt")),
        "text/markdown" => Some((SourceKind::Text, "md")),
        "image/png" => Some((SourceKind::Image, "png")),
        "image/jpeg" => Some((SourceKind::Image, "jpg")),
        "image/gif" => Some((SourceKind::Image, "gif")),
        "image/bmp" => Some((SourceKind::Image, "bmp")),
        "image/tiff" => Some((SourceKind::Image, "tiff")),
        "image/webp" => Some((SourceKind::Image, "webp")),
        _ => None,
    }
}

/// Last path segment of a URL, when it names a file.
fn url_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        None
    } else {
        Some(last.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
    }

    #[test]
    fn classify_known_extensions() {
        assert_eq!(classify(Path::new("a.pdf")), Some(SourceKind::Pdf));
        assert_eq!(classify(Path::new("a.PDF")), Some(SourceKind::Pdf));
        assert_eq!(classify(Path::new("a.jpeg")), Some(SourceKind::Image));
        assert_eq!(classify(Path::new("a.md")), Some(SourceKind::Text));
        assert_eq!(classify(Path::new("a.htm")), Some(SourceKind::Html));
        assert_eq!(classify(Path::new("a.xlsx")), None);
        assert_eq!(classify(Path::new("noext")), None);
    }

    #[test]
    fn classify_or_reject_reports_extension() {
        let err = classify_or_reject(Path::new("slides.pptx")).unwrap_err();
        assert!(err.to_string().contains(".pptx"));
    }

    #[test]
    fn only_pdf_is_paginated() {
        assert!(SourceKind::Pdf.is_paginated());
        assert!(!SourceKind::Image.is_paginated());
        assert!(!SourceKind::Text.is_paginated());
        assert!(!SourceKind::Html.is_paginated());
    }

    #[test]
    fn content_type_classification() {
        assert_eq!(
            kind_for_content_type("application/pdf"),
            Some((SourceKind::Pdf, "pdf"))
        );
        assert_eq!(
            kind_for_content_type("application/pdf; charset=binary"),
            Some((SourceKind::Pdf, "pdf"))
        );
        assert_eq!(
            kind_for_content_type("Image/PNG"),
            Some((SourceKind::Image, "png"))
        );
        assert_eq!(
            kind_for_content_type("text/plain; charset=utf-8"),
            Some((SourceKind::Text, "txt"))
        );
        assert_eq!(kind_for_content_type("text/html; charset=utf-8"), None);
        assert_eq!(kind_for_content_type(""), None);
    }

    #[test]
    fn url_filename_extraction() {
        assert_eq!(
            url_filename("https://example.com/papers/doc.pdf"),
            Some("doc.pdf".to_string())
        );
        assert_eq!(url_filename("https://example.com/"), None);
    }
}
