//! The splitter: partition a paginated source into page-range chunks.
//!
//! Chunks are materialised as sub-PDFs in the per-call scratch directory so
//! each worker can open its chunk independently, without coordinating access
//! to the original document. The 1-based `start_page` is carried on the
//! [`Chunk`] itself (and encoded in the scratch file name), so global page
//! numbers can be recovered downstream without re-reading the source.
//!
//! All pdfium work runs inside `spawn_blocking`: pdfium is a C++ library
//! with thread-local state that must not run on Tokio worker threads.

use crate::config::PageSelection;
use crate::error::DocPipeError;
use crate::pipeline::input::{self, SourceKind};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A contiguous page range of a source, materialised as an independently
/// parseable unit. Lives in scratch storage owned by the top-level call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the global chunk order; the dispatcher merges by this.
    pub index: usize,
    /// Path of the chunk file (a sub-PDF, or the whole source for
    /// non-paginated inputs).
    pub path: PathBuf,
    /// 1-based global number of the chunk's first page.
    pub start_page: usize,
    /// 1-based global number of the chunk's last page (inclusive).
    pub end_page: usize,
}

impl Chunk {
    /// Number of pages in this chunk.
    pub fn page_len(&self) -> usize {
        self.end_page - self.start_page + 1
    }

    /// Wrap a non-paginated source (image, text, single HTML page) as the
    /// one chunk of its document.
    pub fn whole(path: PathBuf) -> Chunk {
        Chunk {
            index: 0,
            path,
            start_page: 1,
            end_page: 1,
        }
    }
}

/// Compute the 1-based inclusive page ranges for a document of
/// `total_pages` split into chunks of at most `pages_per_split` pages.
///
/// Produces `ceil(N/P)` ranges covering `[1, N]` exactly once, in order,
/// with no gaps or overlaps; only the last range may be short.
pub fn chunk_ranges(total_pages: usize, pages_per_split: usize) -> Vec<(usize, usize)> {
    debug_assert!(pages_per_split >= 1);
    let mut ranges = Vec::with_capacity(total_pages.div_ceil(pages_per_split));
    let mut start = 1;
    while start <= total_pages {
        let end = (start + pages_per_split - 1).min(total_pages);
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

/// Split a PDF into `ceil(N/P)` sub-PDF chunks under `scratch_dir`.
///
/// Fails with [`DocPipeError::UnsupportedFormat`] when asked to page-split
/// a format without page semantics.
pub async fn split_pdf(
    pdf_path: &Path,
    scratch_dir: &Path,
    pages_per_split: usize,
) -> Result<Vec<Chunk>, DocPipeError> {
    if input::classify(pdf_path) != Some(SourceKind::Pdf) {
        return Err(DocPipeError::UnsupportedFormat {
            path: pdf_path.to_path_buf(),
            extension: pdf_path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_else(|| "<none>".to_string()),
        });
    }

    let path = pdf_path.to_path_buf();
    let out_dir = scratch_dir.to_path_buf();
    tokio::task::spawn_blocking(move || split_pdf_blocking(&path, &out_dir, pages_per_split))
        .await
        .map_err(|e| DocPipeError::Internal(format!("split task panicked: {e}")))?
}

fn split_pdf_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    pages_per_split: usize,
) -> Result<Vec<Chunk>, DocPipeError> {
    let pdfium = Pdfium::default();
    let source = open_pdf(&pdfium, pdf_path)?;
    let total_pages = source.pages().len() as usize;

    let mut chunks = Vec::new();
    for (index, (start, end)) in chunk_ranges(total_pages, pages_per_split)
        .into_iter()
        .enumerate()
    {
        let chunk_path = out_dir.join(format!("split_{start:04}_{end:04}.pdf"));

        let mut sub = pdfium
            .create_new_pdf()
            .map_err(|e| split_err(pdf_path, &e))?;
        sub.pages_mut()
            .copy_page_range_from_document(
                &source,
                (start - 1) as PdfPageIndex..=(end - 1) as PdfPageIndex,
                0,
            )
            .map_err(|e| split_err(pdf_path, &e))?;
        sub.save_to_file(&chunk_path)
            .map_err(|e| split_err(pdf_path, &e))?;

        debug!("Wrote chunk {} pages {start}-{end}", chunk_path.display());
        chunks.push(Chunk {
            index,
            path: chunk_path,
            start_page: start,
            end_page: end,
        });
    }

    Ok(chunks)
}

/// Materialise a sub-PDF containing only the selected pages, preserving
/// their order. Used to honour `page_nums` before splitting.
pub async fn extract_page_selection(
    pdf_path: &Path,
    out_path: &Path,
    selection: &PageSelection,
) -> Result<PathBuf, DocPipeError> {
    let path = pdf_path.to_path_buf();
    let out = out_path.to_path_buf();
    let selection = selection.clone();
    tokio::task::spawn_blocking(move || extract_selection_blocking(&path, &out, &selection))
        .await
        .map_err(|e| DocPipeError::Internal(format!("sub-pdf task panicked: {e}")))?
}

fn extract_selection_blocking(
    pdf_path: &Path,
    out_path: &Path,
    selection: &PageSelection,
) -> Result<PathBuf, DocPipeError> {
    let pdfium = Pdfium::default();
    let source = open_pdf(&pdfium, pdf_path)?;
    let total_pages = source.pages().len() as usize;

    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        return Err(DocPipeError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    let mut sub = pdfium
        .create_new_pdf()
        .map_err(|e| split_err(pdf_path, &e))?;
    let mut inserted: PdfPageIndex = 0;
    for run in contiguous_runs(&indices) {
        sub.pages_mut()
            .copy_page_range_from_document(
                &source,
                run.0 as PdfPageIndex..=run.1 as PdfPageIndex,
                inserted,
            )
            .map_err(|e| split_err(pdf_path, &e))?;
        inserted += (run.1 - run.0 + 1) as PdfPageIndex;
    }
    sub.save_to_file(out_path)
        .map_err(|e| split_err(pdf_path, &e))?;

    Ok(out_path.to_path_buf())
}

/// Convert a raster image into a single-page PDF whose page matches the
/// image dimensions (1 px = 1 pt). Used when `as_pdf` is set.
pub async fn image_to_pdf(image_path: &Path, out_path: &Path) -> Result<PathBuf, DocPipeError> {
    let src = image_path.to_path_buf();
    let out = out_path.to_path_buf();
    tokio::task::spawn_blocking(move || image_to_pdf_blocking(&src, &out))
        .await
        .map_err(|e| DocPipeError::Internal(format!("image conversion task panicked: {e}")))?
}

fn image_to_pdf_blocking(image_path: &Path, out_path: &Path) -> Result<PathBuf, DocPipeError> {
    let img = image::open(image_path).map_err(|e| DocPipeError::SplitFailed {
        path: image_path.to_path_buf(),
        detail: format!("failed to open image: {e}"),
    })?;
    let (width, height) = (img.width() as f32, img.height() as f32);

    let pdfium = Pdfium::default();
    let mut doc = pdfium
        .create_new_pdf()
        .map_err(|e| split_err(image_path, &e))?;
    let mut page = doc
        .pages_mut()
        .create_page_at_end(PdfPagePaperSize::Custom(
            PdfPoints::new(width),
            PdfPoints::new(height),
        ))
        .map_err(|e| split_err(image_path, &e))?;
    page.objects_mut()
        .create_image_object(
            PdfPoints::new(0.0),
            PdfPoints::new(0.0),
            &img,
            Some(PdfPoints::new(width)),
            Some(PdfPoints::new(height)),
        )
        .map_err(|e| split_err(image_path, &e))?;
    doc.save_to_file(out_path)
        .map_err(|e| split_err(image_path, &e))?;

    Ok(out_path.to_path_buf())
}

/// Open a PDF, mapping pdfium errors onto the split taxonomy.
fn open_pdf<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, DocPipeError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| DocPipeError::SplitFailed {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })
}

fn split_err(path: &Path, e: &PdfiumError) -> DocPipeError {
    DocPipeError::SplitFailed {
        path: path.to_path_buf(),
        detail: format!("{e:?}"),
    }
}

/// Group sorted 0-based indices into inclusive contiguous runs.
fn contiguous_runs(indices: &[usize]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut iter = indices.iter().copied();
    let Some(first) = iter.next() else {
        return runs;
    };
    let (mut start, mut prev) = (first, first);
    for idx in iter {
        if idx == prev + 1 {
            prev = idx;
        } else {
            runs.push((start, prev));
            start = idx;
            prev = idx;
        }
    }
    runs.push((start, prev));
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_cover_exactly_once() {
        for total in 1..=37 {
            for per_split in 1..=9 {
                let ranges = chunk_ranges(total, per_split);
                assert_eq!(ranges.len(), total.div_ceil(per_split));
                // Exact coverage of [1, total], in order, no gaps/overlaps.
                let mut expected_start = 1;
                for &(start, end) in &ranges {
                    assert_eq!(start, expected_start);
                    assert!(end >= start);
                    assert!(end - start + 1 <= per_split);
                    expected_start = end + 1;
                }
                assert_eq!(expected_start, total + 1);
            }
        }
    }

    #[test]
    fn ten_pages_in_fours() {
        assert_eq!(chunk_ranges(10, 4), vec![(1, 4), (5, 8), (9, 10)]);
    }

    #[test]
    fn single_short_document() {
        assert_eq!(chunk_ranges(3, 4), vec![(1, 3)]);
    }

    #[tokio::test]
    async fn split_rejects_non_paginated_format() {
        let err = split_pdf(Path::new("photo.png"), Path::new("/tmp"), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, DocPipeError::UnsupportedFormat { .. }));
    }

    #[test]
    fn whole_chunk_starts_at_page_one() {
        let c = Chunk::whole(PathBuf::from("a.png"));
        assert_eq!(c.start_page, 1);
        assert_eq!(c.index, 0);
        assert_eq!(c.page_len(), 1);
    }

    #[test]
    fn runs_split_on_gaps() {
        assert_eq!(
            contiguous_runs(&[0, 1, 2, 4, 6, 7]),
            vec![(0, 2), (4, 4), (6, 7)]
        );
        assert_eq!(contiguous_runs(&[]), vec![]);
    }
}
