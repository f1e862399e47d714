//! The dispatcher: fan chunk parses across workers, merge in chunk order.
//!
//! Chunks are divided into at most `max_workers` contiguous groups of
//! near-equal size (the remainder goes to the earlier groups), one Tokio
//! task per group, chunks sequential within a group. Concurrency is
//! coarse-grained on purpose: workers share nothing and exchange data only
//! through their return values, so usage aggregation is a plain fold with
//! no cross-task state.
//!
//! The ordering guarantee lives in how results are collected: join handles
//! are awaited in group order, never completion order, so the merged
//! document always reflects the original chunk order no matter which worker
//! finishes first.

use crate::error::DocPipeError;
use crate::output::TokenUsage;
use crate::pipeline::backend::{ChunkOutput, ChunkParser};
use crate::pipeline::split::Chunk;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Divide `n_chunks` into at most `max_workers` contiguous index ranges of
/// near-equal size. Earlier ranges absorb the remainder, so sizes differ by
/// at most one and every chunk index appears in exactly one range.
pub fn partition(n_chunks: usize, max_workers: usize) -> Vec<Range<usize>> {
    debug_assert!(max_workers >= 1);
    if n_chunks == 0 {
        return Vec::new();
    }
    let n_groups = max_workers.min(n_chunks);
    let base = n_chunks / n_groups;
    let remainder = n_chunks % n_groups;

    let mut ranges = Vec::with_capacity(n_groups);
    let mut start = 0;
    for group in 0..n_groups {
        let len = base + usize::from(group < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Parse all chunks with `parser` across at most `max_workers` workers and
/// merge the outputs in chunk order.
///
/// A single group (or `max_workers == 1`) runs inline in the calling task:
/// no pool, simpler error stacks for small documents. Any chunk failure
/// fails the whole dispatch; there is no partial merge.
pub async fn dispatch(
    chunks: Vec<Chunk>,
    parser: Arc<dyn ChunkParser>,
    max_workers: usize,
) -> Result<ChunkOutput, DocPipeError> {
    if chunks.is_empty() {
        return Ok(ChunkOutput::default());
    }

    let groups = partition(chunks.len(), max_workers);
    debug!(
        "Dispatching {} chunks across {} worker group(s)",
        chunks.len(),
        groups.len()
    );

    if max_workers == 1 || groups.len() == 1 {
        let mut outputs = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            outputs.push(parser.parse_chunk(chunk).await?);
        }
        return Ok(merge(outputs));
    }

    let chunks = Arc::new(chunks);
    let mut handles = Vec::with_capacity(groups.len());
    for group in groups {
        let parser = Arc::clone(&parser);
        let chunks = Arc::clone(&chunks);
        handles.push(tokio::spawn(async move {
            let mut outputs = Vec::with_capacity(group.len());
            for chunk in &chunks[group] {
                outputs.push(parser.parse_chunk(chunk).await?);
            }
            Ok::<_, DocPipeError>(outputs)
        }));
    }

    // Await in group order so the merge below is already globally ordered.
    let mut outputs = Vec::with_capacity(chunks.len());
    let mut first_error: Option<DocPipeError> = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(group_outputs)) => outputs.extend(group_outputs),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(join_err) => {
                first_error
                    .get_or_insert(DocPipeError::Internal(format!("worker panicked: {join_err}")));
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    Ok(merge(outputs))
}

/// Merge per-chunk outputs, already in chunk order, into one output.
fn merge(outputs: Vec<ChunkOutput>) -> ChunkOutput {
    let mut raw_parts = Vec::with_capacity(outputs.len());
    let mut segments = Vec::new();
    let mut usage = TokenUsage::default();

    for output in outputs {
        if !output.raw.is_empty() {
            raw_parts.push(output.raw);
        }
        segments.extend(output.segments);
        usage.add(&output.usage);
    }

    ChunkOutput {
        raw: raw_parts.join("\n\n"),
        segments,
        usage,
    }
}
