//! System prompt for vision-LLM document parsing.
//!
//! Centralised so the page-break contract lives in exactly one place: the
//! prompt requires the model to emit [`PAGE_BREAK_MARKER`] between pages, and
//! [`crate::pipeline::backend::segment_marked_text`] splits on the same
//! constant. Changing one without the other silently collapses a chunk into
//! a single segment, so keep them together.

/// Literal sentinel the LLM must insert between the content of consecutive
/// pages. Its absence in a response means the whole chunk is treated as a
/// single segment.
pub const PAGE_BREAK_MARKER: &str = "<page-break>";

/// Default system prompt for converting chunk page images to Markdown.
pub const PARSER_PROMPT: &str = r#"You are an expert document converter. You are given the pages of a document, in order, as images. Convert them to clean, well-structured Markdown.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL text content completely and accurately
   - Maintain the reading order as a human would read each page

2. STRUCTURE
   - Use # for the main title, ## for sections, ### for subsections
   - Use - for unordered lists and 1. 2. 3. for ordered lists
   - Use **bold** and *italic* to match the visual emphasis
   - Convert tables to GFM pipe format; fall back to HTML tables when a
     table is too complex for pipes
   - Render mathematical expressions using LaTeX: $inline$ and $$display$$

3. PAGE STRUCTURE
   - Insert a literal `<page-break>` tag between the content of each page,
     so the original page boundaries can be recovered
   - Do not insert `<page-break>` before the first page or after the last

4. WHAT TO IGNORE
   - Page numbers and repeated headers/footers
   - Decorative borders and lines that carry no content meaning

5. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap the output in ```markdown fences
   - Do NOT add commentary or explanations"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_the_marker_it_contracts() {
        // The prompt and the splitter must agree on the sentinel.
        assert!(PARSER_PROMPT.contains(PAGE_BREAK_MARKER));
    }
}
