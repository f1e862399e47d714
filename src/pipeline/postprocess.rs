//! Deterministic cleanup of LLM-produced Markdown.
//!
//! Vision models occasionally disobey formatting instructions in ways that
//! are semantically harmless but structurally annoying: wrapping the whole
//! answer in ` ```markdown ` fences, emitting CRLF line endings, or leaking
//! zero-width Unicode. These passes are cheap, pure string rules applied to
//! each segment after page-break splitting; static extraction output only
//! goes through whitespace normalisation.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean one segment of LLM output.
pub fn clean_markdown(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

/// Whitespace-only normalisation for deterministic extraction output.
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

const INVISIBLE_CHARS: &[char] = &[
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM
    '\u{00AD}', // soft hyphen
];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence_wrapper() {
        let wrapped = "```markdown\n# Title\n\nBody text.\n```";
        assert_eq!(clean_markdown(wrapped), "# Title\n\nBody text.");
    }

    #[test]
    fn keeps_inner_code_fences() {
        let md = "# Title\n\n```rust\nfn main() {}\n```\n\nAfter.";
        assert_eq!(clean_markdown(md), md);
    }

    #[test]
    fn normalises_crlf_and_blank_runs() {
        let md = "a\r\n\r\n\r\n\r\nb";
        assert_eq!(clean_markdown(md), "a\n\nb");
    }

    #[test]
    fn removes_zero_width_junk() {
        let md = "he\u{200B}llo\u{FEFF}";
        assert_eq!(clean_markdown(md), "hello");
    }

    #[test]
    fn clean_text_trims_trailing_spaces() {
        assert_eq!(clean_text("line one   \nline two\t\n"), "line one\nline two");
    }
}
