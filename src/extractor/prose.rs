//! Prose (Markdown) chunking — spec.md §4.2.
//!
//! No tree-sitter grammar: fenced code blocks are pulled out as their own
//! blocks, then the surrounding prose is chunked along heading boundaries
//! with a soft token budget and overlap, the same two-pass shape as the
//! teacher's markdown parser (`parser/markdown.rs`) but driven by a token
//! estimate rather than a line-count heuristic.

use std::sync::LazyLock;

use regex::Regex;

use crate::block::Block;
use crate::language::{BlockKind, Language};

/// Target chunk size, in estimated tokens (spec.md §4.2: ~400).
const TARGET_TOKENS: usize = 400;
/// Overlap carried from the tail of one chunk into the head of the next
/// (spec.md §4.2: ~50 tokens).
const OVERLAP_TOKENS: usize = 50;
/// Chars-per-token used for the estimate; no tokenizer dependency at this
/// layer since the real token count depends on the embedder's vocabulary.
const CHARS_PER_TOKEN: usize = 4;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)```([\w+-]*)\s*$").expect("valid regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*$").expect("valid regex"));

struct Heading {
    level: u32,
    text: String,
    line: usize, // 0-indexed
}

/// Chunk a plain-text or reStructuredText file (spec.md §4.2: "the remaining
/// text is chunked by headings" — plain text has none, so the whole file is
/// one section windowed the same way Markdown's preamble would be).
pub fn chunk_text(source: &str, relative_path: &str) -> Vec<Block> {
    let lines: Vec<&str> = source.lines().collect();
    windowed_chunks(&lines.join("\n"), 0, "", relative_path)
        .into_iter()
        .map(|mut block| {
            block.language = Language::Prose("text");
            if block.name == "preamble" {
                block.name = relative_path.to_string();
            }
            block
        })
        .collect()
}

/// Chunk a Markdown document into prose sections and fenced code blocks.
pub fn chunk_markdown(source: &str, relative_path: &str) -> Vec<Block> {
    let lines: Vec<&str> = source.lines().collect();
    let (fence_ranges, fence_langs) = find_fences(&lines);

    let mut blocks = Vec::new();
    for (idx, range) in fence_ranges.iter().enumerate() {
        let (start, end) = *range;
        let content = lines[start..=end].join("\n");
        let lang_tag = fence_langs[idx].clone().unwrap_or_else(|| "code".to_string());
        blocks.push(Block::new(
            relative_path.to_string(),
            Language::Prose("markdown"),
            BlockKind::Other,
            format!("fenced:{lang_tag}"),
            start as u32 + 1,
            end as u32 + 1,
            content,
            None,
        ));
    }

    let headings = extract_headings(&lines, &fence_ranges);
    blocks.extend(chunk_prose(&lines, &headings, &fence_ranges, relative_path));
    blocks
}

/// Returns `(line_ranges, fence_languages)` for every fenced block, skipping
/// fences that never close.
fn find_fences(lines: &[&str]) -> (Vec<(usize, usize)>, Vec<Option<String>>) {
    let mut ranges = Vec::new();
    let mut langs = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if let Some(caps) = FENCE_RE.captures(lines[i]) {
            let lang = caps.get(2).map(|m| m.as_str().to_string()).filter(|s| !s.is_empty());
            let open_indent = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let mut j = i + 1;
            let mut closed = None;
            while j < lines.len() {
                if let Some(close_caps) = FENCE_RE.captures(lines[j]) {
                    if close_caps.get(2).map(|m| m.as_str()).unwrap_or("").is_empty()
                        && close_caps.get(1).map(|m| m.as_str()).unwrap_or("") == open_indent
                    {
                        closed = Some(j);
                        break;
                    }
                }
                j += 1;
            }
            if let Some(end) = closed {
                ranges.push((i, end));
                langs.push(lang);
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    (ranges, langs)
}

fn extract_headings(lines: &[&str], fence_ranges: &[(usize, usize)]) -> Vec<Heading> {
    lines
        .iter()
        .enumerate()
        .filter(|(i, _)| !in_any_fence(*i, fence_ranges))
        .filter_map(|(i, line)| {
            HEADING_RE.captures(line).map(|caps| Heading {
                level: caps[1].len() as u32,
                text: caps[2].to_string(),
                line: i,
            })
        })
        .collect()
}

fn in_any_fence(line: usize, fence_ranges: &[(usize, usize)]) -> bool {
    fence_ranges.iter().any(|(s, e)| line >= *s && line <= *e)
}

fn chunk_prose(
    lines: &[&str],
    headings: &[Heading],
    fence_ranges: &[(usize, usize)],
    relative_path: &str,
) -> Vec<Block> {
    if lines.is_empty() {
        return Vec::new();
    }

    // Section boundaries: one per heading, plus a leading section for any
    // preamble before the first heading.
    let mut section_starts: Vec<usize> = Vec::new();
    let mut breadcrumbs: Vec<String> = Vec::new();
    let mut stack: Vec<(u32, String)> = Vec::new();

    if headings.first().map(|h| h.line).unwrap_or(0) > 0 {
        section_starts.push(0);
        breadcrumbs.push(String::new());
    }
    for h in headings {
        while stack.last().is_some_and(|(lvl, _)| *lvl >= h.level) {
            stack.pop();
        }
        stack.push((h.level, h.text.clone()));
        section_starts.push(h.line);
        breadcrumbs.push(
            stack
                .iter()
                .map(|(_, t)| t.as_str())
                .collect::<Vec<_>>()
                .join(" > "),
        );
    }

    let mut blocks = Vec::new();
    for (idx, &start) in section_starts.iter().enumerate() {
        let end = section_starts.get(idx + 1).copied().unwrap_or(lines.len());
        if start >= end {
            continue;
        }
        let section_lines: Vec<&str> = (start..end)
            .filter(|l| !in_any_fence(*l, fence_ranges))
            .map(|l| lines[l])
            .collect();
        let section_text = section_lines.join("\n");
        if section_text.trim().is_empty() {
            continue;
        }
        let breadcrumb = breadcrumbs[idx].clone();
        blocks.extend(windowed_chunks(
            &section_text,
            start,
            &breadcrumb,
            relative_path,
        ));
    }
    blocks
}

/// Splits one section's text into token-budgeted, overlapping windows.
///
/// `section_start_line` is the 0-indexed line the section begins at, used to
/// translate character offsets back into file line numbers.
fn windowed_chunks(text: &str, section_start_line: usize, breadcrumb: &str, relative_path: &str) -> Vec<Block> {
    let target_chars = TARGET_TOKENS * CHARS_PER_TOKEN;
    let overlap_chars = OVERLAP_TOKENS * CHARS_PER_TOKEN;
    let lines: Vec<&str> = text.lines().collect();

    if lines.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start_idx = 0usize;
    let mut window_idx = 0usize;

    while start_idx < lines.len() {
        let mut end_idx = start_idx;
        let mut char_count = 0usize;
        while end_idx < lines.len() && (char_count < target_chars || end_idx == start_idx) {
            char_count += lines[end_idx].len() + 1;
            end_idx += 1;
        }

        let chunk_lines = &lines[start_idx..end_idx];
        let content = chunk_lines.join("\n");
        let name = if window_idx == 0 {
            if breadcrumb.is_empty() {
                "preamble".to_string()
            } else {
                breadcrumb.to_string()
            }
        } else {
            format!("{breadcrumb} (part {})", window_idx + 1)
        };

        chunks.push(Block::new(
            relative_path.to_string(),
            Language::Prose("markdown"),
            BlockKind::TextChunk,
            name,
            (section_start_line + start_idx) as u32 + 1,
            (section_start_line + end_idx.saturating_sub(1)) as u32 + 1,
            content,
            None,
        ));

        if end_idx >= lines.len() {
            break;
        }

        // Step back by roughly `overlap_chars` worth of lines for the next window.
        let mut back_chars = 0usize;
        let mut next_start = end_idx;
        while next_start > start_idx + 1 && back_chars < overlap_chars {
            next_start -= 1;
            back_chars += lines[next_start].len() + 1;
        }
        start_idx = next_start.max(start_idx + 1);
        window_idx += 1;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_code_block_separately() {
        let src = "# Title\n\nSome prose.\n\n```rust\nfn x() {}\n```\n\nMore prose.\n";
        let blocks = chunk_markdown(src, "readme.md");
        assert!(blocks.iter().any(|b| b.name == "fenced:rust" && b.content.contains("fn x()")));
    }

    #[test]
    fn fence_lines_excluded_from_prose_chunks() {
        let src = "# Title\n\n```python\nsecret_marker_xyz\n```\n";
        let blocks = chunk_markdown(src, "readme.md");
        let prose: Vec<_> = blocks.iter().filter(|b| b.kind == BlockKind::TextChunk).collect();
        assert!(!prose.iter().any(|b| b.content.contains("secret_marker_xyz")));
    }

    #[test]
    fn single_heading_file_produces_one_section() {
        let src = "# Only Heading\n\nShort body text.\n";
        let blocks = chunk_markdown(src, "doc.md");
        let prose: Vec<_> = blocks.iter().filter(|b| b.kind == BlockKind::TextChunk).collect();
        assert_eq!(prose.len(), 1);
        assert!(prose[0].name.contains("Only Heading"));
    }

    #[test]
    fn long_section_is_split_into_overlapping_windows() {
        let mut body = String::from("# Big Section\n\n");
        for i in 0..400 {
            body.push_str(&format!("This is sentence number {i} in a very long document.\n"));
        }
        let blocks = chunk_markdown(&body, "big.md");
        let prose: Vec<_> = blocks.iter().filter(|b| b.kind == BlockKind::TextChunk).collect();
        assert!(prose.len() > 1);
        // Consecutive windows overlap: the second window's start line is
        // strictly before the first window's end line.
        assert!(prose[1].start_line < prose[0].end_line);
    }

    #[test]
    fn no_headings_produces_single_preamble_section() {
        let src = "Just some plain text.\nNo headings here.\n";
        let blocks = chunk_markdown(src, "plain.md");
        let prose: Vec<_> = blocks.iter().filter(|b| b.kind == BlockKind::TextChunk).collect();
        assert_eq!(prose.len(), 1);
        assert_eq!(prose[0].name, "preamble");
    }

    #[test]
    fn chunk_text_tags_prose_text_not_markdown() {
        let src = "Release notes.\n\nEverything works now.\n";
        let blocks = chunk_text(src, "NOTES.txt");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, Language::Prose("text"));
        assert_eq!(blocks[0].name, "NOTES.txt");
    }

    #[test]
    fn chunk_text_splits_long_files_into_windows() {
        let mut body = String::new();
        for i in 0..400 {
            body.push_str(&format!("Line number {i} of a long plain-text file.\n"));
        }
        let blocks = chunk_text(&body, "big.txt");
        assert!(blocks.len() > 1);
    }
}
