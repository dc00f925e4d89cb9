//! The `Block` data model — spec.md §3.
//!
//! A `Block` is the unit of indexing: a contiguous span of a source file with
//! a recognized syntactic role (or a prose chunk). Blocks are produced by the
//! extractor, embedded by the embedder, stored by the vector store, and
//! returned (minus nothing — content travels with them) by the searcher.

use crate::language::{BlockKind, Language};

/// A single indexed unit of source.
#[derive(Debug, Clone)]
pub struct Block {
    /// Stable id derived from `(relative_path, start_line, name)` — see [`Block::make_id`].
    pub id: String,
    /// POSIX-form path relative to the index root.
    pub relative_path: String,
    pub language: Language,
    pub kind: BlockKind,
    /// Declared identifier, or a synthesized name for prose chunks / anonymous nodes.
    pub name: String,
    /// 1-based, inclusive.
    pub start_line: u32,
    /// 1-based, inclusive.
    pub end_line: u32,
    /// Exact source bytes spanning `[start_line, end_line]`.
    pub content: String,
    /// Text fed to the embedder — `content`, augmented with identifier-split
    /// terms for lexical recall (spec.md §3).
    pub embedding_text: String,
    /// For methods: the enclosing type's name (e.g. `"CircuitBreaker"` for
    /// `impl CircuitBreaker { fn poll(&self) }`), used to synthesize names
    /// and to feed boost's name-overlap scoring.
    pub parent_type_name: Option<String>,
}

impl Block {
    /// `{relative_path}:{start_line}:{name}` — stable across re-extractions
    /// as long as name and start line are unchanged (spec.md §3 invariant).
    pub fn make_id(relative_path: &str, start_line: u32, name: &str) -> String {
        format!("{relative_path}:{start_line}:{name}")
    }

    pub fn new(
        relative_path: String,
        language: Language,
        kind: BlockKind,
        name: String,
        start_line: u32,
        end_line: u32,
        content: String,
        parent_type_name: Option<String>,
    ) -> Self {
        let id = Block::make_id(&relative_path, start_line, &name);
        let embedding_text = build_embedding_text(&name, &content);
        Self {
            id,
            relative_path,
            language,
            kind,
            name,
            start_line,
            end_line,
            content,
            embedding_text,
            parent_type_name,
        }
    }

    /// Lines spanned, inclusive (used by nested-dedup residual checks).
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Whether `self`'s line range fully contains `other`'s.
    pub fn contains(&self, other: &Block) -> bool {
        self.start_line <= other.start_line && self.end_line >= other.end_line
    }

    /// The "A fully contains B and (A.end_line − B.end_line) + (B.start_line
    /// − A.start_line) ≤ 2" residual check from spec.md §8.
    pub fn residual_lines(&self, inner: &Block) -> u32 {
        (self.end_line.saturating_sub(inner.end_line)) + (inner.start_line.saturating_sub(self.start_line))
    }
}

/// Augment raw content with identifier-split terms so the lexical index can
/// match on subtokens of the block's name even when they don't literally
/// appear split in the source (spec.md §3: "augmented with identifier-split
/// terms for improved lexical recall").
fn build_embedding_text(name: &str, content: &str) -> String {
    let split = crate::tokenizer::split_identifier(name).join(" ");
    if split.is_empty() || split.eq_ignore_ascii_case(name) {
        content.to_string()
    } else {
        format!("{split}\n{content}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(start: u32, end: u32, name: &str) -> Block {
        Block::new(
            "src/lib.rs".into(),
            Language::Code("rust"),
            BlockKind::Function,
            name.into(),
            start,
            end,
            "fn x() {}".into(),
            None,
        )
    }

    #[test]
    fn id_is_stable_for_same_name_and_line() {
        let a = block(10, 20, "foo");
        let b = block(10, 25, "foo"); // content/end changed, name+start same
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn id_changes_with_start_line() {
        let a = block(10, 20, "foo");
        let b = block(11, 20, "foo");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn contains_and_residual() {
        let outer = block(1, 10, "C");
        let inner = block(3, 9, "m");
        assert!(outer.contains(&inner));
        assert_eq!(outer.residual_lines(&inner), (10 - 9) + (3 - 1));
    }
}
