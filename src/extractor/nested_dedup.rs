//! Nested block deduplication — spec.md §4.2 / §8.
//!
//! A tree-sitter query can match more than one node for the same logical
//! definition — most commonly a decorated definition, where both the bare
//! `function_definition`/`class_definition` and the decorator-wrapping node
//! match the same capture name (see `language/python.rs`). This pass
//! collapses those duplicates, keeping the outer (wider) span.

use crate::block::Block;

/// Drop a contained block when the "residual" — lines of the outer block
/// not covered by the inner one — is small enough that they're almost
/// certainly the same logical definition rather than a method nested in a
/// class.
const MAX_RESIDUAL_LINES: u32 = 2;

/// Collapse nested/duplicate blocks extracted from a single file.
///
/// Blocks are sorted by `(start_line asc, end_line desc)` so that an outer
/// span is always visited before the inner spans it contains; each
/// candidate is then dropped if some already-kept block both contains it
/// and satisfies the residual-line rule, or is its decorated counterpart.
pub fn dedup(mut blocks: Vec<Block>) -> Vec<Block> {
    blocks.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then(b.end_line.cmp(&a.end_line))
    });

    let mut kept: Vec<Block> = Vec::with_capacity(blocks.len());
    'outer: for block in blocks {
        for existing in &kept {
            if is_decorated_pair(existing, &block) {
                continue 'outer;
            }
            if existing.contains(&block) && existing.residual_lines(&block) <= MAX_RESIDUAL_LINES {
                continue 'outer;
            }
        }
        kept.push(block);
    }
    kept
}

/// A decorated definition's bare and wrapped matches share a name, kind, and
/// closing line, but the wrapped one starts earlier (at the first
/// decorator). Unlike the generic residual rule this has no line-count cap —
/// a definition can carry an arbitrary number of decorators and still be the
/// same logical block.
fn is_decorated_pair(outer: &Block, inner: &Block) -> bool {
    outer.kind == inner.kind
        && outer.name == inner.name
        && outer.end_line == inner.end_line
        && outer.start_line <= inner.start_line
        && outer.relative_path == inner.relative_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{BlockKind, Language};

    fn block(start: u32, end: u32, name: &str, kind: BlockKind) -> Block {
        Block::new(
            "f.py".into(),
            Language::Code("python"),
            kind,
            name.into(),
            start,
            end,
            "body".into(),
            None,
        )
    }

    #[test]
    fn drops_small_residual_duplicate() {
        let outer = block(1, 10, "C", BlockKind::Class);
        let almost_same = block(2, 10, "C", BlockKind::Class);
        let result = dedup(vec![outer.clone(), almost_same]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].start_line, 1);
    }

    #[test]
    fn keeps_method_nested_in_class() {
        let class = block(1, 50, "Widget", BlockKind::Class);
        let method = block(5, 20, "render", BlockKind::Method);
        let result = dedup(vec![class, method]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn collapses_decorated_definition_regardless_of_decorator_count() {
        let mut decorated = block(1, 10, "handler", BlockKind::Function);
        decorated.start_line = 1; // three decorator lines before `def`
        let bare = block(4, 10, "handler", BlockKind::Function);
        let result = dedup(vec![decorated, bare]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].start_line, 1);
    }

    #[test]
    fn unrelated_blocks_both_survive() {
        let a = block(1, 5, "a", BlockKind::Function);
        let b = block(10, 15, "b", BlockKind::Function);
        let result = dedup(vec![a, b]);
        assert_eq!(result.len(), 2);
    }
}
