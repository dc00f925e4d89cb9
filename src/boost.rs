//! Score boosting — spec.md §4.8.
//!
//! A small set of multiplicative rules nudge a block's fused retrieval
//! score toward results a human would call obviously relevant: an exact
//! name match, partial name-term overlap, the query's apparent kind
//! ("class", "function", ...), and path relevance. Rules stack
//! multiplicatively and are capped so no single signal can run away.

use crate::block::Block;
use crate::language::BlockKind;
use crate::tokenizer::split_identifier;

pub const EXACT_NAME_MULTIPLIER: f32 = 2.5;
pub const NAME_TERM_MULTIPLIER: f32 = 1.3;
pub const KIND_AFFINITY_FUNCTION_MULTIPLIER: f32 = 1.3;
pub const KIND_AFFINITY_CLASS_MULTIPLIER: f32 = 1.2;
pub const PATH_RELEVANCE_MULTIPLIER: f32 = 1.15;
pub const BOOST_CAP: f32 = 4.0;

/// Keywords in the query that suggest the searcher is looking for a
/// class/struct/interface rather than a function.
const CLASS_LIKE_HINTS: &[&str] = &["class", "struct", "type", "interface", "trait"];
const FUNCTION_LIKE_HINTS: &[&str] = &["function", "func", "method", "fn"];

/// Minimum subtoken length counted toward name-term overlap (spec.md §4.8:
/// "each overlapping term (after identifier splitting, min length 3)").
const MIN_OVERLAP_TERM_LEN: usize = 3;

/// Compute the multiplier to apply to `block`'s base score for `query`.
/// Callers multiply: `boosted = base_score * compute(query, block)`.
pub fn compute(query: &str, block: &Block) -> f32 {
    let query_terms: Vec<String> = split_identifier(&query.to_lowercase())
        .into_iter()
        .chain(query.split_whitespace().map(|w| w.to_lowercase()))
        .collect();
    let query_lower = query.to_lowercase();

    let mut multiplier = 1.0f32;

    // Exact name match: the whole (lowercased) query equals the block's name.
    if query_lower.trim() == block.name.to_lowercase() {
        multiplier *= EXACT_NAME_MULTIPLIER;
    } else {
        // Name-term overlap: each distinct query term that also appears as
        // a subtoken of the block's name contributes its own multiplier.
        let name_subtokens: Vec<String> = split_identifier(&block.name);
        let mut overlap_terms = query_terms.clone();
        overlap_terms.sort();
        overlap_terms.dedup();
        for term in &overlap_terms {
            if term.len() >= MIN_OVERLAP_TERM_LEN && name_subtokens.iter().any(|t| t == term) {
                multiplier *= NAME_TERM_MULTIPLIER;
            }
        }
    }

    if CLASS_LIKE_HINTS.iter().any(|h| query_lower.contains(h)) && block.kind.is_class_like() {
        multiplier *= KIND_AFFINITY_CLASS_MULTIPLIER;
    }
    if FUNCTION_LIKE_HINTS.iter().any(|h| query_lower.contains(h)) && block.kind.is_function_like() {
        multiplier *= KIND_AFFINITY_FUNCTION_MULTIPLIER;
    }

    // Path relevance: any query term appears as a path component/subtoken.
    let path_terms: Vec<String> = block
        .relative_path
        .split(['/', '.', '_', '-'])
        .flat_map(split_identifier)
        .collect();
    if query_terms.iter().any(|qt| path_terms.iter().any(|pt| pt == qt)) {
        multiplier *= PATH_RELEVANCE_MULTIPLIER;
    }

    multiplier.min(BOOST_CAP)
}

/// Whether a block's kind matches what the query appears to be asking for,
/// used by [`crate::searcher`] to decide result ordering ties beyond score.
pub fn kind_matches_query_hint(query: &str, kind: BlockKind) -> bool {
    let lower = query.to_lowercase();
    (CLASS_LIKE_HINTS.iter().any(|h| lower.contains(h)) && kind.is_class_like())
        || (FUNCTION_LIKE_HINTS.iter().any(|h| lower.contains(h)) && kind.is_function_like())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;

    fn block(name: &str, kind: BlockKind, path: &str) -> Block {
        Block::new(path.into(), Language::Code("python"), kind, name.into(), 1, 5, "body".into(), None)
    }

    #[test]
    fn exact_name_match_gets_top_multiplier() {
        let b = block("authenticate", BlockKind::Function, "auth.py");
        let m = compute("authenticate", &b);
        assert!((m - EXACT_NAME_MULTIPLIER).abs() < 1e-5);
    }

    #[test]
    fn partial_overlap_is_weaker_than_exact() {
        let b = block("authenticate_user", BlockKind::Function, "auth.py");
        let exact = compute("authenticate_user", &b);
        let partial = compute("authenticate", &b);
        assert!(partial < exact);
        assert!(partial > 1.0);
    }

    #[test]
    fn kind_affinity_boosts_matching_class_query() {
        let b = block("Widget", BlockKind::Class, "ui.py");
        let with_hint = compute("Widget class", &b);
        let without_hint = compute("Widget", &b);
        assert!(with_hint > without_hint);
    }

    #[test]
    fn boost_is_capped() {
        let b = block("authenticate", BlockKind::Function, "auth/authenticate.py");
        let m = compute("authenticate function class", &b);
        assert!(m <= BOOST_CAP + 1e-5);
    }

    #[test]
    fn unrelated_query_gets_no_boost() {
        let b = block("render_widget", BlockKind::Function, "ui/widgets.py");
        let m = compute("completely unrelated phrase", &b);
        assert!((m - 1.0).abs() < 1e-5);
    }
}
