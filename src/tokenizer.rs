//! Identifier-aware lexical tokenizer — spec.md §4.3.
//!
//! Used to build a block's `embedding_text` augmentation, to rejoin a
//! query into `query_text_split` before lexical candidate retrieval, and to
//! compute name-term overlap for boost scoring. The same function must be
//! applied consistently on the document and query sides (spec.md §4.3, last
//! paragraph) — every caller in this crate routes through [`split_identifier`]
//! and [`tokenize`].

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Case-insensitive stop-list of language keywords, pruned from subtoken
/// output so common reserved words don't dominate BM25 term frequency.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "fn", "let", "mut", "pub", "use", "impl", "mod", "struct", "enum", "trait", "type",
        "const", "static", "def", "class", "return", "import", "from", "if", "else", "elif",
        "for", "while", "loop", "match", "break", "continue", "as", "in", "is", "not", "and",
        "or", "none", "true", "false", "self", "this", "var", "function", "interface", "void",
        "null", "new", "delete", "public", "private", "protected", "package", "extends",
        "implements", "async", "await", "yield",
    ]
    .into_iter()
    .collect()
});

/// Split arbitrary text into tokens on whitespace, punctuation, and path
/// separators, retaining the original (unsplit) token alongside any
/// camelCase/snake_case subtokens.
///
/// Duplicates are retained (spec.md §4.3 step 4: "BM25 term-frequency
/// remains meaningful").
pub fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for raw in split_on_separators(text) {
        if raw.is_empty() {
            continue;
        }
        let subtokens = split_identifier(&raw);
        if subtokens.len() > 1 {
            out.extend(subtokens);
        }
        let lower = raw.to_lowercase();
        if !STOPWORDS.contains(lower.as_str()) {
            out.push(raw);
        }
    }
    out
}

/// Split on whitespace, ASCII punctuation (excluding `_`), and path
/// separators (`/`, `.`, `\`), keeping each run of identifier characters
/// as one token.
fn split_on_separators(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Split one identifier-like token into lowercase camelCase/snake_case parts.
///
/// `getUserName` → `["get", "user", "name"]`; `HTTPSConnection` → `["https",
/// "connection"]`; a plain lowercase word with no internal structure returns
/// a single-element vec of itself.
pub fn split_identifier(token: &str) -> Vec<String> {
    if token.is_empty() {
        return Vec::new();
    }

    // snake_case: split on underscore first, then recurse on each piece for
    // embedded camelCase (e.g. `get_HTTPResponse`).
    if token.contains('_') {
        return token
            .split('_')
            .filter(|p| !p.is_empty())
            .flat_map(split_camel_case)
            .collect();
    }

    split_camel_case(token)
}

/// camelCase / PascalCase / SCREAMING_ACRONYM-aware split.
///
/// Treats a run of uppercase letters followed by a lowercase letter as the
/// boundary for an acronym (`HTTPSConnection` → `HTTPS`, `Connection`), and
/// every lowercase→uppercase transition as a boundary otherwise.
fn split_camel_case(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let cur = chars[i];
        let boundary = (prev.is_lowercase() && cur.is_uppercase())
            || (prev.is_alphabetic()
                && cur.is_uppercase()
                && i + 1 < chars.len()
                && chars[i + 1].is_lowercase())
            || (prev.is_alphabetic() && cur.is_numeric())
            || (prev.is_numeric() && cur.is_alphabetic());
        if boundary {
            parts.push(chars[start..i].iter().collect::<String>());
            start = i;
        }
    }
    parts.push(chars[start..].iter().collect::<String>());
    parts
        .into_iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Apply [`tokenize`] and rejoin into a single space-separated string —
/// spec.md §4.7 step 5's `query_text_split`.
pub fn rejoin_split(text: &str) -> String {
    tokenize(text).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_camel_case() {
        assert_eq!(split_identifier("getUserName"), vec!["get", "user", "name"]);
    }

    #[test]
    fn splits_acronym_prefix() {
        assert_eq!(
            split_identifier("HTTPSConnection"),
            vec!["https", "connection"]
        );
    }

    #[test]
    fn splits_snake_case() {
        assert_eq!(split_identifier("get_user_name"), vec!["get", "user", "name"]);
    }

    #[test]
    fn tokenize_retains_duplicates() {
        let toks = tokenize("foo foo bar");
        assert_eq!(toks.iter().filter(|t| *t == "foo").count(), 2);
    }

    #[test]
    fn tokenize_strips_stopwords_case_insensitively() {
        let toks = tokenize("fn FN Fn authenticate");
        assert!(!toks.iter().any(|t| t.eq_ignore_ascii_case("fn")));
        assert!(toks.iter().any(|t| t == "authenticate"));
    }

    #[test]
    fn tokenize_splits_path_like_text() {
        let toks = tokenize("src/auth.py");
        assert!(toks.contains(&"src".to_string()));
        assert!(toks.contains(&"auth".to_string()));
        assert!(toks.contains(&"py".to_string()));
    }

    #[test]
    fn rejoin_split_is_space_separated() {
        let joined = rejoin_split("getUserName");
        assert_eq!(joined, "get user name getUserName");
    }
}
