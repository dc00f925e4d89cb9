//! Tree-sitter based extraction — spec.md §4.2.
//!
//! Split into submodules:
//! - `nested_dedup` — the nested-block dedup pass, including the decorated-
//!   definition special case
//! - `prose` — fenced-code-block and heading-based Markdown chunking
//!
//! Mirrors the teacher's `parser` module split (`chunk.rs` / `markdown.rs`
//! beside `mod.rs`), generalized to this crate's `Block` model and extended
//! with the dedup pass and Go's receiver-based method detection.

mod nested_dedup;
pub mod prose;

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use thiserror::Error;
use tree_sitter::StreamingIterator;

use crate::block::Block;
use crate::language::{BlockKind, Language, LanguageDef, REGISTRY};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),
    #[error("failed to set grammar for {0}: {1}")]
    GrammarSet(String, String),
    #[error("tree-sitter failed to parse {0}")]
    ParseFailed(String),
    #[error("failed to compile query for {0}: {1}")]
    QueryCompile(String, String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Size guards mirroring the teacher's (spec.md doesn't name exact figures,
/// but names "a file size cap" among ambient concerns — reusing the walker's
/// 1 MiB cap here would double-skip; this is deliberately generous since it
/// only bounds a single extraction call, not the whole walk).
const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;
const MAX_BLOCK_BYTES: usize = 200_000;
const MAX_BLOCK_LINES: u32 = 400;

/// Extracts [`Block`]s from source files via tree-sitter queries, one query
/// per language compiled lazily on first use.
pub struct Extractor {
    queries: HashMap<&'static str, OnceLock<tree_sitter::Query>>,
}

impl Extractor {
    pub fn new() -> Self {
        let mut queries = HashMap::new();
        for def in REGISTRY.all() {
            queries.insert(def.name, OnceLock::new());
        }
        Self { queries }
    }

    fn query_for(&self, def: &'static LanguageDef) -> Result<&tree_sitter::Query, ExtractError> {
        let cell = self
            .queries
            .get(def.name)
            .expect("registry and query map built from the same set");
        if let Some(q) = cell.get() {
            return Ok(q);
        }
        let grammar = (def.grammar)();
        let query = tree_sitter::Query::new(&grammar, def.chunk_query)
            .map_err(|e| ExtractError::QueryCompile(def.name.to_string(), format!("{e:?}")))?;
        Ok(cell.get_or_init(|| query))
    }

    /// Extract every block from one file. `relative_path` is the POSIX-form
    /// path stamped onto each block's id and `relative_path` field.
    pub fn extract_file(&self, path: &Path, relative_path: &str) -> Result<Vec<Block>, ExtractError> {
        let metadata = std::fs::metadata(path)?;
        if metadata.len() > MAX_FILE_BYTES {
            tracing::warn!(path = %path.display(), bytes = metadata.len(), "skipping oversized file");
            return Ok(Vec::new());
        }

        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                tracing::warn!(path = %path.display(), "skipping non-UTF8 file");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        // Normalize line endings so hashes and line numbers agree across platforms.
        let source = source.replace("\r\n", "\n");

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        if ext == "md" || ext == "markdown" {
            return Ok(prose::chunk_markdown(&source, relative_path));
        }

        let Some(def) = REGISTRY.from_extension(ext) else {
            // No grammar registered for this extension — fall back to
            // chunked prose rather than failing the file outright (spec.md
            // §4.2: "fall back to chunked prose for text files").
            return Ok(prose::chunk_text(&source, relative_path));
        };

        let grammar = (def.grammar)();
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| ExtractError::GrammarSet(def.name.to_string(), format!("{e:?}")))?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| ExtractError::ParseFailed(relative_path.to_string()))?;

        let query = self.query_for(def)?;
        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source.as_bytes());

        let mut raw = Vec::new();
        while let Some(m) = matches.next() {
            if let Some(block) = self.extract_one(&source, m, query, def, relative_path) {
                if block.line_count() <= MAX_BLOCK_LINES && block.content.len() <= MAX_BLOCK_BYTES {
                    raw.push(block);
                } else {
                    tracing::debug!(id = %block.id, "skipping oversized block");
                }
            }
        }

        Ok(nested_dedup::dedup(raw))
    }

    fn extract_one(
        &self,
        source: &str,
        m: &tree_sitter::QueryMatch<'_, '_>,
        query: &tree_sitter::Query,
        def: &'static LanguageDef,
        relative_path: &str,
    ) -> Option<Block> {
        let (node, mut kind) = def.type_map.iter().find_map(|(capture_name, kind)| {
            query
                .capture_index_for_name(capture_name)
                .and_then(|idx| m.captures.iter().find(|c| c.index == idx))
                .map(|c| (c.node, *kind))
        })?;

        let name_idx = query.capture_index_for_name(def.name_capture);
        let name = name_idx
            .and_then(|idx| m.captures.iter().find(|c| c.index == idx))
            .map(|c| source[c.node.byte_range()].to_string())
            .unwrap_or_else(|| "<anonymous>".to_string());

        let mut parent_type_name = None;
        if kind == BlockKind::Function {
            if let Some(parent_name) = method_parent_name(node, def, source) {
                kind = BlockKind::Method;
                parent_type_name = Some(parent_name);
            }
        }

        // A decorated definition's query (see e.g. `language/python.rs`)
        // captures both the bare definition and the decorator-wrapped node
        // as separate matches with the same capture name, so `node` here is
        // whichever one this particular match landed on. Both blocks are
        // emitted; `nested_dedup` collapses the pair.
        let content = source[node.byte_range()].to_string();
        let start_line = node.start_position().row as u32 + 1;
        let end_line = node.end_position().row as u32 + 1;

        Some(Block::new(
            relative_path.to_string(),
            Language::Code(def.name),
            kind,
            name,
            start_line,
            end_line,
            content,
            parent_type_name,
        ))
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks a node's ancestors looking for a method-container kind (an `impl`
/// or class body) or, for languages like Go that lack one, a method node
/// kind directly on `node` itself — returning the enclosing type's name.
fn method_parent_name(node: tree_sitter::Node, def: &'static LanguageDef, source: &str) -> Option<String> {
    if def.name == "go" && node.kind() == "method_declaration" {
        return go_receiver_type_name(node, source);
    }

    let mut current = node.parent();
    while let Some(parent) = current {
        if def.method_containers.contains(&parent.kind()) {
            return container_type_name(parent, source);
        }
        current = parent.parent();
    }
    None
}

/// Pulls the receiver's type name out of a Go `method_declaration`, e.g.
/// `func (s *Server) Handle(...)` → `"Server"`.
fn go_receiver_type_name(node: tree_sitter::Node, source: &str) -> Option<String> {
    let receiver = node.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    for child in receiver.named_children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            if let Some(ty) = child.child_by_field_name("type") {
                let text = source[ty.byte_range()].trim_start_matches('*').to_string();
                return Some(text);
            }
        }
    }
    None
}

/// Finds the name of the type a method container (impl/class body) belongs
/// to by walking up to the nearest ancestor carrying a `name` or `type`
/// field.
fn container_type_name(container: tree_sitter::Node, source: &str) -> Option<String> {
    let target = match container.kind() {
        "impl_item" => container.child_by_field_name("type"),
        "class_definition" => container.child_by_field_name("name"),
        _ => container.parent().and_then(|p| p.child_by_field_name("name")),
    };
    target.map(|n| source[n.byte_range()].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str, ext: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(&format!(".{ext}")).tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn extracts_rust_function() {
        let f = write_temp("fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n", "rs");
        let extractor = Extractor::new();
        let blocks = extractor.extract_file(f.path(), "add.rs").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].name, "add");
        assert_eq!(blocks[0].kind, BlockKind::Function);
    }

    #[cfg(feature = "lang-rust")]
    #[test]
    fn classifies_impl_method() {
        let src = "struct Foo;\nimpl Foo {\n    fn bar(&self) {}\n}\n";
        let f = write_temp(src, "rs");
        let extractor = Extractor::new();
        let blocks = extractor.extract_file(f.path(), "foo.rs").unwrap();
        let method = blocks.iter().find(|b| b.name == "bar").unwrap();
        assert_eq!(method.kind, BlockKind::Method);
        assert_eq!(method.parent_type_name.as_deref(), Some("Foo"));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn decorated_python_function_spans_decorator() {
        let src = "@app.route(\"/x\")\ndef handler():\n    pass\n";
        let f = write_temp(src, "py");
        let extractor = Extractor::new();
        let blocks = extractor.extract_file(f.path(), "app.py").unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].content.starts_with('@'));
    }

    #[cfg(feature = "lang-go")]
    #[test]
    fn go_method_uses_receiver_type() {
        let src = "package main\n\ntype Server struct{}\n\nfunc (s *Server) Handle() {}\n";
        let f = write_temp(src, "go");
        let extractor = Extractor::new();
        let blocks = extractor.extract_file(f.path(), "server.go").unwrap();
        let method = blocks.iter().find(|b| b.name == "Handle").unwrap();
        assert_eq!(method.kind, BlockKind::Method);
        assert_eq!(method.parent_type_name.as_deref(), Some("Server"));
    }

    #[test]
    fn markdown_routes_to_prose_chunker() {
        let f = write_temp("# Title\n\nSome text.\n", "md");
        let extractor = Extractor::new();
        let blocks = extractor.extract_file(f.path(), "readme.md").unwrap();
        assert!(!blocks.is_empty());
        assert!(blocks[0].language.is_prose());
    }
}
