//! Language registry for code parsing.
//!
//! Each supported language contributes a [`LanguageDef`]: its tree-sitter
//! grammar, a chunk-extraction query, and the mapping from capture names to
//! [`BlockKind`]. Registration happens at process start behind feature flags
//! (`lang-rust`, `lang-python`, ...), mirroring the teacher's per-language
//! module split.

#[cfg(feature = "lang-c")]
mod c;
#[cfg(feature = "lang-go")]
mod go;
#[cfg(feature = "lang-javascript")]
mod javascript;
#[cfg(feature = "lang-python")]
mod python;
#[cfg(feature = "lang-rust")]
mod rust;
#[cfg(feature = "lang-typescript")]
mod typescript;

use std::collections::HashMap;
use std::sync::LazyLock;

/// The kind of source element a [`crate::extractor::Block`] was extracted from.
///
/// Corresponds to spec.md §3's closed set of block kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Trait,
    Impl,
    Interface,
    Module,
    TextChunk,
    Other,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Function => "function",
            BlockKind::Method => "method",
            BlockKind::Class => "class",
            BlockKind::Struct => "struct",
            BlockKind::Enum => "enum",
            BlockKind::Trait => "trait",
            BlockKind::Impl => "impl",
            BlockKind::Interface => "interface",
            BlockKind::Module => "module",
            BlockKind::TextChunk => "text_chunk",
            BlockKind::Other => "other",
        }
    }

    /// Whether the query mentions a class-like term (boost.rs §4.8 kind affinity).
    pub fn is_class_like(&self) -> bool {
        matches!(
            self,
            BlockKind::Class | BlockKind::Struct | BlockKind::Impl | BlockKind::Enum | BlockKind::Trait
        )
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self, BlockKind::Function | BlockKind::Method)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "function" => BlockKind::Function,
            "method" => BlockKind::Method,
            "class" => BlockKind::Class,
            "struct" => BlockKind::Struct,
            "enum" => BlockKind::Enum,
            "trait" => BlockKind::Trait,
            "impl" => BlockKind::Impl,
            "interface" => BlockKind::Interface,
            "module" => BlockKind::Module,
            "text_chunk" => BlockKind::TextChunk,
            "other" => BlockKind::Other,
            other => return Err(format!("unknown block kind: {other}")),
        })
    }
}

/// How a function/method signature is delimited, used by the extractor to
/// synthesize a name for anonymous nodes and to bound decorator clusters.
#[derive(Debug, Clone, Copy, Default)]
pub enum SignatureStyle {
    #[default]
    UntilBrace,
    UntilColon,
}

/// A language definition: grammar, extraction query, and capture mapping.
pub struct LanguageDef {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    pub grammar: fn() -> tree_sitter::Language,
    /// Tree-sitter query capturing the block kinds this language recognizes.
    /// Each pattern must carry a capture named after a key in `type_map`.
    pub chunk_query: &'static str,
    pub signature_style: SignatureStyle,
    pub type_map: &'static [(&'static str, BlockKind)],
    /// Capture name used to find the declared identifier within a match.
    pub name_capture: &'static str,
    /// Tree-sitter node kinds whose children, when they contain a `function`
    /// capture, reclassify that capture from `Function` to `Method` and
    /// supply a `parent_type_name` for the synthesized method name.
    pub method_containers: &'static [&'static str],
    /// Node kind for a decorator-wrapped definition (e.g. Python's
    /// `decorated_definition`), if the grammar distinguishes one. Used to
    /// implement the "decorated definition" nested-dedup rule in spec.md §4.2.
    pub decorated_node: Option<&'static str>,
}

/// Global registry of languages enabled via Cargo features.
pub static REGISTRY: LazyLock<LanguageRegistry> = LazyLock::new(LanguageRegistry::new);

pub struct LanguageRegistry {
    by_name: HashMap<&'static str, &'static LanguageDef>,
    by_extension: HashMap<&'static str, &'static LanguageDef>,
}

impl LanguageRegistry {
    fn new() -> Self {
        let mut reg = Self {
            by_name: HashMap::new(),
            by_extension: HashMap::new(),
        };

        #[cfg(feature = "lang-rust")]
        reg.register(rust::definition());
        #[cfg(feature = "lang-python")]
        reg.register(python::definition());
        #[cfg(feature = "lang-typescript")]
        reg.register(typescript::definition());
        #[cfg(feature = "lang-javascript")]
        reg.register(javascript::definition());
        #[cfg(feature = "lang-go")]
        reg.register(go::definition());
        #[cfg(feature = "lang-c")]
        reg.register(c::definition());

        reg
    }

    fn register(&mut self, def: &'static LanguageDef) {
        self.by_name.insert(def.name, def);
        for ext in def.extensions {
            self.by_extension.insert(*ext, def);
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static LanguageDef> {
        self.by_name.get(name).copied()
    }

    pub fn from_extension(&self, ext: &str) -> Option<&'static LanguageDef> {
        self.by_extension.get(ext).copied()
    }

    pub fn all(&self) -> impl Iterator<Item = &'static LanguageDef> + '_ {
        self.by_name.values().copied()
    }

    pub fn supported_extensions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_extension.keys().copied()
    }
}

/// The language tag stamped on a [`crate::extractor::Block`].
///
/// `Prose` covers Markdown/plain-text/reST (spec.md §3: `"text"` / `"markdown"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Language {
    Code(&'static str),
    Prose(&'static str),
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Code(name) => name,
            Language::Prose(name) => name,
        }
    }

    pub fn is_prose(&self) -> bool {
        matches!(self, Language::Prose(_))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_kind_round_trip() {
        for kind in [
            BlockKind::Function,
            BlockKind::Method,
            BlockKind::Class,
            BlockKind::Struct,
            BlockKind::Enum,
            BlockKind::Trait,
            BlockKind::Impl,
            BlockKind::Interface,
            BlockKind::Module,
            BlockKind::TextChunk,
            BlockKind::Other,
        ] {
            let s = kind.to_string();
            let parsed: BlockKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn registry_resolves_by_extension() {
        #[cfg(feature = "lang-rust")]
        assert!(REGISTRY.from_extension("rs").is_some());
        #[cfg(feature = "lang-python")]
        assert!(REGISTRY.from_extension("py").is_some());
        assert!(REGISTRY.from_extension("zzz_unknown").is_none());
    }

    #[test]
    fn kind_affinity_helpers() {
        assert!(BlockKind::Struct.is_class_like());
        assert!(!BlockKind::Function.is_class_like());
        assert!(BlockKind::Method.is_function_like());
        assert!(!BlockKind::Class.is_function_like());
    }
}
