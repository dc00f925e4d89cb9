//! Python language definition.
//!
//! `decorated_definition` is queried in addition to the bare
//! `function_definition`/`class_definition` nodes it wraps — the extractor's
//! nested-dedup pass (spec.md §4.2) collapses the pair back into one block
//! per the "decorated definition" rule.

use super::{BlockKind, LanguageDef, SignatureStyle};

const CHUNK_QUERY: &str = r#"
(function_definition
  name: (identifier) @name) @function

(class_definition
  name: (identifier) @name) @class

(decorated_definition
  definition: (function_definition
    name: (identifier) @name)) @function

(decorated_definition
  definition: (class_definition
    name: (identifier) @name)) @class
"#;

const TYPE_MAP: &[(&str, BlockKind)] = &[
    ("function", BlockKind::Function),
    ("class", BlockKind::Class),
];

static DEFINITION: LanguageDef = LanguageDef {
    name: "python",
    extensions: &["py", "pyi"],
    grammar: || tree_sitter_python::LANGUAGE.into(),
    chunk_query: CHUNK_QUERY,
    signature_style: SignatureStyle::UntilColon,
    type_map: TYPE_MAP,
    name_capture: "name",
    method_containers: &["class_definition"],
    decorated_node: Some("decorated_definition"),
};

pub fn definition() -> &'static LanguageDef {
    &DEFINITION
}
