//! JavaScript language definition.

use super::{BlockKind, LanguageDef, SignatureStyle};

const CHUNK_QUERY: &str = r#"
(function_declaration
  name: (identifier) @name) @function

(class_declaration
  name: (identifier) @name) @class

(method_definition
  name: (property_identifier) @name) @function
"#;

const TYPE_MAP: &[(&str, BlockKind)] = &[
    ("function", BlockKind::Function),
    ("class", BlockKind::Class),
];

static DEFINITION: LanguageDef = LanguageDef {
    name: "javascript",
    extensions: &["js", "jsx", "mjs", "cjs"],
    grammar: || tree_sitter_javascript::LANGUAGE.into(),
    chunk_query: CHUNK_QUERY,
    signature_style: SignatureStyle::UntilBrace,
    type_map: TYPE_MAP,
    name_capture: "name",
    method_containers: &["class_body"],
    decorated_node: None,
};

pub fn definition() -> &'static LanguageDef {
    &DEFINITION
}
