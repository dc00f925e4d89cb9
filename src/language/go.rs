//! Go language definition.

use super::{BlockKind, LanguageDef, SignatureStyle};

const CHUNK_QUERY: &str = r#"
(function_declaration
  name: (identifier) @name) @function

(method_declaration
  name: (field_identifier) @name) @function

(type_declaration
  (type_spec
    name: (type_identifier) @name
    type: (struct_type))) @struct

(type_declaration
  (type_spec
    name: (type_identifier) @name
    type: (interface_type))) @interface
"#;

const TYPE_MAP: &[(&str, BlockKind)] = &[
    ("function", BlockKind::Function),
    ("struct", BlockKind::Struct),
    ("interface", BlockKind::Interface),
];

static DEFINITION: LanguageDef = LanguageDef {
    name: "go",
    extensions: &["go"],
    grammar: || tree_sitter_go::LANGUAGE.into(),
    chunk_query: CHUNK_QUERY,
    signature_style: SignatureStyle::UntilBrace,
    type_map: TYPE_MAP,
    name_capture: "name",
    // Go has no lexical "method container" ancestor — method_declaration is
    // matched directly and already distinguished by its own query pattern,
    // so it is captured as @function with a receiver-derived parent name
    // (handled in the extractor's Go-specific receiver lookup).
    method_containers: &[],
    decorated_node: None,
};

pub fn definition() -> &'static LanguageDef {
    &DEFINITION
}
