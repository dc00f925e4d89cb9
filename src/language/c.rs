//! C language definition.

use super::{BlockKind, LanguageDef, SignatureStyle};

const CHUNK_QUERY: &str = r#"
(function_definition
  declarator: (function_declarator
    declarator: (identifier) @name)) @function

(struct_specifier
  name: (type_identifier) @name
  body: (field_declaration_list)) @struct

(enum_specifier
  name: (type_identifier) @name
  body: (enumerator_list)) @enum
"#;

const TYPE_MAP: &[(&str, BlockKind)] = &[
    ("function", BlockKind::Function),
    ("struct", BlockKind::Struct),
    ("enum", BlockKind::Enum),
];

static DEFINITION: LanguageDef = LanguageDef {
    name: "c",
    extensions: &["c", "h"],
    grammar: || tree_sitter_c::LANGUAGE.into(),
    chunk_query: CHUNK_QUERY,
    signature_style: SignatureStyle::UntilBrace,
    type_map: TYPE_MAP,
    name_capture: "name",
    method_containers: &[],
    decorated_node: None,
};

pub fn definition() -> &'static LanguageDef {
    &DEFINITION
}
