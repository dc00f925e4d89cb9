//! TypeScript language definition.

use super::{BlockKind, LanguageDef, SignatureStyle};

const CHUNK_QUERY: &str = r#"
(function_declaration
  name: (identifier) @name) @function

(class_declaration
  name: (type_identifier) @name) @class

(interface_declaration
  name: (type_identifier) @name) @interface

(method_definition
  name: (property_identifier) @name) @function

(enum_declaration
  name: (identifier) @name) @enum
"#;

const TYPE_MAP: &[(&str, BlockKind)] = &[
    ("function", BlockKind::Function),
    ("class", BlockKind::Class),
    ("interface", BlockKind::Interface),
    ("enum", BlockKind::Enum),
];

static DEFINITION: LanguageDef = LanguageDef {
    name: "typescript",
    extensions: &["ts", "tsx"],
    grammar: || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
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
