//! Rust language definition.

use super::{BlockKind, LanguageDef, SignatureStyle};

const CHUNK_QUERY: &str = r#"
(function_item
  name: (identifier) @name) @function

(struct_item
  name: (type_identifier) @name) @struct

(enum_item
  name: (type_identifier) @name) @enum

(trait_item
  name: (type_identifier) @name) @trait

(impl_item
  type: (type_identifier) @name) @impl

(mod_item
  name: (identifier) @name) @module
"#;

const TYPE_MAP: &[(&str, BlockKind)] = &[
    ("function", BlockKind::Function),
    ("struct", BlockKind::Struct),
    ("enum", BlockKind::Enum),
    ("trait", BlockKind::Trait),
    ("impl", BlockKind::Impl),
    ("module", BlockKind::Module),
];

static DEFINITION: LanguageDef = LanguageDef {
    name: "rust",
    extensions: &["rs"],
    grammar: || tree_sitter_rust::LANGUAGE.into(),
    chunk_query: CHUNK_QUERY,
    signature_style: SignatureStyle::UntilBrace,
    type_map: TYPE_MAP,
    name_capture: "name",
    method_containers: &["impl_item", "trait_item"],
    decorated_node: None,
};

pub fn definition() -> &'static LanguageDef {
    &DEFINITION
}
