//! Shared types, error enum, and (de)serialization helpers for the vector
//! store. Named and scoped after the teacher's `store/helpers.rs` split.

use std::path::PathBuf;

use thiserror::Error;

use crate::block::Block;
use crate::embedder::MultiVector;
use crate::language::{BlockKind, Language};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open store at {0}: {1}")]
    Open(PathBuf, sqlx::Error),
    #[error("failed to start runtime: {0}")]
    Runtime(String),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("block not found: {0}")]
    BlockNotFound(String),
    #[error("corrupt vector payload for {0}")]
    CorruptVector(String),
}

/// One hit from a store query: the reconstructed block plus its score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub block: Block,
    pub score: f32,
}

/// Optional filters/knobs for [`super::Store::query_with_options`]
/// (spec.md §4.7: scope filter, kind filter, result limit).
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub scope_prefix: Option<String>,
    pub kind: Option<BlockKind>,
    pub limit: usize,
    pub exclude_relative_path: Option<String>,
}

pub(super) fn serialize_matrix(matrix: &MultiVector) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(matrix.data.len() * 4);
    for v in matrix.data.iter() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub(super) fn deserialize_matrix(bytes: &[u8], num_tokens: usize, dim: usize) -> Option<MultiVector> {
    if bytes.len() != num_tokens * dim * 4 {
        return None;
    }
    let mut data = ndarray::Array2::<f32>::zeros((num_tokens, dim));
    for (i, chunk) in bytes.chunks_exact(4).enumerate() {
        let value = f32::from_le_bytes(chunk.try_into().ok()?);
        data[[i / dim, i % dim]] = value;
    }
    Some(MultiVector { dim, data })
}

pub(super) fn serialize_fde(fde: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(fde.len() * 4);
    for v in fde {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub(super) fn deserialize_fde(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().expect("chunks_exact(4)")))
        .collect()
}

pub(super) struct BlockRow {
    pub id: String,
    pub relative_path: String,
    pub language: String,
    pub is_prose: bool,
    pub kind: String,
    pub name: String,
    pub start_line: i64,
    pub end_line: i64,
    pub content: String,
    pub embedding_text: String,
    pub parent_type_name: Option<String>,
}

impl BlockRow {
    pub fn from_block(block: &Block) -> Self {
        Self {
            id: block.id.clone(),
            relative_path: block.relative_path.clone(),
            language: block.language.as_str().to_string(),
            is_prose: block.language.is_prose(),
            kind: block.kind.as_str().to_string(),
            name: block.name.clone(),
            start_line: block.start_line as i64,
            end_line: block.end_line as i64,
            content: block.content.clone(),
            embedding_text: block.embedding_text.clone(),
            parent_type_name: block.parent_type_name.clone(),
        }
    }

    pub fn into_block(self) -> Result<Block, StoreError> {
        let kind: BlockKind = self
            .kind
            .parse()
            .map_err(|_| StoreError::CorruptVector(self.id.clone()))?;
        let language = if self.is_prose {
            Language::Prose(leak_str(&self.language))
        } else {
            Language::Code(leak_str(&self.language))
        };
        Ok(Block {
            id: self.id,
            relative_path: self.relative_path,
            language,
            kind,
            name: self.name,
            start_line: self.start_line as u32,
            end_line: self.end_line as u32,
            content: self.content,
            embedding_text: self.embedding_text,
            parent_type_name: self.parent_type_name,
        })
    }
}

/// The set of languages is small and closed (registered code languages plus
/// a handful of prose tags like `"markdown"`); interning each distinct tag
/// once lets [`Language`] stay a plain `&'static str` newtype instead of an
/// owned `String` everywhere, without leaking memory per row fetched.
fn leak_str(s: &str) -> &'static str {
    if let Some(def) = crate::language::REGISTRY.get(s) {
        return def.name;
    }
    static INTERNED: std::sync::OnceLock<std::sync::Mutex<std::collections::HashSet<&'static str>>> =
        std::sync::OnceLock::new();
    let table = INTERNED.get_or_init(|| std::sync::Mutex::new(std::collections::HashSet::new()));
    let mut guard = table.lock().expect("interning table poisoned");
    if let Some(existing) = guard.get(s) {
        return existing;
    }
    let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
    guard.insert(leaked);
    leaked
}
