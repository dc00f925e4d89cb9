//! Embedding generation with ort + tokenizers — spec.md §4.4.
//!
//! Unlike the teacher's single pooled vector per chunk, this crate's
//! embedder must answer with a per-token matrix (spec.md's multi-vector /
//! late-interaction model): document mode embeds every token of the input,
//! query mode does the same for the query string, and MaxSim scoring (see
//! `math.rs`) is computed downstream over the resulting matrices. The
//! lazy-session, checksum-free-but-dimension-checked loading shape is kept
//! from the teacher's `embedder.rs`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use thiserror::Error;
use tokenizers::Tokenizer;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model not found at {0}")]
    ModelNotFound(PathBuf),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("query cannot be empty")]
    EmptyQuery,
}

impl From<ort::Error> for EmbedderError {
    fn from(e: ort::Error) -> Self {
        EmbedderError::Inference(e.to_string())
    }
}

/// How the input is framed for the model — document embeddings and query
/// embeddings are asymmetric for most retrieval-tuned encoders (spec.md
/// §4.4: "document vs. query mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Document,
    Query,
}

impl EmbedMode {
    fn prefix(self) -> &'static str {
        match self {
            EmbedMode::Document => "passage: ",
            EmbedMode::Query => "query: ",
        }
    }
}

/// One string's per-token embedding matrix: `tokens.len()` rows of `dim`
/// columns, row-major. Row `i` is the contextual embedding of the `i`th
/// sub-word token (after the mode prefix is stripped back out).
#[derive(Debug, Clone)]
pub struct MultiVector {
    pub dim: usize,
    pub data: Array2<f32>,
}

impl MultiVector {
    pub fn num_tokens(&self) -> usize {
        self.data.nrows()
    }

    pub fn row(&self, i: usize) -> &[f32] {
        self.data.row(i).to_slice().expect("contiguous row")
    }
}

pub struct Embedder {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
    max_seq_len: usize,
}

/// Identifies the model an [`Embedder`] was built from, stamped into the
/// manifest so a later run with a different model forces a rebuild rather
/// than silently mixing incompatible vectors.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub dimension: usize,
}

impl Embedder {
    /// Load a model + tokenizer pair from a local directory containing
    /// `model.onnx` and `tokenizer.json`. Initialization happens once per
    /// process; callers are expected to hold the `Embedder` behind a
    /// [`OnceLock`]-backed singleton (see [`global`]).
    pub fn load(model_dir: &Path, model_name: &str, dim: usize, max_seq_len: usize) -> Result<Self, EmbedderError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !model_path.is_file() {
            return Err(EmbedderError::ModelNotFound(model_path));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(num_cpus_hint())?
            .commit_from_file(&model_path)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedderError::Tokenizer(e.to_string()))?;

        Ok(Self {
            session,
            tokenizer,
            dim,
            max_seq_len,
        })
    }

    pub fn model_info(&self, model_name: &str) -> ModelInfo {
        ModelInfo {
            name: model_name.to_string(),
            dimension: self.dim,
        }
    }

    /// Embed a single string, returning its per-token matrix.
    pub fn embed_one(&mut self, text: &str, mode: EmbedMode) -> Result<MultiVector, EmbedderError> {
        if mode == EmbedMode::Query && text.trim().is_empty() {
            return Err(EmbedderError::EmptyQuery);
        }
        let mut batch = self.embed_batch(&[text.to_string()], mode)?;
        Ok(batch.remove(0))
    }

    /// Embed a batch of strings. Each input gets `mode`'s prefix prepended
    /// (spec.md §4.4), is truncated to `max_seq_len` sub-word tokens, and
    /// produces one [`MultiVector`] whose rows correspond 1:1 with the
    /// truncated token sequence.
    pub fn embed_batch(&mut self, texts: &[String], mode: EmbedMode) -> Result<Vec<MultiVector>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prefixed: Vec<String> = texts.iter().map(|t| format!("{}{t}", mode.prefix())).collect();
        let encodings = self
            .tokenizer
            .encode_batch(prefixed, true)
            .map_err(|e| EmbedderError::Tokenizer(e.to_string()))?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_seq_len))
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let token_type_ids = vec![0i64; batch_size * seq_len];

        for (row, enc) in encodings.iter().enumerate() {
            let ids = enc.get_ids();
            let n = ids.len().min(seq_len);
            for col in 0..n {
                input_ids[row * seq_len + col] = ids[col] as i64;
                attention_mask[row * seq_len + col] = 1;
            }
        }

        let input_ids_tensor = Value::from_array(([batch_size, seq_len], input_ids.clone()))?;
        let attention_tensor = Value::from_array(([batch_size, seq_len], attention_mask.clone()))?;
        let type_ids_tensor = Value::from_array(([batch_size, seq_len], token_type_ids))?;

        let outputs = self.session.run(ort::inputs![
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_tensor,
            "token_type_ids" => type_ids_tensor,
        ]?)?;

        let (shape, values) = outputs[0].try_extract_tensor::<f32>()?;
        let hidden = shape[2] as usize;
        if hidden != self.dim {
            return Err(EmbedderError::Inference(format!(
                "model produced {hidden}-dim output, expected {}",
                self.dim
            )));
        }

        let mut results = Vec::with_capacity(batch_size);
        for row in 0..batch_size {
            let real_tokens = attention_mask[row * seq_len..(row + 1) * seq_len]
                .iter()
                .filter(|&&m| m != 0)
                .count()
                .max(1);
            let mut data = Array2::<f32>::zeros((real_tokens, hidden));
            for t in 0..real_tokens {
                let offset = (row * seq_len + t) * hidden;
                for d in 0..hidden {
                    data[[t, d]] = values[offset + d];
                }
            }
            l2_normalize_rows(&mut data);
            results.push(MultiVector { dim: hidden, data });
        }

        Ok(results)
    }
}

fn l2_normalize_rows(data: &mut Array2<f32>) {
    for mut row in data.rows_mut() {
        let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
}

fn num_cpus_hint() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Process-wide embedder singleton, lazily initialized on first use and
/// never torn down (spec.md §9: "global state as lazy singletons... no
/// teardown").
static GLOBAL: OnceLock<std::sync::Mutex<Embedder>> = OnceLock::new();

pub fn global(model_dir: &Path, model_name: &str, dim: usize, max_seq_len: usize) -> Result<&'static std::sync::Mutex<Embedder>, EmbedderError> {
    if let Some(existing) = GLOBAL.get() {
        return Ok(existing);
    }
    let embedder = Embedder::load(model_dir, model_name, dim, max_seq_len)?;
    Ok(GLOBAL.get_or_init(|| std::sync::Mutex::new(embedder)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_mode_prefixes_differ() {
        assert_ne!(EmbedMode::Document.prefix(), EmbedMode::Query.prefix());
    }

    #[test]
    fn l2_normalize_produces_unit_rows() {
        let mut data = Array2::from_shape_vec((2, 3), vec![3.0, 4.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        l2_normalize_rows(&mut data);
        let norm0 = (data[[0, 0]].powi(2) + data[[0, 1]].powi(2) + data[[0, 2]].powi(2)).sqrt();
        assert!((norm0 - 1.0).abs() < 1e-5);
    }
}
