// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! Runs the all-MiniLM-L6-v2 sentence transformer through ONNX Runtime.
//!
//! - BERT tokenization (HuggingFace `tokenizers`), truncated to 256 word-pieces
//! - Batch inference with per-batch padding
//! - Mean pooling over token embeddings, weighted by the attention mask
//! - L2-normalized 384-dimensional output vectors

use anyhow::{Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, Axis};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::{EmbeddingError, EmbeddingProvider, MINILM_DIMENSION};

/// Longest input the sentence-transformers export was trained on
pub const MAX_SEQUENCE_LENGTH: usize = 256;

/// ONNX-based embedding model (all-MiniLM-L6-v2)
///
/// The session sits behind a mutex because ONNX Runtime requires exclusive
/// access for `run`. Cloning shares the same session and tokenizer.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    model_name: String,
    dimension: usize,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

/// Padded batch inputs, row-major `[batch, max_len]`
struct BatchInputs {
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
    batch: usize,
    max_len: usize,
}

impl BatchInputs {
    fn from_encodings(encodings: &[Encoding]) -> Self {
        let batch = encodings.len();
        let max_len = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = Vec::with_capacity(batch * max_len);
        let mut attention_mask = Vec::with_capacity(batch * max_len);

        for encoding in encodings {
            let ids = encoding.get_ids();
            let padding = max_len - ids.len();

            input_ids.extend(ids.iter().map(|&id| id as i64));
            input_ids.extend(std::iter::repeat(0i64).take(padding));

            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
            attention_mask.extend(std::iter::repeat(0i64).take(padding));
        }

        Self {
            input_ids,
            attention_mask,
            token_type_ids: vec![0i64; batch * max_len],
            batch,
            max_len,
        }
    }

    fn row_mask(&self, row: usize) -> &[i64] {
        &self.attention_mask[row * self.max_len..(row + 1) * self.max_len]
    }
}

fn inference_error(e: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::Inference(e.to_string())
}

/// Truncates every encoding to `MAX_SEQUENCE_LENGTH` tokens, special tokens included
fn configure_truncation(tokenizer: &mut Tokenizer) -> Result<()> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_LENGTH,
            ..Default::default()
        }))
        .map_err(|e| anyhow::anyhow!("Failed to configure tokenizer truncation: {}", e))?;
    Ok(())
}

/// Attention-mask weighted mean over the token axis of `[seq_len, hidden_dim]`
fn mean_pool(token_embeddings: ndarray::ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    let (seq_len, hidden_dim) = token_embeddings.dim();

    let mut pooled = vec![0.0f32; hidden_dim];
    let mut mask_sum = 0.0f32;
    for (i, &m) in mask.iter().enumerate().take(seq_len) {
        let weight = m as f32;
        mask_sum += weight;
        for j in 0..hidden_dim {
            pooled[j] += token_embeddings[[i, j]] * weight;
        }
    }
    for value in &mut pooled {
        *value /= mask_sum.max(1e-9);
    }
    pooled
}

/// Scales to unit length; an all-zero vector is left unchanged
fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

impl OnnxEmbeddingModel {
    /// Loads the ONNX model and tokenizer from disk and validates the output shape
    ///
    /// # Errors
    /// Returns error if either file is missing or invalid, ONNX Runtime fails
    /// to initialize, or the validation inference does not produce 384-dim vectors.
    ///
    /// # Example
    /// ```ignore
    /// let model = OnnxEmbeddingModel::new(
    ///     "all-MiniLM-L6-v2",
    ///     "./models/all-MiniLM-L6-v2-onnx/model.onnx",
    ///     "./models/all-MiniLM-L6-v2-onnx/tokenizer.json",
    /// ).await?;
    /// ```
    pub async fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("Initializing ONNX embedding model {}", model_name);

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        configure_truncation(&mut tokenizer)?;

        let model = Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_name,
            dimension: MINILM_DIMENSION,
        };

        // Validation inference: the model must emit [batch, seq_len, 384]
        model
            .run_batch(&["validation test".to_string()])
            .context("Embedding model validation failed")?;

        info!("ONNX embedding model {} loaded", model.model_name);
        Ok(model)
    }

    fn tokenize(&self, texts: &[String]) -> Result<Vec<Encoding>, EmbeddingError> {
        texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| EmbeddingError::Tokenization(e.to_string()))
            })
            .collect()
    }

    /// Tokenizes, pads and runs one inference over the whole batch
    fn run_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let inputs = BatchInputs::from_encodings(&self.tokenize(texts)?);
        let shape = (inputs.batch, inputs.max_len);

        let input_ids = Array2::from_shape_vec(shape, inputs.input_ids.clone())
            .map_err(inference_error)?;
        let attention_mask = Array2::from_shape_vec(shape, inputs.attention_mask.clone())
            .map_err(inference_error)?;
        let token_type_ids = Array2::from_shape_vec(shape, inputs.token_type_ids.clone())
            .map_err(inference_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbeddingError::Inference("ONNX session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => Value::from_array(input_ids).map_err(inference_error)?,
                "attention_mask" => Value::from_array(attention_mask).map_err(inference_error)?,
                "token_type_ids" => Value::from_array(token_type_ids).map_err(inference_error)?
            ])
            .map_err(inference_error)?;

        // Output index 0 rather than a name: exports differ in output naming
        let token_embeddings = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;

        let shape = token_embeddings.shape();
        if shape.len() != 3 || shape[2] != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: shape.last().copied().unwrap_or(0),
            });
        }

        let mut embeddings = Vec::with_capacity(inputs.batch);
        for row in 0..inputs.batch {
            let item = token_embeddings
                .index_axis(Axis(0), row)
                .into_dimensionality::<ndarray::Ix2>()
                .map_err(inference_error)?;
            let mut pooled = mean_pool(item, inputs.row_mask(row));
            l2_normalize(&mut pooled);
            embeddings.push(pooled);
        }

        debug!(
            "Embedded {} texts (padded length {})",
            inputs.batch, inputs.max_len
        );
        Ok(embeddings)
    }

    /// Counts non-padding tokens in a text
    pub fn count_tokens(&self, text: &str) -> Result<usize, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;
        Ok(encoding.get_attention_mask().iter().map(|&m| m as usize).sum())
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbeddingModel {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.run_batch(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
