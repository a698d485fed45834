//! # ONNX Embedding Engine
//!
//! Sentence-transformer inference with ONNX Runtime: batch tokenization,
//! a single session run over the padded batch, attention-mask mean pooling
//! and optional L2 normalization.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = OnnxEmbeddingEngine::new(
//!     "all-MiniLM-L6-v2",
//!     Path::new("models/all-MiniLM-L6-v2/model.onnx"),
//!     Path::new("models/all-MiniLM-L6-v2/tokenizer.json"),
//!     &OnnxConfig::default(),
//! )?;
//! let embeddings = engine.embed_texts(&["Hello world".to_string()])?;
//! ```

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use ndarray::ArrayView3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tokenizers::{PaddingStrategy, Tokenizer};
use tracing::{debug, info, instrument};

use crate::models::EmbeddingError;

/// Configuration for ONNX Runtime and the tokenizer
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// Thread pool size for inference
    pub thread_pool_size: usize,
    /// Maximum sequence length, longer texts are truncated
    pub max_seq_length: usize,
    /// Apply L2 normalization to pooled embeddings
    pub normalize: bool,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 4,
            max_seq_length: 256,
            normalize: true,
        }
    }
}

/// ONNX-based embedding engine for generating text embeddings
#[derive(Debug)]
pub struct OnnxEmbeddingEngine {
    /// Session runs need exclusive access, all callers go through this lock
    session: Mutex<Session>,
    /// HuggingFace tokenizer, configured for batch padding and truncation
    tokenizer: Tokenizer,
    /// Whether the graph declares a `token_type_ids` input
    uses_token_type_ids: bool,
    config: OnnxConfig,
}

fn load_failed(model_name: &str, what: &str, error: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::ModelLoadFailed {
        model_name: model_name.to_string(),
        error: format!("Failed to load {}: {}", what, error),
    }
}

fn inference_failed(what: &str, error: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::EmbeddingFailed {
        error: format!("{}: {}", what, error),
    }
}

/// Pad every batch to its longest row and cut rows at `max_seq_length`
/// tokens, special tokens included. Pad token and id from tokenizer.json are
/// kept when present.
fn configure_tokenizer(tokenizer: &mut Tokenizer, max_seq_length: usize) -> tokenizers::Result<()> {
    let mut padding = tokenizer.get_padding().cloned().unwrap_or_default();
    padding.strategy = PaddingStrategy::BatchLongest;
    tokenizer.with_padding(Some(padding));

    let mut truncation = tokenizer.get_truncation().cloned().unwrap_or_default();
    truncation.max_length = max_seq_length;
    tokenizer.with_truncation(Some(truncation))?;
    Ok(())
}

/// Model inputs for one batch, flattened row-major as `[batch_size, seq_len]`
#[derive(Debug)]
struct EncodedBatch {
    batch_size: usize,
    seq_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
}

impl EncodedBatch {
    fn shape(&self) -> [i64; 2] {
        [self.batch_size as i64, self.seq_len as i64]
    }
}

fn encode_batch(tokenizer: &Tokenizer, texts: &[String]) -> Result<EncodedBatch, EmbeddingError> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| inference_failed("Tokenization failed", e))?;

    let batch_size = encodings.len();
    let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);

    let mut input_ids = Vec::with_capacity(batch_size * seq_len);
    let mut attention_mask = Vec::with_capacity(batch_size * seq_len);
    let mut token_type_ids = Vec::with_capacity(batch_size * seq_len);
    for encoding in &encodings {
        if encoding.get_ids().len() != seq_len {
            return Err(EmbeddingError::EmbeddingFailed {
                error: "Tokenizer produced a ragged batch".to_string(),
            });
        }
        input_ids.extend(encoding.get_ids().iter().map(|&x| x as i64));
        attention_mask.extend(encoding.get_attention_mask().iter().map(|&x| x as i64));
        token_type_ids.extend(encoding.get_type_ids().iter().map(|&x| x as i64));
    }

    Ok(EncodedBatch {
        batch_size,
        seq_len,
        input_ids,
        attention_mask,
        token_type_ids,
    })
}

impl OnnxEmbeddingEngine {
    /// Create a new ONNX embedding engine
    ///
    /// # Arguments
    /// * `model_name` - Identifier used in error messages
    /// * `model_path` - Path to the ONNX model file (model.onnx)
    /// * `tokenizer_path` - Path to the tokenizer configuration file (tokenizer.json)
    /// * `config` - Runtime and tokenizer settings
    pub fn new(
        model_name: &str,
        model_path: &Path,
        tokenizer_path: &Path,
        config: &OnnxConfig,
    ) -> Result<Self, EmbeddingError> {
        info!(
            "Initializing ONNX embedding engine with model: {}",
            model_path.display()
        );

        let session = Session::builder()
            .map_err(|e| load_failed(model_name, "session builder", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_failed(model_name, "optimization level", e))?
            .with_intra_threads(config.thread_pool_size)
            .map_err(|e| load_failed(model_name, "thread pool", e))?
            .commit_from_file(model_path)
            .map_err(|e| load_failed(model_name, "ONNX model", e))?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        debug!("ONNX graph inputs: {:?}", input_names);
        let uses_token_type_ids = input_names.contains(&"token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| load_failed(model_name, "tokenizer", e))?;

        configure_tokenizer(&mut tokenizer, config.max_seq_length)
            .map_err(|e| load_failed(model_name, "tokenizer settings", e))?;

        info!(
            "ONNX embedding engine initialized with {} threads (max {} tokens)",
            config.thread_pool_size, config.max_seq_length
        );
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            uses_token_type_ids,
            config: config.clone(),
        })
    }

    /// Generate embeddings for a batch of texts
    ///
    /// Returns one vector per input text, in input order. An empty batch
    /// yields an empty result without touching the session.
    #[instrument(skip(self, texts), fields(text_count = texts.len()))]
    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch = encode_batch(&self.tokenizer, texts)?;
        debug!(
            "Tokenized batch of {} into {} tokens each",
            batch.batch_size, batch.seq_len
        );

        let shape = batch.shape();
        let batch_size = batch.batch_size;
        let EncodedBatch {
            input_ids,
            attention_mask,
            token_type_ids,
            ..
        } = batch;
        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .map_err(|e| inference_failed("Failed to create input_ids tensor", e))?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask.clone()))
            .map_err(|e| inference_failed("Failed to create attention_mask tensor", e))?;

        let mut inputs = vec![
            ("input_ids", input_ids_tensor),
            ("attention_mask", attention_mask_tensor),
        ];
        if self.uses_token_type_ids {
            let token_type_ids_tensor = Tensor::from_array((shape, token_type_ids))
                .map_err(|e| inference_failed("Failed to create token_type_ids tensor", e))?;
            inputs.push(("token_type_ids", token_type_ids_tensor));
        }

        // A panic in a previous run leaves the session itself intact
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(inputs)
            .map_err(|e| inference_failed("ONNX inference failed", e))?;

        let (out_shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| inference_failed("Failed to extract output tensor", e))?;
        let dims: Vec<usize> = out_shape.iter().map(|&x| x as usize).collect();

        let pooled = match dims.as_slice() {
            // token embeddings [batch, seq, hidden]
            &[b, s, h] => {
                let view = ArrayView3::from_shape((b, s, h), data)
                    .map_err(|e| inference_failed("Failed to create output array view", e))?;
                Self::mean_pooling(&view, &attention_mask)?
            }
            // graph already pools: [batch, hidden]
            &[_, h] if h > 0 => data.chunks(h).map(|row| row.to_vec()).collect(),
            other => {
                return Err(EmbeddingError::EmbeddingFailed {
                    error: format!("Unexpected output tensor shape {:?}", other),
                })
            }
        };
        drop(outputs);
        drop(session);

        if pooled.len() != batch_size {
            return Err(EmbeddingError::EmbeddingFailed {
                error: format!(
                    "Model returned {} embeddings for {} texts",
                    pooled.len(),
                    batch_size
                ),
            });
        }

        let embeddings = if self.config.normalize {
            pooled.iter().map(|e| Self::normalize_embedding(e)).collect()
        } else {
            pooled
        };

        debug!("Successfully generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    /// Mean of token embeddings over positions where the attention mask is set
    ///
    /// `attention_mask` is the flattened `[batch, seq]` mask fed to the model.
    fn mean_pooling(
        output: &ArrayView3<f32>,
        attention_mask: &[i64],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let (batch_size, seq_len, hidden_size) = output.dim();

        if attention_mask.len() != batch_size * seq_len {
            return Err(EmbeddingError::EmbeddingFailed {
                error: format!(
                    "Attention mask length {} doesn't match output {}x{}",
                    attention_mask.len(),
                    batch_size,
                    seq_len
                ),
            });
        }

        let mut pooled = Vec::with_capacity(batch_size);
        for (row, mask) in attention_mask.chunks(seq_len.max(1)).take(batch_size).enumerate() {
            let mut sum = vec![0.0f32; hidden_size];
            let mut valid_tokens = 0usize;

            for (seq_idx, &m) in mask.iter().enumerate() {
                if m == 1 {
                    for (hidden_idx, acc) in sum.iter_mut().enumerate() {
                        *acc += output[[row, seq_idx, hidden_idx]];
                    }
                    valid_tokens += 1;
                }
            }

            // fully masked row pools to the zero vector
            let denom = valid_tokens.max(1) as f32;
            for val in &mut sum {
                *val /= denom;
            }
            pooled.push(sum);
        }

        Ok(pooled)
    }

    /// L2 normalization; the zero vector is returned unchanged
    fn normalize_embedding(embedding: &[f32]) -> Vec<f32> {
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return embedding.to_vec();
        }
        embedding.iter().map(|x| x / norm).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::str::FromStr;

    const WORD_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 3],
            "cls": ["[CLS]", 2]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {
                "[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3,
                "hello": 4, "world": 5, "big": 6, "red": 7, "dog": 8
            },
            "unk_token": "[UNK]"
        }
    }"#;

    fn word_tokenizer(max_seq_length: usize) -> Tokenizer {
        let mut tokenizer = Tokenizer::from_str(WORD_TOKENIZER).unwrap();
        configure_tokenizer(&mut tokenizer, max_seq_length).unwrap();
        tokenizer
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_encode_batch_pads_to_longest_in_order() {
        let tokenizer = word_tokenizer(256);
        let batch = encode_batch(&tokenizer, &texts(&["hello", "big red dog", ""])).unwrap();

        assert_eq!(batch.batch_size, 3);
        assert_eq!(batch.seq_len, 5);
        assert_eq!(batch.shape(), [3, 5]);
        assert_eq!(
            batch.input_ids,
            vec![
                2, 4, 3, 0, 0, // hello
                2, 6, 7, 8, 3, // big red dog
                2, 3, 0, 0, 0, // empty string keeps its special tokens
            ]
        );
        assert_eq!(
            batch.attention_mask,
            vec![1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0]
        );
        assert!(batch.token_type_ids.iter().all(|&t| t == 0));
        assert_eq!(batch.token_type_ids.len(), 15);
    }

    #[test]
    fn test_encode_batch_truncates_at_limit() {
        let tokenizer = word_tokenizer(4);
        let batch =
            encode_batch(&tokenizer, &texts(&["hello", "big red dog hello world"])).unwrap();

        assert_eq!(batch.seq_len, 4);
        assert_eq!(batch.input_ids, vec![2, 4, 3, 0, 2, 6, 7, 3]);
        assert_eq!(batch.attention_mask, vec![1, 1, 1, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_encode_batch_unknown_words() {
        let tokenizer = word_tokenizer(256);
        let batch = encode_batch(&tokenizer, &texts(&["purple dog"])).unwrap();
        assert_eq!(batch.input_ids, vec![2, 1, 8, 3]);
    }

    #[test]
    fn test_mean_pooling_respects_mask() {
        // batch 2, seq 3, hidden 2
        let output = Array3::from_shape_vec(
            (2, 3, 2),
            vec![
                1.0, 2.0, 3.0, 4.0, 100.0, 100.0, // row 0, last token is padding
                2.0, 2.0, 4.0, 4.0, 6.0, 6.0, // row 1, all tokens real
            ],
        )
        .unwrap();
        let mask = vec![1, 1, 0, 1, 1, 1];

        let pooled = OnnxEmbeddingEngine::mean_pooling(&output.view(), &mask).unwrap();
        assert_eq!(pooled, vec![vec![2.0, 3.0], vec![4.0, 4.0]]);
    }

    #[test]
    fn test_mean_pooling_fully_masked_row() {
        let output = Array3::from_shape_vec((1, 2, 2), vec![5.0, 5.0, 7.0, 7.0]).unwrap();
        let pooled = OnnxEmbeddingEngine::mean_pooling(&output.view(), &[0, 0]).unwrap();
        assert_eq!(pooled, vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn test_mean_pooling_mask_mismatch() {
        let output = Array3::from_shape_vec((1, 2, 2), vec![1.0; 4]).unwrap();
        assert!(OnnxEmbeddingEngine::mean_pooling(&output.view(), &[1, 1, 1]).is_err());
    }

    #[test]
    fn test_normalize_embedding() {
        let normalized = OnnxEmbeddingEngine::normalize_embedding(&[3.0, 4.0]);
        assert_eq!(normalized, vec![0.6, 0.8]);

        let zero = OnnxEmbeddingEngine::normalize_embedding(&[0.0, 0.0]);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
