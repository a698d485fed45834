//! Vectorization service
//!
//! Normalizes caller input into a batch, runs it through the backend and
//! packages the vectors with their width and the model name.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::models::{Embedding, EmbeddingBackend, EmbeddingError};

/// Text to vectorize: one string or an ordered list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    Single(String),
    Batch(Vec<String>),
}

impl TextInput {
    /// Canonical batch form; a single string becomes a one-element batch
    pub fn into_texts(self) -> Vec<String> {
        match self {
            TextInput::Single(text) => vec![text],
            TextInput::Batch(texts) => texts,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TextInput::Single(_) => 1,
            TextInput::Batch(texts) => texts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for TextInput {
    fn from(text: &str) -> Self {
        TextInput::Single(text.to_string())
    }
}

/// Vectors for one request, positionally aligned with the input texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorOutput {
    pub vector: Vec<Embedding>,
    /// Length of every vector, 0 for an empty batch
    pub dimensions: usize,
    pub model: String,
}

/// Terminal failure of a single vectorize call
#[derive(Debug, Clone, thiserror::Error)]
#[error("Vectorization failed: {message}")]
pub struct VectorizationError {
    pub message: String,
}

impl From<EmbeddingError> for VectorizationError {
    fn from(error: EmbeddingError) -> Self {
        Self {
            message: error.to_string(),
        }
    }
}

/// Process-wide service around the loaded model
#[derive(Clone)]
pub struct VectorizationService {
    backend: Arc<dyn EmbeddingBackend>,
}

impl VectorizationService {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self { backend }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Width of the loaded model's vectors
    pub fn dimensions(&self) -> usize {
        self.backend.dimensions()
    }

    /// Embed `input` and package the result
    pub async fn vectorize(&self, input: TextInput) -> Result<VectorOutput, VectorizationError> {
        let texts = input.into_texts();
        let expected = texts.len();

        let vectors = self.backend.embed(texts).await.map_err(|e| {
            error!("Vectorization error: {}", e);
            VectorizationError::from(e)
        })?;

        if vectors.len() != expected {
            error!(
                "Backend returned {} vectors for {} texts",
                vectors.len(),
                expected
            );
            return Err(VectorizationError {
                message: format!(
                    "model returned {} vectors for {} texts",
                    vectors.len(),
                    expected
                ),
            });
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimensions) {
            return Err(VectorizationError {
                message: format!(
                    "vector {} has length {}, expected {}",
                    bad,
                    vectors[bad].len(),
                    dimensions
                ),
            });
        }

        debug!("Vectorized {} texts ({} dimensions)", expected, dimensions);
        Ok(VectorOutput {
            vector: vectors,
            dimensions,
            model: self.backend.model_name().to_string(),
        })
    }
}
