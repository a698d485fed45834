//! Embedding model layer
//!
//! The backend trait, the ONNX-backed implementation, the resolved model
//! configuration and the vectorization service that sits on top of them.

pub mod config;
#[cfg(feature = "onnx")]
pub mod hub;
pub mod model;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use config::ModelConfig;
pub use model::EmbeddingBackend;
pub use service::{TextInput, VectorOutput, VectorizationError, VectorizationService};

#[cfg(feature = "onnx")]
pub use model::onnx::OnnxEmbeddingModel;

/// Embedding vector type
pub type Embedding = Vec<f64>;

/// Result type for embedding backend operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors raised by an embedding backend
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model not found: {model_name} ({reason})")]
    ModelNotFound { model_name: String, reason: String },

    #[error("Model loading failed: {model_name} - {error}")]
    ModelLoadFailed { model_name: String, error: String },

    #[error("Embedding failed: {error}")]
    EmbeddingFailed { error: String },
}
