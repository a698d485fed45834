//! Vectorization Server Library
//!
//! HTTP service that turns text into embedding vectors with a single
//! pretrained model loaded at startup.

pub mod models;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod protocol;
pub mod server;

/// Error type used across startup and serving
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Re-exports
pub use models::{
    EmbeddingBackend, EmbeddingError, TextInput, VectorOutput, VectorizationError,
    VectorizationService,
};
pub use server::{HttpServer, ServerConfig};
