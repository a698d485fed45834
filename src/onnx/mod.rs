//! ONNX Runtime backend for sentence-transformer embeddings

pub mod onnx_engine;
pub use onnx_engine::{OnnxConfig, OnnxEmbeddingEngine};
