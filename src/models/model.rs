//! Embedding backend trait and the ONNX implementation
//!
//! The service only sees `EmbeddingBackend`; the concrete model behind it is
//! chosen at startup and can be swapped for a stub in tests.

use async_trait::async_trait;

use crate::models::{Embedding, EmbeddingResult};

/// A loaded embedding model
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Identifier the model was loaded under
    fn model_name(&self) -> &str;

    /// Width of every vector this model produces
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, one vector per text, in input order.
    /// An empty batch yields an empty result.
    async fn embed(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Embedding>>;
}

/// ONNX-based embedding model implementation
#[cfg(feature = "onnx")]
pub mod onnx {
    use super::*;
    use std::sync::Arc;
    use tracing::info;

    use crate::models::{hub, EmbeddingError, ModelConfig};
    use crate::onnx::{OnnxConfig, OnnxEmbeddingEngine};

    const WARMUP_TEXT: &str = "validation test";

    /// ONNX embedding model
    #[derive(Debug)]
    pub struct OnnxEmbeddingModel {
        name: String,
        dimension: usize,
        engine: Arc<OnnxEmbeddingEngine>,
    }

    impl OnnxEmbeddingModel {
        /// Resolve and load the model named in `config`.
        ///
        /// A copy under `model_dir` wins; otherwise the model is fetched from
        /// the hub when downloads are allowed. Blocks for the duration of
        /// session creation and a warm-up inference that fixes the embedding
        /// width.
        pub fn load(config: &ModelConfig) -> EmbeddingResult<Self> {
            let files = match config.resolve() {
                Ok(files) => files,
                Err(EmbeddingError::ModelNotFound { reason, .. }) if config.allow_download => {
                    info!("📂 No local copy of {} ({}), trying the hub", config.name, reason);
                    hub::fetch(config)?
                }
                Err(e) => return Err(e),
            };
            info!(
                "Loading model {} from {}",
                config.name,
                files.model_path.display()
            );

            let onnx_config = OnnxConfig {
                thread_pool_size: config.num_threads,
                max_seq_length: config.max_sequence_length,
                normalize: config.normalize,
            };
            let engine = OnnxEmbeddingEngine::new(
                &config.name,
                &files.model_path,
                &files.tokenizer_path,
                &onnx_config,
            )?;

            let warmup = engine
                .embed_texts(&[WARMUP_TEXT.to_string()])
                .map_err(|e| EmbeddingError::ModelLoadFailed {
                    model_name: config.name.clone(),
                    error: format!("warm-up inference failed: {}", e),
                })?;
            let dimension = warmup.first().map(Vec::len).unwrap_or(0);
            if dimension == 0 {
                return Err(EmbeddingError::ModelLoadFailed {
                    model_name: config.name.clone(),
                    error: "warm-up inference returned an empty embedding".to_string(),
                });
            }

            Ok(Self {
                name: config.name.clone(),
                dimension,
                engine: Arc::new(engine),
            })
        }
    }

    #[async_trait]
    impl EmbeddingBackend for OnnxEmbeddingModel {
        fn model_name(&self) -> &str {
            &self.name
        }

        fn dimensions(&self) -> usize {
            self.dimension
        }

        async fn embed(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Embedding>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let engine = Arc::clone(&self.engine);
            let embeddings = tokio::task::spawn_blocking(move || engine.embed_texts(&texts))
                .await
                .map_err(|e| EmbeddingError::EmbeddingFailed {
                    error: format!("inference task aborted: {}", e),
                })??;

            Ok(embeddings
                .into_iter()
                .map(|v| v.into_iter().map(f64::from).collect())
                .collect())
        }
    }
}

#[cfg(all(test, feature = "onnx"))]
mod tests {
    use super::onnx::OnnxEmbeddingModel;
    use crate::models::{EmbeddingError, ModelConfig};

    #[test]
    fn test_load_unknown_model() {
        let config = ModelConfig {
            name: "definitely-not-a-model".to_string(),
            model_dir: std::env::temp_dir().join(format!("no-models-{}", uuid::Uuid::new_v4())),
            max_sequence_length: 256,
            num_threads: 1,
            normalize: true,
            allow_download: false,
        };

        let err = OnnxEmbeddingModel::load(&config).unwrap_err();
        assert!(matches!(err, EmbeddingError::ModelNotFound { .. }));
    }
}
