//! Model configuration and on-disk resolution
//!
//! A model identifier names a directory under the configured model root.
//! The directory holds `tokenizer.json` and the ONNX graph, either at the top
//! level (`model.onnx`) or in the Hugging Face layout (`onnx/model.onnx`).
//! When no local copy exists the model can be fetched from the Hugging Face
//! Hub instead (see `models::hub`).

use std::path::{Component, Path, PathBuf};

use crate::models::{EmbeddingError, EmbeddingResult};
use crate::server::ServerConfig;

const TOKENIZER_FILE: &str = "tokenizer.json";
const MODEL_FILE_CANDIDATES: [&str; 2] = ["model.onnx", "onnx/model.onnx"];
const DEFAULT_HUB_ORG: &str = "sentence-transformers";

/// Settings needed to load one embedding model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model identifier, e.g. "all-MiniLM-L6-v2"
    pub name: String,
    /// Directory that holds one sub-directory per model
    pub model_dir: PathBuf,
    /// Token limit applied by truncation
    pub max_sequence_length: usize,
    /// ONNX Runtime intra-op threads
    pub num_threads: usize,
    /// L2-normalize pooled embeddings
    pub normalize: bool,
    /// Fall back to the Hugging Face Hub when `model_dir` has no copy
    pub allow_download: bool,
}

/// Files backing a resolved model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl ModelConfig {
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            name: config.model_name.clone(),
            model_dir: config.model_dir.clone(),
            max_sequence_length: config.max_sequence_length,
            num_threads: config.intra_threads,
            normalize: config.normalize_embeddings,
            allow_download: config.allow_download,
        }
    }

    /// Hub repository for this model. Bare names live under
    /// `sentence-transformers/`.
    pub fn hub_repo_id(&self) -> String {
        let name = self.name.trim();
        if name.contains('/') {
            name.to_string()
        } else {
            format!("{}/{}", DEFAULT_HUB_ORG, name)
        }
    }

    /// Directory of this model, after checking the identifier is a plain
    /// relative name
    pub fn model_root(&self) -> EmbeddingResult<PathBuf> {
        let name = Path::new(&self.name);
        let plain = !self.name.trim().is_empty()
            && name
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !plain {
            return Err(EmbeddingError::ModelNotFound {
                model_name: self.name.clone(),
                reason: "invalid model identifier".to_string(),
            });
        }

        Ok(self.model_dir.join(name))
    }

    /// Locate the model graph and tokenizer on disk
    pub fn resolve(&self) -> EmbeddingResult<ModelFiles> {
        let root = self.model_root()?;
        if !root.is_dir() {
            return Err(EmbeddingError::ModelNotFound {
                model_name: self.name.clone(),
                reason: format!("directory {} does not exist", root.display()),
            });
        }

        let tokenizer_path = root.join(TOKENIZER_FILE);
        if !tokenizer_path.is_file() {
            return Err(EmbeddingError::ModelLoadFailed {
                model_name: self.name.clone(),
                error: format!("tokenizer not found at {}", tokenizer_path.display()),
            });
        }

        let model_path = MODEL_FILE_CANDIDATES
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.is_file())
            .ok_or_else(|| EmbeddingError::ModelLoadFailed {
                model_name: self.name.clone(),
                error: format!(
                    "no ONNX graph in {} (looked for {})",
                    root.display(),
                    MODEL_FILE_CANDIDATES.join(", ")
                ),
            })?;

        Ok(ModelFiles {
            model_path,
            tokenizer_path,
        })
    }
}
