//! Model download from the Hugging Face Hub
//!
//! Used when `MODEL_DIR` has no copy of the requested model. Files land in
//! the standard Hugging Face cache, so later starts do not download again.

use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use tracing::{info, warn};

use crate::models::config::ModelFiles;
use crate::models::{EmbeddingError, EmbeddingResult, ModelConfig};

const TOKENIZER_FILE: &str = "tokenizer.json";
const HUB_MODEL_CANDIDATES: [&str; 2] = ["onnx/model.onnx", "model.onnx"];

/// Fetch the tokenizer and ONNX graph for `config` from the hub
pub fn fetch(config: &ModelConfig) -> EmbeddingResult<ModelFiles> {
    let repo_id = config.hub_repo_id();
    info!("⬇️  Fetching {} from the Hugging Face Hub", repo_id);

    let api = ApiBuilder::new()
        .with_progress(false)
        .build()
        .map_err(|e| EmbeddingError::ModelLoadFailed {
            model_name: config.name.clone(),
            error: format!("hub client unavailable: {}", e),
        })?;
    let repo = api.model(repo_id.clone());

    let tokenizer_path = repo
        .get(TOKENIZER_FILE)
        .map_err(|e| EmbeddingError::ModelNotFound {
            model_name: config.name.clone(),
            reason: format!("{} not available from {}: {}", TOKENIZER_FILE, repo_id, e),
        })?;

    let model_path = fetch_graph(&repo, &repo_id).ok_or_else(|| EmbeddingError::ModelLoadFailed {
        model_name: config.name.clone(),
        error: format!(
            "no ONNX graph in {} (looked for {})",
            repo_id,
            HUB_MODEL_CANDIDATES.join(", ")
        ),
    })?;

    info!("✅ Model files ready in {}", model_path.display());
    Ok(ModelFiles {
        model_path,
        tokenizer_path,
    })
}

fn fetch_graph(repo: &ApiRepo, repo_id: &str) -> Option<std::path::PathBuf> {
    HUB_MODEL_CANDIDATES
        .iter()
        .find_map(|candidate| match repo.get(candidate) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("{} has no {}: {}", repo_id, candidate, e);
                None
            }
        })
}
