//! Stub backends for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Embedding, EmbeddingBackend, EmbeddingError, EmbeddingResult};

/// Vector `i` starts with `i`, so ordering can be checked; counts calls
pub struct TaggingBackend {
    name: String,
    dimension: usize,
    calls: Arc<AtomicUsize>,
}

impl TaggingBackend {
    pub fn new(name: &str, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl EmbeddingBackend for TaggingBackend {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut v = vec![text.len() as f64; self.dimension];
                v[0] = i as f64;
                v
            })
            .collect())
    }
}

/// Fails its first call, succeeds afterwards
pub struct FlakyBackend {
    name: String,
    dimension: usize,
    failed: AtomicBool,
}

impl FlakyBackend {
    pub fn failing_once(name: &str, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            failed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for FlakyBackend {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: Vec<String>) -> EmbeddingResult<Vec<Embedding>> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(EmbeddingError::EmbeddingFailed {
                error: "simulated backend failure".to_string(),
            });
        }
        Ok(texts.iter().map(|_| vec![0.5; self.dimension]).collect())
    }
}

/// Always returns a single vector regardless of batch size
pub struct MisbehavingBackend {
    name: String,
}

impl MisbehavingBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for MisbehavingBackend {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        1
    }

    async fn embed(&self, _texts: Vec<String>) -> EmbeddingResult<Vec<Embedding>> {
        Ok(vec![vec![1.0]])
    }
}
